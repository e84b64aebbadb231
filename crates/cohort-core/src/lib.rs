//! Cohort construction and event partitioning.

pub mod cohort;
pub mod crosswalk;
pub mod diagnoses;
pub mod error;
pub mod partition;
pub mod phenotype;
pub mod progress;
pub mod subject_files;

pub use cohort::{
    Cohort, CohortBuild, CohortFilterEngine, CohortSources, DEIDENTIFIED_AGE, StageCount,
};
pub use crosswalk::{
    Crosswalk, CrosswalkBuildStats, CrosswalkLookup, CrosswalkReport, NormalizedDiagnoses,
    normalize_assignments, normalize_code, normalize_diagnoses,
};
pub use diagnoses::{
    DiagnosisCount, DiagnosisDictionary, TitledDiagnoses, attach_titles, diagnosis_counts,
    filter_diagnoses_on_cohort,
};
pub use error::{PartitionError, Result};
pub use partition::{
    EventFilter, FilterDecision, PartitionSink, PartitionStats, StreamingEventPartitioner,
    SubjectFileSink, cohort_event_filter, partition_event_source,
};
pub use phenotype::{LabelMatrix, PhenotypeDefinitions, PhenotypeGroup, PhenotypeLabeler};
pub use progress::{event_progress, expected_rows};
pub use subject_files::{
    Creation, DIAGNOSES_FILE, EVENTS_FILE, STAYS_FILE, ensure_file_with_header,
    ensure_partition_dir, partition_dir, write_subject_diagnoses, write_subject_stays,
};
