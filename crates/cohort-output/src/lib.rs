//! Whole-cohort output tables and the run summary.

pub mod error;
pub mod frames;
pub mod summary;
pub mod writer;

pub use error::{OutputError, Result};
pub use frames::{cohort_frame, counts_frame, diagnoses_frame, label_frame};
pub use summary::{RunSummary, SUMMARY_FILE, write_summary_json};
pub use writer::{
    ALL_DIAGNOSES_FILE, ALL_STAYS_FILE, CohortTables, DIAGNOSIS_COUNTS_FILE,
    PHENOTYPE_LABELS_FILE, write_cohort_tables, write_frame, write_phenotype_labels,
};
