//! Writing whole-cohort tables to the output root.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::{CsvWriter, DataFrame, PolarsResult, SerWriter};
use tracing::{debug, info};

use cohort_core::{Cohort, DiagnosisCount, LabelMatrix};
use cohort_model::CohortDiagnosis;

use crate::error::{OutputError, Result};
use crate::frames::{cohort_frame, counts_frame, diagnoses_frame, label_frame};

pub const ALL_STAYS_FILE: &str = "all_stays.csv";
pub const ALL_DIAGNOSES_FILE: &str = "all_diagnoses.csv";
pub const DIAGNOSIS_COUNTS_FILE: &str = "diagnosis_counts.csv";
pub const PHENOTYPE_LABELS_FILE: &str = "phenotype_labels.csv";

/// Paths of the tables written by [`write_cohort_tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortTables {
    pub stays: PathBuf,
    pub diagnoses: PathBuf,
    pub counts: PathBuf,
}

/// Writes `frame` as CSV with a header row, replacing any existing file.
pub fn write_frame(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|error| OutputError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .map_err(|error| OutputError::Write {
            path: path.to_path_buf(),
            error,
        })?;
    debug!(path = %path.display(), rows = frame.height(), "table written");
    Ok(())
}

fn build(table: &'static str, frame: PolarsResult<DataFrame>) -> Result<DataFrame> {
    frame.map_err(|error| OutputError::Frame { table, error })
}

pub fn write_cohort_tables(
    output_root: &Path,
    cohort: &Cohort,
    diagnoses: &[CohortDiagnosis],
    counts: &[DiagnosisCount],
) -> Result<CohortTables> {
    let tables = CohortTables {
        stays: output_root.join(ALL_STAYS_FILE),
        diagnoses: output_root.join(ALL_DIAGNOSES_FILE),
        counts: output_root.join(DIAGNOSIS_COUNTS_FILE),
    };
    write_frame(&mut build("cohort", cohort_frame(cohort))?, &tables.stays)?;
    write_frame(&mut build("diagnoses", diagnoses_frame(diagnoses))?, &tables.diagnoses)?;
    write_frame(&mut build("diagnosis counts", counts_frame(counts))?, &tables.counts)?;
    info!(
        stays = cohort.len(),
        diagnoses = diagnoses.len(),
        codes = counts.len(),
        "cohort tables written"
    );
    Ok(tables)
}

pub fn write_phenotype_labels(output_root: &Path, labels: &LabelMatrix) -> Result<PathBuf> {
    let path = output_root.join(PHENOTYPE_LABELS_FILE);
    write_frame(&mut build("phenotype labels", label_frame(labels))?, &path)?;
    info!(stays = labels.len(), groups = labels.groups().len(), "phenotype labels written");
    Ok(path)
}
