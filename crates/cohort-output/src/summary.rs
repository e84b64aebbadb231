//! Machine-readable summary of a run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use cohort_core::{CrosswalkBuildStats, CrosswalkReport, PartitionStats, StageCount};

use crate::error::{OutputError, Result};

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub mimic_root: PathBuf,
    pub output_root: PathBuf,
    /// Absent when no crosswalk table was given.
    pub crosswalk: Option<CrosswalkBuildStats>,
    pub diagnoses: CrosswalkReport,
    pub icd10_coverage: f64,
    pub cohort_stages: Vec<StageCount>,
    pub cohort_stays: usize,
    pub cohort_subjects: usize,
    pub cohort_diagnoses: usize,
    pub partitions: Vec<PartitionStats>,
}

impl RunSummary {
    pub fn events_written(&self) -> u64 {
        self.partitions.iter().map(|stats| stats.rows_written).sum()
    }
}

pub fn write_summary_json(output_root: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let path = output_root.join(SUMMARY_FILE);
    let io_error = |error| OutputError::Io {
        path: path.clone(),
        error,
    };
    let file = File::create(&path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary).map_err(|error| OutputError::Json {
        path: path.clone(),
        error,
    })?;
    writer.write_all(b"\n").map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(path)
}
