//! CLI argument definitions for cohort extraction.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use cohort_model::DEFAULT_EVENT_SOURCES;

#[derive(Parser)]
#[command(
    name = "cohort-extract",
    version,
    about = "Extract an ICU stay cohort and per-subject event files from a MIMIC export",
    long_about = "Build the ICU stay cohort from patients, admissions and icustays,\n\
                  normalize diagnoses onto ICD-9, and partition the event logs into\n\
                  one events file per subject."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the cohort and write all outputs.
    Run(RunArgs),

    /// List the source tables read from the export.
    Sources(SourcesArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Directory holding the export tables (`<name>.csv` or `<name>.csv.gz`).
    #[arg(value_name = "MIMIC_ROOT")]
    pub mimic_root: PathBuf,

    /// Directory receiving the cohort tables and per-subject directories.
    #[arg(value_name = "OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// ICD-10-CM to ICD-9-CM mapping table with `icd10cm` and `icd9cm` columns.
    ///
    /// Without it every ICD-10 diagnosis is dropped and reported as unmapped.
    #[arg(long = "crosswalk", value_name = "PATH")]
    pub crosswalk: Option<PathBuf>,

    /// Event logs to partition, in order.
    #[arg(
        long = "event-tables",
        value_name = "NAMES",
        value_delimiter = ',',
        default_values_t = DEFAULT_EVENT_SOURCES.map(String::from)
    )]
    pub event_tables: Vec<String>,

    /// Keep only events whose itemid is listed in this file (one per line).
    #[arg(long = "itemids-file", value_name = "PATH")]
    pub itemids_file: Option<PathBuf>,

    /// Keep only events of subjects listed in this file (one per line).
    #[arg(long = "subjects-file", value_name = "PATH")]
    pub subjects_file: Option<PathBuf>,

    /// Minimum number of ICU stays per admission.
    #[arg(long = "min-stays", value_name = "N", default_value_t = 1)]
    pub min_stays: usize,

    /// Maximum number of ICU stays per admission.
    #[arg(long = "max-stays", value_name = "N", default_value_t = 1)]
    pub max_stays: usize,

    /// Minimum age at admission.
    #[arg(long = "min-age", value_name = "N", default_value_t = 18)]
    pub min_age: i64,

    /// Maximum age at admission (unbounded by default).
    #[arg(long = "max-age", value_name = "N")]
    pub max_age: Option<i64>,

    /// How to check that each event log is grouped by subject.
    ///
    /// `ascending` fails when a subject id decreases and needs constant
    /// memory. `verified` fails when any completed subject reappears and
    /// keeps one id per distinct subject in memory. `unchecked` writes a
    /// subject whose rows are not adjacent as several runs into the same
    /// file, without an error.
    #[arg(long = "contiguity", value_enum, default_value_t = ContiguityArg::Ascending)]
    pub contiguity: ContiguityArg,

    /// Disable progress bars.
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Build the cohort tables only; do not partition event logs.
    #[arg(long = "skip-events")]
    pub skip_events: bool,
}

#[derive(Parser)]
pub struct SourcesArgs {
    /// Report which sources resolve under this directory.
    #[arg(value_name = "MIMIC_ROOT")]
    pub mimic_root: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Contiguity check choices for event partitioning.
#[derive(Clone, Copy, ValueEnum)]
pub enum ContiguityArg {
    Ascending,
    Verified,
    Unchecked,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
