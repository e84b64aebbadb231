use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to build {table} table: {error}")]
    Frame {
        table: &'static str,
        #[source]
        error: PolarsError,
    },
    #[error("failed to write {path}: {error}")]
    Write {
        path: PathBuf,
        #[source]
        error: PolarsError,
    },
    #[error("io error on {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to serialize {path}: {error}")]
    Json {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, OutputError>;
