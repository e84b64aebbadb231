use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while loading a source table.
///
/// Any of these aborts the run; no partially loaded relation is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source `{source_name}` not found under {root}")]
    SourceNotFound { source_name: String, root: PathBuf },
    #[error("io error reading {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("csv error reading {path}: {error}")]
    Csv {
        path: PathBuf,
        #[source]
        error: csv::Error,
    },
    #[error("{path}: missing column `{column}`")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path}:{line}: column `{column}` has unparsable timestamp {value:?}")]
    Timestamp {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
    #[error("{path}:{line}: column `{column}` has invalid value {value:?}: {reason}")]
    Field {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
        reason: String,
    },
}

/// Why a single field of a projected row could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Timestamp { column: String, value: String },
    Invalid {
        column: String,
        value: String,
        reason: String,
    },
}

impl FieldError {
    pub fn invalid(column: &str, value: &str, reason: impl Into<String>) -> Self {
        FieldError::Invalid {
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn into_load_error(self, path: PathBuf, line: u64) -> LoadError {
        match self {
            FieldError::Timestamp { column, value } => LoadError::Timestamp {
                path,
                line,
                column,
                value,
            },
            FieldError::Invalid {
                column,
                value,
                reason,
            } => LoadError::Field {
                path,
                line,
                column,
                value,
                reason,
            },
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Timestamp { column, value } => {
                write!(f, "column `{column}` has unparsable timestamp {value:?}")
            }
            FieldError::Invalid {
                column,
                value,
                reason,
            } => write!(f, "column `{column}` has invalid value {value:?}: {reason}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
