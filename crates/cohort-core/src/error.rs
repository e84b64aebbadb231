use std::path::PathBuf;

use thiserror::Error;

use cohort_ingest::LoadError;
use cohort_model::SubjectId;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("cannot read event source: {0}")]
    SourceReadError(#[from] LoadError),
    #[error(
        "subject {subject_id} reappeared at row {row} after its rows were flushed; \
         the event stream is not grouped by subject"
    )]
    NonContiguousSubject { subject_id: SubjectId, row: u64 },
    #[error("subject {subject_id} at row {row} follows subject {previous}; ascending order required")]
    DescendingSubject {
        subject_id: SubjectId,
        previous: SubjectId,
        row: u64,
    },
    #[error("io error writing {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("csv error writing {path}: {error}")]
    Csv {
        path: PathBuf,
        #[source]
        error: csv::Error,
    },
}

impl PartitionError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        PartitionError::Io {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, error: csv::Error) -> Self {
        PartitionError::Csv {
            path: path.into(),
            error,
        }
    }
}

pub type Result<T> = std::result::Result<T, PartitionError>;
