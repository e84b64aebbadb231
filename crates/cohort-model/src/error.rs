use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),
    #[error("unsupported ICD version: {0:?}")]
    InvalidIcdVersion(String),
    #[error("invalid range: min {min} exceeds max {max}")]
    InvalidRange { min: i64, max: i64 },
}

pub type Result<T> = std::result::Result<T, ModelError>;
