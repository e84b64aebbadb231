//! Data model for ICU cohort extraction.

pub mod error;
pub mod ids;
pub mod options;
pub mod records;
pub mod time;

pub use error::{ModelError, Result};
pub use ids::{AdmissionKey, HadmId, StayId, StayKey, SubjectId, parse_integer};
pub use options::{
    CohortOptions, ContiguityMode, DEFAULT_EVENT_SOURCES, PartitionOptions, StayCountRange,
};
pub use records::{
    Admission, CohortDiagnosis, CohortRow, DIAGNOSIS_COLUMNS, DiagnosisAssignment,
    DiagnosisRecord, DiagnosisTitle, EVENT_COLUMNS, EventRecord, IcdVersion, IcuStay, Patient,
    STAY_COLUMNS,
};
pub use time::{TIMESTAMP_FORMAT, format_optional_timestamp, format_timestamp, parse_timestamp};
