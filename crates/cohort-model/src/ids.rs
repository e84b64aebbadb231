#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use crate::ModelError;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                parse_integer(value)
                    .map(Self)
                    .ok_or_else(|| ModelError::InvalidId(value.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Patient identifier, unique per patient.
    SubjectId
);
integer_id!(
    /// Hospital admission identifier, unique within a subject.
    HadmId
);
integer_id!(
    /// ICU stay identifier, unique across the export.
    StayId
);

/// Parses an integer key, accepting float-formatted integers such as `"123.0"`
/// that appear when an upstream tool widened a nullable integer column.
pub fn parse_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Some(parsed);
    }
    let (whole, fraction) = trimmed.split_once('.')?;
    if fraction.chars().all(|ch| ch == '0') {
        whole.parse::<i64>().ok()
    } else {
        None
    }
}

/// Membership key of an admission: `(subject_id, hadm_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdmissionKey {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
}

/// Membership key of a cohort stay: `(subject_id, hadm_id, stay_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct StayKey {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
    pub stay_id: StayId,
}

impl StayKey {
    pub fn admission(&self) -> AdmissionKey {
        AdmissionKey {
            subject_id: self.subject_id,
            hadm_id: self.hadm_id,
        }
    }
}
