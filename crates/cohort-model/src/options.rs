//! Configuration options for cohort construction and event partitioning.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::SubjectId;
use crate::ModelError;

/// Default event logs partitioned by subject.
pub const DEFAULT_EVENT_SOURCES: [&str; 3] = ["chartevents", "labevents", "outputevents"];

/// Inclusive bounds on the number of qualifying stays per admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayCountRange {
    pub min: usize,
    pub max: usize,
}

impl StayCountRange {
    pub fn new(min: usize, max: usize) -> Result<Self, ModelError> {
        if min > max {
            return Err(ModelError::InvalidRange {
                min: min as i64,
                max: max as i64,
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, count: usize) -> bool {
        self.min <= count && count <= self.max
    }
}

impl Default for StayCountRange {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

/// Options for the cohort eligibility filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortOptions {
    /// Admissions keep their stays only if the stay count lies in this range.
    pub stays_per_admission: StayCountRange,
    /// Minimum age (inclusive), applied after age normalization.
    pub min_age: i64,
    /// Maximum age (inclusive). `None` means unbounded.
    pub max_age: Option<i64>,
}

impl Default for CohortOptions {
    fn default() -> Self {
        Self {
            stays_per_admission: StayCountRange::default(),
            min_age: 18,
            max_age: None,
        }
    }
}

impl CohortOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stays_per_admission(mut self, range: StayCountRange) -> Self {
        self.stays_per_admission = range;
        self
    }

    pub fn with_age_range(mut self, min_age: i64, max_age: Option<i64>) -> Result<Self, ModelError> {
        if let Some(max) = max_age
            && min_age > max
        {
            return Err(ModelError::InvalidRange { min: min_age, max });
        }
        self.min_age = min_age;
        self.max_age = max_age;
        Ok(self)
    }

    pub fn age_in_range(&self, age: i64) -> bool {
        age >= self.min_age && self.max_age.is_none_or(|max| age <= max)
    }
}

/// How the partitioner treats its "same-subject rows are adjacent" precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContiguityMode {
    /// Require subject ids to never decrease. Only the previous id is kept.
    #[default]
    Ascending,
    /// Remember every completed subject and fail if one reappears. Accepts
    /// grouped input in any subject order.
    ///
    /// Memory grows with the number of distinct subjects, not with rows.
    Verified,
    /// Trust the input. A subject whose rows are not adjacent is flushed as
    /// several separate groups into the same file without any error.
    Unchecked,
}

/// Options for the streaming event partitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOptions {
    /// Event sources to process, in order.
    pub event_sources: Vec<String>,
    /// Keep only events whose item identifier is listed. `None` keeps all.
    pub item_allow_list: Option<BTreeSet<i64>>,
    /// Keep only events whose subject is listed. `None` keeps all.
    pub subject_allow_list: Option<BTreeSet<SubjectId>>,
    pub contiguity: ContiguityMode,
    /// Display a progress bar. Advisory only.
    pub show_progress: bool,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            event_sources: DEFAULT_EVENT_SOURCES.iter().map(|s| s.to_string()).collect(),
            item_allow_list: None,
            subject_allow_list: None,
            contiguity: ContiguityMode::default(),
            show_progress: true,
        }
    }
}

impl PartitionOptions {
    pub fn with_event_sources(mut self, sources: Vec<String>) -> Self {
        self.event_sources = sources;
        self
    }

    pub fn with_item_allow_list(mut self, items: Option<BTreeSet<i64>>) -> Self {
        self.item_allow_list = items;
        self
    }

    pub fn with_subject_allow_list(mut self, subjects: Option<BTreeSet<SubjectId>>) -> Self {
        self.subject_allow_list = subjects;
        self
    }

    pub fn with_contiguity(mut self, mode: ContiguityMode) -> Self {
        self.contiguity = mode;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }
}
