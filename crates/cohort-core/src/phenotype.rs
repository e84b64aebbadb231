//! Seam for phenotype labeling.
//!
//! Labeling itself is supplied by the caller through [`PhenotypeLabeler`];
//! this module only defines what goes in and what comes out.

use std::collections::{BTreeMap, BTreeSet};

use cohort_model::{CohortDiagnosis, StayKey};

/// One phenotype group: the diagnosis codes that define it and whether the
/// group takes part in the benchmark label set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhenotypeGroup {
    pub codes: BTreeSet<String>,
    pub use_in_benchmark: bool,
}

/// Phenotype group name to definition, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhenotypeDefinitions {
    groups: BTreeMap<String, PhenotypeGroup>,
}

impl PhenotypeDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, group: PhenotypeGroup) -> Option<PhenotypeGroup> {
        self.groups.insert(name.into(), group)
    }

    pub fn get(&self, name: &str) -> Option<&PhenotypeGroup> {
        self.groups.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PhenotypeGroup)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }

    /// Names of the groups used in the benchmark, in name order.
    pub fn benchmark_groups(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, group)| group.use_in_benchmark)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, PhenotypeGroup)> for PhenotypeDefinitions {
    fn from_iter<T: IntoIterator<Item = (S, PhenotypeGroup)>>(iter: T) -> Self {
        Self {
            groups: iter
                .into_iter()
                .map(|(name, group)| (name.into(), group))
                .collect(),
        }
    }
}

/// Binary labels per cohort stay, one column per group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMatrix {
    groups: Vec<String>,
    rows: BTreeMap<StayKey, Vec<bool>>,
}

impl LabelMatrix {
    pub fn new(groups: Vec<String>) -> Self {
        Self {
            groups,
            rows: BTreeMap::new(),
        }
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Adds an all-false row for `key` if it is not present yet.
    pub fn ensure_row(&mut self, key: StayKey) -> &mut Vec<bool> {
        let width = self.groups.len();
        self.rows.entry(key).or_insert_with(|| vec![false; width])
    }

    /// Sets the label of `group` for `key`. Returns `false` for an unknown
    /// group.
    pub fn set(&mut self, key: StayKey, group: &str, value: bool) -> bool {
        let Some(column) = self.groups.iter().position(|name| name == group) else {
            return false;
        };
        self.ensure_row(key)[column] = value;
        true
    }

    pub fn get(&self, key: &StayKey, group: &str) -> Option<bool> {
        let column = self.groups.iter().position(|name| name == group)?;
        self.rows.get(key).map(|row| row[column])
    }

    /// Labels of `key`, ordered as [`LabelMatrix::groups`].
    pub fn row(&self, key: &StayKey) -> Option<&[bool]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&StayKey, &[bool])> {
        self.rows.iter().map(|(key, row)| (key, row.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Produces phenotype labels from the normalized, cohort-filtered diagnoses.
pub trait PhenotypeLabeler {
    fn label(&self, diagnoses: &[CohortDiagnosis], definitions: &PhenotypeDefinitions) -> LabelMatrix;
}
