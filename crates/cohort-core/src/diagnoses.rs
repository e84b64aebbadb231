//! Diagnosis titles, cohort filtering and code frequencies.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use cohort_model::{
    AdmissionKey, CohortDiagnosis, DiagnosisAssignment, DiagnosisRecord, DiagnosisTitle,
    IcdVersion, StayId,
};

use crate::cohort::Cohort;
use crate::crosswalk::normalize_code;

/// Lookup of long titles by `(icd_version, icd_code)`.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisDictionary {
    titles: HashMap<(IcdVersion, String), String>,
}

impl DiagnosisDictionary {
    pub fn new(titles: Vec<DiagnosisTitle>) -> Self {
        let mut map = HashMap::with_capacity(titles.len());
        for title in titles {
            map.entry((title.icd_version, normalize_code(&title.icd_code)))
                .or_insert(title.long_title);
        }
        Self { titles: map }
    }

    pub fn title(&self, version: IcdVersion, code: &str) -> Option<&str> {
        self.titles
            .get(&(version, normalize_code(code)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Diagnosis assignments that found a dictionary title.
#[derive(Debug, Clone, Default)]
pub struct TitledDiagnoses {
    pub records: Vec<DiagnosisRecord>,
    /// Assignments dropped because `(icd_code, icd_version)` has no title.
    pub untitled_rows: usize,
}

/// Attaches dictionary titles to diagnosis assignments.
///
/// Inner join on `(icd_code, icd_version)`: assignments whose code is not in
/// the dictionary are dropped and counted in `untitled_rows`.
pub fn attach_titles(
    assignments: Vec<DiagnosisAssignment>,
    dictionary: &DiagnosisDictionary,
) -> TitledDiagnoses {
    let mut titled = TitledDiagnoses {
        records: Vec::with_capacity(assignments.len()),
        untitled_rows: 0,
    };
    for assignment in assignments {
        let Some(title) = dictionary.title(assignment.icd_version, &assignment.icd_code) else {
            titled.untitled_rows += 1;
            continue;
        };
        titled.records.push(DiagnosisRecord {
            long_title: title.to_string(),
            subject_id: assignment.subject_id,
            hadm_id: assignment.hadm_id,
            sequence_number: assignment.sequence_number,
            icd_code: assignment.icd_code,
            icd_version: assignment.icd_version,
        });
    }
    if titled.untitled_rows > 0 {
        warn!(
            untitled_rows = titled.untitled_rows,
            "diagnoses dropped: codes missing from the diagnosis dictionary"
        );
    }
    titled
}

/// Keeps diagnoses of cohort admissions, attaching the stay of each admission.
///
/// Inner join on `(subject_id, hadm_id)`. An admission with several cohort
/// stays yields one row per stay.
pub fn filter_diagnoses_on_cohort(
    records: &[DiagnosisRecord],
    cohort: &Cohort,
) -> Vec<CohortDiagnosis> {
    let mut stays_by_admission: HashMap<AdmissionKey, Vec<StayId>> = HashMap::new();
    for row in cohort.rows() {
        stays_by_admission
            .entry(row.key().admission())
            .or_default()
            .push(row.stay.stay_id);
    }
    let mut kept = Vec::new();
    for record in records {
        let Some(stays) = stays_by_admission.get(&record.admission()) else {
            continue;
        };
        for stay_id in stays {
            kept.push(CohortDiagnosis {
                stay_id: *stay_id,
                record: record.clone(),
            });
        }
    }
    info!(
        input_rows = records.len(),
        output_rows = kept.len(),
        "diagnoses filtered on cohort"
    );
    kept
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisCount {
    pub icd_code: String,
    pub long_title: String,
    pub count: usize,
}

/// Frequency of each code, most frequent first; ties by ascending code.
pub fn diagnosis_counts(diagnoses: &[CohortDiagnosis]) -> Vec<DiagnosisCount> {
    let mut counts: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for diagnosis in diagnoses {
        let entry = counts
            .entry(diagnosis.record.icd_code.as_str())
            .or_insert((0, diagnosis.record.long_title.as_str()));
        entry.0 += 1;
        if entry.1.is_empty() {
            entry.1 = diagnosis.record.long_title.as_str();
        }
    }
    let mut out: Vec<DiagnosisCount> = counts
        .into_iter()
        .map(|(code, (count, title))| DiagnosisCount {
            icd_code: code.to_string(),
            long_title: title.to_string(),
            count,
        })
        .collect();
    // BTreeMap order gives ascending codes; a stable sort keeps them for ties.
    out.sort_by_key(|entry| Reverse(entry.count));
    out
}
