//! Cohort construction as an ordered sequence of relational stages.
//!
//! Each stage is a plain function from one relation to the next, so it can be
//! exercised on its own. [`CohortFilterEngine::build`] applies them in the
//! order later stages depend on:
//!
//! 1. drop stays with a care-unit transfer
//! 2. inner join with admissions on `(subject_id, hadm_id)`
//! 3. inner join with patients on `subject_id`
//! 4. keep admissions whose stay count is within the configured range
//! 5. remap de-identified negative ages to 90
//! 6. derive in-unit and in-hospital mortality
//! 7. keep rows within the configured age range

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span};

use cohort_ingest::{LoadError, TableLoader};
use cohort_model::{
    Admission, AdmissionKey, CohortOptions, CohortRow, HadmId, IcuStay, Patient, StayCountRange,
    StayKey, SubjectId,
};

/// Age assigned to de-identified ages (recorded as negative values in the
/// source), following the convention that masks ages of 90 and above.
pub const DEIDENTIFIED_AGE: i64 = 90;

/// The three relations the cohort is built from.
#[derive(Debug, Clone, Default)]
pub struct CohortSources {
    pub stays: Vec<IcuStay>,
    pub admissions: Vec<Admission>,
    pub patients: Vec<Patient>,
}

impl CohortSources {
    pub fn load(loader: &TableLoader) -> Result<Self, LoadError> {
        Ok(Self {
            stays: loader.load()?,
            admissions: loader.load()?,
            patients: loader.load()?,
        })
    }
}

/// Row count after a named stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: &'static str,
    pub rows: usize,
}

/// The filtered, joined cohort. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    rows: Vec<CohortRow>,
}

impl Cohort {
    pub fn new(rows: Vec<CohortRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CohortRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn stay_keys(&self) -> BTreeSet<StayKey> {
        self.rows.iter().map(CohortRow::key).collect()
    }

    pub fn admission_keys(&self) -> BTreeSet<AdmissionKey> {
        self.rows.iter().map(|row| row.key().admission()).collect()
    }

    pub fn subject_ids(&self) -> BTreeSet<SubjectId> {
        self.rows.iter().map(CohortRow::subject_id).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CohortBuild {
    pub cohort: Cohort,
    pub stages: Vec<StageCount>,
}

#[derive(Debug, Clone, Default)]
pub struct CohortFilterEngine {
    options: CohortOptions,
}

impl CohortFilterEngine {
    pub fn new(options: CohortOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CohortOptions {
        &self.options
    }

    pub fn build(&self, sources: CohortSources) -> CohortBuild {
        let span = info_span!("cohort");
        let _guard = span.enter();
        let start = Instant::now();
        let CohortSources {
            stays,
            admissions,
            patients,
        } = sources;
        let mut stages = vec![StageCount {
            stage: "icu_stays",
            rows: stays.len(),
        }];
        let mut record = |stage: &'static str, rows: usize| {
            info!(stage, rows, "cohort stage complete");
            stages.push(StageCount { stage, rows });
        };

        let stays = drop_transfers(stays);
        record("drop_transfers", stays.len());
        let joined = join_admissions(stays, &admissions);
        record("join_admissions", joined.len());
        let rows = join_patients(joined, &patients);
        record("join_patients", rows.len());
        let rows = filter_stays_per_admission(rows, self.options.stays_per_admission);
        record("stays_per_admission", rows.len());
        let rows = normalize_ages(rows);
        let rows = derive_mortality(rows);
        let rows = filter_age(rows, &self.options);
        record("age_range", rows.len());

        info!(
            rows = rows.len(),
            duration_ms = start.elapsed().as_millis(),
            "cohort built"
        );
        CohortBuild {
            cohort: Cohort::new(rows),
            stages,
        }
    }
}

/// Keeps stays that began and ended in the same care unit.
pub fn drop_transfers(stays: Vec<IcuStay>) -> Vec<IcuStay> {
    stays.into_iter().filter(IcuStay::is_single_unit).collect()
}

/// Inner join of stays with admissions on `(subject_id, hadm_id)`.
pub fn join_admissions(stays: Vec<IcuStay>, admissions: &[Admission]) -> Vec<(IcuStay, &Admission)> {
    let mut by_key: HashMap<AdmissionKey, Vec<&Admission>> = HashMap::new();
    for admission in admissions {
        by_key.entry(admission.key()).or_default().push(admission);
    }
    let mut joined = Vec::with_capacity(stays.len());
    for stay in stays {
        let Some(matches) = by_key.get(&stay.admission()) else {
            continue;
        };
        for admission in matches {
            joined.push((stay.clone(), *admission));
        }
    }
    joined
}

/// Inner join of stay/admission pairs with patients on `subject_id`.
pub fn join_patients(rows: Vec<(IcuStay, &Admission)>, patients: &[Patient]) -> Vec<CohortRow> {
    let mut by_subject: HashMap<SubjectId, Vec<&Patient>> = HashMap::new();
    for patient in patients {
        by_subject.entry(patient.subject_id).or_default().push(patient);
    }
    let mut joined = Vec::with_capacity(rows.len());
    for (stay, admission) in rows {
        let Some(matches) = by_subject.get(&stay.subject_id) else {
            continue;
        };
        for patient in matches {
            joined.push(CohortRow::join(stay.clone(), admission, patient));
        }
    }
    joined
}

/// Keeps rows of admissions whose number of stays lies within `range`.
pub fn filter_stays_per_admission(rows: Vec<CohortRow>, range: StayCountRange) -> Vec<CohortRow> {
    let mut counts: HashMap<HadmId, usize> = HashMap::new();
    for row in &rows {
        *counts.entry(row.stay.hadm_id).or_insert(0) += 1;
    }
    rows.into_iter()
        .filter(|row| range.contains(counts.get(&row.stay.hadm_id).copied().unwrap_or(0)))
        .collect()
}

/// Remaps negative (de-identified) ages to [`DEIDENTIFIED_AGE`].
pub fn normalize_ages(mut rows: Vec<CohortRow>) -> Vec<CohortRow> {
    for row in &mut rows {
        if row.age < 0 {
            row.age = DEIDENTIFIED_AGE;
        }
    }
    rows
}

/// Sets `mortality_inunit` and `mortality_inhospital` from the death time.
///
/// Both intervals are closed; the two flags are derived independently.
pub fn derive_mortality(mut rows: Vec<CohortRow>) -> Vec<CohortRow> {
    for row in &mut rows {
        let death = row.death_time;
        row.mortality_inunit =
            death.is_some_and(|time| row.stay.in_time <= time && time <= row.stay.out_time);
        row.mortality_inhospital =
            death.is_some_and(|time| row.admit_time <= time && time <= row.discharge_time);
    }
    rows
}

pub fn filter_age(rows: Vec<CohortRow>, options: &CohortOptions) -> Vec<CohortRow> {
    rows.into_iter()
        .filter(|row| options.age_in_range(row.age))
        .collect()
}
