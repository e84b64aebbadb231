//! Cohort filter engine behavior on small hand-built relations.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use cohort_core::cohort::{derive_mortality, filter_stays_per_admission, join_admissions};
use cohort_core::{CohortFilterEngine, CohortSources};
use cohort_model::{
    Admission, CohortOptions, HadmId, IcuStay, Patient, StayCountRange, StayId, SubjectId,
    parse_timestamp,
};

fn ts(value: &str) -> NaiveDateTime {
    parse_timestamp(value).expect("timestamp")
}

fn stay(subject: i64, hadm: i64, stay: i64, first: &str, last: &str) -> IcuStay {
    IcuStay {
        subject_id: SubjectId::new(subject),
        hadm_id: HadmId::new(hadm),
        stay_id: StayId::new(stay),
        first_care_unit: first.to_string(),
        last_care_unit: last.to_string(),
        in_time: ts("2150-01-02 00:00:00"),
        out_time: ts("2150-01-05 00:00:00"),
        length_of_stay: Some(3.0),
    }
}

fn admission(subject: i64, hadm: i64, death: Option<&str>) -> Admission {
    Admission {
        subject_id: SubjectId::new(subject),
        hadm_id: HadmId::new(hadm),
        admit_time: ts("2150-01-01 00:00:00"),
        discharge_time: ts("2150-01-10 00:00:00"),
        death_time: death.map(ts),
        ethnicity: "WHITE".to_string(),
    }
}

fn patient(subject: i64, age: i64) -> Patient {
    Patient {
        subject_id: SubjectId::new(subject),
        gender: "F".to_string(),
        age,
    }
}

fn build(sources: CohortSources) -> cohort_core::CohortBuild {
    CohortFilterEngine::new(CohortOptions::default()).build(sources)
}

#[test]
fn ages_are_normalized_before_the_age_floor() {
    let ages = [(1, -1), (2, 17), (3, 18), (4, 90)];
    let sources = CohortSources {
        stays: ages
            .iter()
            .map(|(subject, _)| stay(*subject, subject * 10, subject * 100, "MICU", "MICU"))
            .collect(),
        admissions: ages
            .iter()
            .map(|(subject, _)| admission(*subject, subject * 10, None))
            .collect(),
        patients: ages.iter().map(|(subject, age)| patient(*subject, *age)).collect(),
    };

    let build = build(sources);
    let kept: Vec<(i64, i64)> = build
        .cohort
        .rows()
        .iter()
        .map(|row| (row.subject_id().get(), row.age))
        .collect();
    assert_eq!(kept, vec![(1, 90), (3, 18), (4, 90)]);
}

#[test]
fn transfers_and_multi_stay_admissions_are_excluded() {
    let sources = CohortSources {
        stays: vec![
            stay(1, 10, 100, "MICU", "SICU"),
            stay(2, 20, 200, "MICU", "MICU"),
            stay(2, 20, 201, "CCU", "CCU"),
            stay(3, 30, 300, "CCU", "CCU"),
        ],
        admissions: vec![
            admission(1, 10, None),
            admission(2, 20, None),
            admission(3, 30, None),
        ],
        patients: vec![patient(1, 50), patient(2, 50), patient(3, 50)],
    };

    let build = build(sources);
    for row in build.cohort.rows() {
        assert_eq!(row.stay.first_care_unit, row.stay.last_care_unit);
    }
    let mut stays_per_hadm: HashMap<HadmId, usize> = HashMap::new();
    for row in build.cohort.rows() {
        *stays_per_hadm.entry(row.stay.hadm_id).or_default() += 1;
    }
    assert!(stays_per_hadm.values().all(|count| *count == 1));
    assert_eq!(
        build.cohort.stay_keys().iter().map(|key| key.stay_id.get()).collect::<Vec<_>>(),
        vec![300]
    );

    let stages: Vec<(&str, usize)> = build
        .stages
        .iter()
        .map(|stage| (stage.stage, stage.rows))
        .collect();
    assert_eq!(
        stages,
        vec![
            ("icu_stays", 4),
            ("drop_transfers", 3),
            ("join_admissions", 3),
            ("join_patients", 3),
            ("stays_per_admission", 1),
            ("age_range", 1),
        ]
    );
}

#[test]
fn widened_stay_range_keeps_multi_stay_admissions() {
    let sources = CohortSources {
        stays: vec![stay(2, 20, 200, "MICU", "MICU"), stay(2, 20, 201, "CCU", "CCU")],
        admissions: vec![admission(2, 20, None)],
        patients: vec![patient(2, 40)],
    };
    let options = CohortOptions::default()
        .with_stays_per_admission(StayCountRange::new(1, 2).expect("range"));
    let build = CohortFilterEngine::new(options).build(sources);
    assert_eq!(build.cohort.len(), 2);
}

#[test]
fn rows_without_admission_or_patient_are_dropped_silently() {
    let sources = CohortSources {
        stays: vec![
            stay(1, 10, 100, "MICU", "MICU"),
            stay(2, 20, 200, "MICU", "MICU"),
            stay(3, 30, 300, "MICU", "MICU"),
        ],
        admissions: vec![admission(1, 10, None), admission(2, 20, None)],
        patients: vec![patient(1, 30), patient(3, 30)],
    };

    let build = build(sources);
    assert_eq!(build.cohort.subject_ids(), BTreeSet::from([SubjectId::new(1)]));
    let input_admissions: BTreeSet<HadmId> = [10, 20].into_iter().map(HadmId::new).collect();
    let output_admissions: BTreeSet<HadmId> = build
        .cohort
        .admission_keys()
        .into_iter()
        .map(|key| key.hadm_id)
        .collect();
    assert!(output_admissions.is_subset(&input_admissions));
}

#[test]
fn stay_count_is_taken_over_joined_rows() {
    let stays = vec![stay(1, 10, 100, "MICU", "MICU"), stay(1, 10, 101, "MICU", "MICU")];
    let admissions = vec![admission(1, 10, None)];
    let patients = vec![patient(1, 60)];
    let joined = join_admissions(stays, &admissions);
    let rows = cohort_core::cohort::join_patients(joined, &patients);
    assert!(filter_stays_per_admission(rows.clone(), StayCountRange::default()).is_empty());
    assert_eq!(
        filter_stays_per_admission(rows, StayCountRange::new(2, 2).expect("range")).len(),
        2
    );
}

#[test]
fn mortality_flags_use_closed_intervals_independently() {
    let cases = [
        (None, false, false),
        (Some("2150-01-02 00:00:00"), true, true),
        (Some("2150-01-05 00:00:00"), true, true),
        (Some("2150-01-07 12:00:00"), false, true),
        (Some("2150-01-10 00:00:00"), false, true),
        (Some("2150-01-11 00:00:00"), false, false),
    ];
    for (death, in_unit, in_hospital) in cases {
        let admissions = [admission(1, 10, death)];
        let joined = join_admissions(
            vec![stay(1, 10, 100, "MICU", "MICU")],
            &admissions,
        );
        let rows = derive_mortality(cohort_core::cohort::join_patients(joined, &[patient(1, 70)]));
        let row = &rows[0];
        assert_eq!(row.mortality_inunit, in_unit, "in-unit for {death:?}");
        assert_eq!(row.mortality_inhospital, in_hospital, "in-hospital for {death:?}");
        if row.mortality_inunit {
            let death = row.death_time.expect("death time");
            assert!(row.stay.in_time <= death && death <= row.stay.out_time);
        }
    }
}

#[test]
fn maximum_age_is_inclusive() {
    let sources = CohortSources {
        stays: vec![stay(1, 10, 100, "MICU", "MICU"), stay(2, 20, 200, "MICU", "MICU")],
        admissions: vec![admission(1, 10, None), admission(2, 20, None)],
        patients: vec![patient(1, 65), patient(2, 66)],
    };
    let options = CohortOptions::default()
        .with_age_range(18, Some(65))
        .expect("age range");
    let build = CohortFilterEngine::new(options).build(sources);
    assert_eq!(build.cohort.subject_ids(), BTreeSet::from([SubjectId::new(1)]));
}
