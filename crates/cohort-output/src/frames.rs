//! DataFrame construction for the whole-cohort tables.
//!
//! Identifiers are integer columns, timestamps are rendered as
//! `YYYY-MM-DD HH:MM:SS` strings (null when absent) and boolean flags as
//! 0/1 integers.

use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, PolarsResult, Series, SortMultipleOptions};

use cohort_core::{Cohort, DiagnosisCount, LabelMatrix};
use cohort_model::{
    CohortDiagnosis, DIAGNOSIS_COLUMNS, STAY_COLUMNS, format_timestamp,
};

fn column<T, V>(name: &str, values: V) -> Column
where
    Series: NamedFrom<V, T>,
    T: ?Sized,
{
    Series::new(name.into(), values).into_column()
}

/// One row per cohort stay, sorted by `(subject_id, intime)`.
pub fn cohort_frame(cohort: &Cohort) -> PolarsResult<DataFrame> {
    let rows = cohort.rows();
    let mut subject_id = Vec::with_capacity(rows.len());
    let mut hadm_id = Vec::with_capacity(rows.len());
    let mut stay_id = Vec::with_capacity(rows.len());
    let mut first_careunit = Vec::with_capacity(rows.len());
    let mut last_careunit = Vec::with_capacity(rows.len());
    let mut intime = Vec::with_capacity(rows.len());
    let mut outtime = Vec::with_capacity(rows.len());
    let mut los = Vec::with_capacity(rows.len());
    let mut admittime = Vec::with_capacity(rows.len());
    let mut dischtime = Vec::with_capacity(rows.len());
    let mut deathtime = Vec::with_capacity(rows.len());
    let mut ethnicity = Vec::with_capacity(rows.len());
    let mut gender = Vec::with_capacity(rows.len());
    let mut age = Vec::with_capacity(rows.len());
    let mut mortality_inunit = Vec::with_capacity(rows.len());
    let mut mortality_inhospital = Vec::with_capacity(rows.len());
    for row in rows {
        subject_id.push(row.stay.subject_id.get());
        hadm_id.push(row.stay.hadm_id.get());
        stay_id.push(row.stay.stay_id.get());
        first_careunit.push(row.stay.first_care_unit.as_str());
        last_careunit.push(row.stay.last_care_unit.as_str());
        intime.push(format_timestamp(&row.stay.in_time));
        outtime.push(format_timestamp(&row.stay.out_time));
        los.push(row.stay.length_of_stay);
        admittime.push(format_timestamp(&row.admit_time));
        dischtime.push(format_timestamp(&row.discharge_time));
        deathtime.push(row.death_time.as_ref().map(format_timestamp));
        ethnicity.push(row.ethnicity.as_str());
        gender.push(row.gender.as_str());
        age.push(row.age);
        mortality_inunit.push(i32::from(row.mortality_inunit));
        mortality_inhospital.push(i32::from(row.mortality_inhospital));
    }
    let [c0, c1, c2, c3, c4, c5, c6, c7, c8, c9, c10, c11, c12, c13, c14, c15] = STAY_COLUMNS;
    let frame = DataFrame::new(vec![
        column(c0, subject_id),
        column(c1, hadm_id),
        column(c2, stay_id),
        column(c3, first_careunit),
        column(c4, last_careunit),
        column(c5, intime),
        column(c6, outtime),
        column(c7, los),
        column(c8, admittime),
        column(c9, dischtime),
        column(c10, deathtime),
        column(c11, ethnicity),
        column(c12, gender),
        column(c13, age),
        column(c14, mortality_inunit),
        column(c15, mortality_inhospital),
    ])?;
    frame.sort(
        [c0, c5],
        SortMultipleOptions::default().with_maintain_order(true),
    )
}

/// Normalized diagnoses of cohort stays, in the order given.
pub fn diagnoses_frame(diagnoses: &[CohortDiagnosis]) -> PolarsResult<DataFrame> {
    let [c0, c1, c2, c3, c4, c5, c6] = DIAGNOSIS_COLUMNS;
    DataFrame::new(vec![
        column(c0, diagnoses.iter().map(|d| d.record.subject_id.get()).collect::<Vec<_>>()),
        column(c1, diagnoses.iter().map(|d| d.record.hadm_id.get()).collect::<Vec<_>>()),
        column(c2, diagnoses.iter().map(|d| d.stay_id.get()).collect::<Vec<_>>()),
        column(c3, diagnoses.iter().map(|d| d.record.sequence_number).collect::<Vec<_>>()),
        column(c4, diagnoses.iter().map(|d| d.record.icd_code.as_str()).collect::<Vec<_>>()),
        column(c5, diagnoses.iter().map(|d| d.record.icd_version.number()).collect::<Vec<_>>()),
        column(c6, diagnoses.iter().map(|d| d.record.long_title.as_str()).collect::<Vec<_>>()),
    ])
}

pub fn counts_frame(counts: &[DiagnosisCount]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        column("icd_code", counts.iter().map(|c| c.icd_code.as_str()).collect::<Vec<_>>()),
        column("long_title", counts.iter().map(|c| c.long_title.as_str()).collect::<Vec<_>>()),
        column("count", counts.iter().map(|c| c.count as i64).collect::<Vec<_>>()),
    ])
}

/// Stay keys followed by one 0/1 column per phenotype group.
pub fn label_frame(labels: &LabelMatrix) -> PolarsResult<DataFrame> {
    let mut subject_id = Vec::with_capacity(labels.len());
    let mut hadm_id = Vec::with_capacity(labels.len());
    let mut stay_id = Vec::with_capacity(labels.len());
    let mut groups: Vec<Vec<i32>> = vec![Vec::with_capacity(labels.len()); labels.groups().len()];
    for (key, row) in labels.rows() {
        subject_id.push(key.subject_id.get());
        hadm_id.push(key.hadm_id.get());
        stay_id.push(key.stay_id.get());
        for (values, label) in groups.iter_mut().zip(row) {
            values.push(i32::from(*label));
        }
    }
    let mut columns = vec![
        column("subject_id", subject_id),
        column("hadm_id", hadm_id),
        column("stay_id", stay_id),
    ];
    for (name, values) in labels.groups().iter().zip(groups) {
        columns.push(column(name, values));
    }
    DataFrame::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_model::{DiagnosisRecord, HadmId, IcdVersion, StayId, StayKey, SubjectId};

    #[test]
    fn diagnoses_frame_keeps_column_order() {
        let frame = diagnoses_frame(&[CohortDiagnosis {
            stay_id: StayId::new(300),
            record: DiagnosisRecord {
                subject_id: SubjectId::new(3),
                hadm_id: HadmId::new(30),
                sequence_number: 1,
                icd_code: "4019".to_string(),
                icd_version: IcdVersion::Icd9,
                long_title: "Hypertension".to_string(),
            },
        }])
        .unwrap();
        let names: Vec<&str> = frame.get_column_names().iter().map(|name| name.as_str()).collect();
        assert_eq!(names, DIAGNOSIS_COLUMNS);
        assert_eq!(frame.height(), 1);
    }

    #[test]
    fn label_frame_has_one_column_per_group() {
        let mut labels = LabelMatrix::new(vec!["Sepsis".to_string(), "Shock".to_string()]);
        let key = StayKey {
            subject_id: SubjectId::new(1),
            hadm_id: HadmId::new(10),
            stay_id: StayId::new(100),
        };
        labels.set(key, "Shock", true);
        let frame = label_frame(&labels).unwrap();
        assert_eq!(frame.width(), 5);
        let shock = frame.column("Shock").unwrap().i32().unwrap().get(0);
        assert_eq!(shock, Some(1));
        let sepsis = frame.column("Sepsis").unwrap().i32().unwrap().get(0);
        assert_eq!(sepsis, Some(0));
    }
}
