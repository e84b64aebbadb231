//! Source table definitions for the clinical export.

use cohort_model::{
    Admission, DiagnosisAssignment, DiagnosisTitle, IcdVersion, IcuStay, Patient,
};

use crate::error::FieldError;
use crate::table::{ColumnSpec, ProjectedRow, SourceTable};

fn icd_version(row: &ProjectedRow<'_>) -> Result<IcdVersion, FieldError> {
    let value = row.raw("icd_version");
    value
        .parse::<IcdVersion>()
        .map_err(|error| FieldError::invalid("icd_version", value, error.to_string()))
}

fn icd_code(row: &ProjectedRow<'_>) -> Result<String, FieldError> {
    let value = row.raw("icd_code");
    if value.is_empty() {
        return Err(FieldError::invalid("icd_code", value, "empty diagnosis code"));
    }
    Ok(value.to_string())
}

impl SourceTable for Patient {
    const SOURCE: &'static str = "patients";
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("subject_id"),
        ColumnSpec::required("gender"),
        ColumnSpec::required("anchor_age").with_aliases(&["age"]),
    ];

    fn from_row(row: &ProjectedRow<'_>) -> Result<Self, FieldError> {
        Ok(Patient {
            subject_id: row.id("subject_id")?,
            gender: row.text("gender"),
            age: row.integer("anchor_age")?,
        })
    }
}

impl SourceTable for Admission {
    const SOURCE: &'static str = "admissions";
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("subject_id"),
        ColumnSpec::required("hadm_id"),
        ColumnSpec::required("admittime"),
        ColumnSpec::required("dischtime"),
        ColumnSpec::required("deathtime"),
        ColumnSpec::required("ethnicity").with_aliases(&["race"]),
    ];

    fn from_row(row: &ProjectedRow<'_>) -> Result<Self, FieldError> {
        Ok(Admission {
            subject_id: row.id("subject_id")?,
            hadm_id: row.id("hadm_id")?,
            admit_time: row.timestamp("admittime")?,
            discharge_time: row.timestamp("dischtime")?,
            death_time: row.optional_timestamp("deathtime")?,
            ethnicity: row.text("ethnicity"),
        })
    }
}

impl SourceTable for IcuStay {
    const SOURCE: &'static str = "icustays";
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("subject_id"),
        ColumnSpec::required("hadm_id"),
        ColumnSpec::required("stay_id").with_aliases(&["icustay_id"]),
        ColumnSpec::required("first_careunit"),
        ColumnSpec::required("last_careunit"),
        ColumnSpec::required("intime"),
        ColumnSpec::required("outtime"),
        ColumnSpec::optional("los"),
    ];

    fn from_row(row: &ProjectedRow<'_>) -> Result<Self, FieldError> {
        Ok(IcuStay {
            subject_id: row.id("subject_id")?,
            hadm_id: row.id("hadm_id")?,
            stay_id: row.id("stay_id")?,
            first_care_unit: row.text("first_careunit"),
            last_care_unit: row.text("last_careunit"),
            in_time: row.timestamp("intime")?,
            out_time: row.timestamp("outtime")?,
            length_of_stay: row.optional_float("los")?,
        })
    }
}

impl SourceTable for DiagnosisAssignment {
    const SOURCE: &'static str = "diagnoses_icd";
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("subject_id"),
        ColumnSpec::required("hadm_id"),
        ColumnSpec::required("seq_num"),
        ColumnSpec::required("icd_code"),
        ColumnSpec::required("icd_version"),
    ];

    fn from_row(row: &ProjectedRow<'_>) -> Result<Self, FieldError> {
        Ok(DiagnosisAssignment {
            subject_id: row.id("subject_id")?,
            hadm_id: row.id("hadm_id")?,
            sequence_number: row.integer("seq_num")?,
            icd_code: icd_code(row)?,
            icd_version: icd_version(row)?,
        })
    }
}

impl SourceTable for DiagnosisTitle {
    const SOURCE: &'static str = "d_icd_diagnoses";
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("icd_code"),
        ColumnSpec::required("icd_version"),
        ColumnSpec::required("long_title"),
    ];

    fn from_row(row: &ProjectedRow<'_>) -> Result<Self, FieldError> {
        Ok(DiagnosisTitle {
            icd_code: icd_code(row)?,
            icd_version: icd_version(row)?,
            long_title: row.text("long_title"),
        })
    }
}
