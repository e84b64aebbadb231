//! Relational records of the clinical export and the derived cohort.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{AdmissionKey, HadmId, StayId, StayKey, SubjectId};
use crate::time::{format_optional_timestamp, format_timestamp};
use crate::ModelError;

/// Header of per-subject and whole-cohort stay files.
pub const STAY_COLUMNS: [&str; 16] = [
    "subject_id",
    "hadm_id",
    "stay_id",
    "first_careunit",
    "last_careunit",
    "intime",
    "outtime",
    "los",
    "admittime",
    "dischtime",
    "deathtime",
    "ethnicity",
    "gender",
    "age",
    "mortality_inunit",
    "mortality_inhospital",
];

/// Header of per-subject and whole-cohort diagnosis files.
pub const DIAGNOSIS_COLUMNS: [&str; 7] = [
    "subject_id",
    "hadm_id",
    "stay_id",
    "seq_num",
    "icd_code",
    "icd_version",
    "long_title",
];

/// Header of per-subject event files.
pub const EVENT_COLUMNS: [&str; 7] = [
    "subject_id",
    "hadm_id",
    "stay_id",
    "charttime",
    "itemid",
    "value",
    "valueuom",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub subject_id: SubjectId,
    pub gender: String,
    /// Age at the anchor year. Negative values are de-identification artifacts.
    pub age: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
    pub admit_time: NaiveDateTime,
    pub discharge_time: NaiveDateTime,
    pub death_time: Option<NaiveDateTime>,
    pub ethnicity: String,
}

impl Admission {
    pub fn key(&self) -> AdmissionKey {
        AdmissionKey {
            subject_id: self.subject_id,
            hadm_id: self.hadm_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IcuStay {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
    pub stay_id: StayId,
    pub first_care_unit: String,
    pub last_care_unit: String,
    pub in_time: NaiveDateTime,
    pub out_time: NaiveDateTime,
    /// Length of stay in fractional days.
    pub length_of_stay: Option<f64>,
}

impl IcuStay {
    pub fn admission(&self) -> AdmissionKey {
        AdmissionKey {
            subject_id: self.subject_id,
            hadm_id: self.hadm_id,
        }
    }

    /// True when the patient never moved between care units during the stay.
    pub fn is_single_unit(&self) -> bool {
        self.first_care_unit == self.last_care_unit
    }
}

/// ICD coding revision of a diagnosis code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IcdVersion {
    Icd9,
    Icd10,
}

impl IcdVersion {
    pub fn number(self) -> i64 {
        match self {
            IcdVersion::Icd9 => 9,
            IcdVersion::Icd10 => 10,
        }
    }
}

impl FromStr for IcdVersion {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match crate::ids::parse_integer(value) {
            Some(9) => Ok(IcdVersion::Icd9),
            Some(10) => Ok(IcdVersion::Icd10),
            _ => Err(ModelError::InvalidIcdVersion(value.to_string())),
        }
    }
}

impl fmt::Display for IcdVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A row of the diagnosis-assignment table, before titles are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisAssignment {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
    pub sequence_number: i64,
    pub icd_code: String,
    pub icd_version: IcdVersion,
}

/// A row of the diagnosis dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisTitle {
    pub icd_code: String,
    pub icd_version: IcdVersion,
    pub long_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRecord {
    pub subject_id: SubjectId,
    pub hadm_id: HadmId,
    pub sequence_number: i64,
    pub icd_code: String,
    pub icd_version: IcdVersion,
    pub long_title: String,
}

impl DiagnosisRecord {
    pub fn admission(&self) -> AdmissionKey {
        AdmissionKey {
            subject_id: self.subject_id,
            hadm_id: self.hadm_id,
        }
    }
}

/// A normalized diagnosis attached to the cohort stay of its admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortDiagnosis {
    pub stay_id: StayId,
    pub record: DiagnosisRecord,
}

impl CohortDiagnosis {
    pub fn to_record(&self) -> [String; 7] {
        [
            self.record.subject_id.to_string(),
            self.record.hadm_id.to_string(),
            self.stay_id.to_string(),
            self.record.sequence_number.to_string(),
            self.record.icd_code.clone(),
            self.record.icd_version.to_string(),
            self.record.long_title.clone(),
        ]
    }
}

/// One surviving row of the cohort: a stay joined with its admission and patient.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortRow {
    pub stay: IcuStay,
    pub admit_time: NaiveDateTime,
    pub discharge_time: NaiveDateTime,
    pub death_time: Option<NaiveDateTime>,
    pub ethnicity: String,
    pub gender: String,
    pub age: i64,
    pub mortality_inunit: bool,
    pub mortality_inhospital: bool,
}

impl CohortRow {
    pub fn join(stay: IcuStay, admission: &Admission, patient: &Patient) -> Self {
        Self {
            stay,
            admit_time: admission.admit_time,
            discharge_time: admission.discharge_time,
            death_time: admission.death_time,
            ethnicity: admission.ethnicity.clone(),
            gender: patient.gender.clone(),
            age: patient.age,
            mortality_inunit: false,
            mortality_inhospital: false,
        }
    }

    pub fn key(&self) -> StayKey {
        StayKey {
            subject_id: self.stay.subject_id,
            hadm_id: self.stay.hadm_id,
            stay_id: self.stay.stay_id,
        }
    }

    pub fn subject_id(&self) -> SubjectId {
        self.stay.subject_id
    }

    pub fn to_record(&self) -> [String; 16] {
        [
            self.stay.subject_id.to_string(),
            self.stay.hadm_id.to_string(),
            self.stay.stay_id.to_string(),
            self.stay.first_care_unit.clone(),
            self.stay.last_care_unit.clone(),
            format_timestamp(&self.stay.in_time),
            format_timestamp(&self.stay.out_time),
            self.stay
                .length_of_stay
                .map(|los| los.to_string())
                .unwrap_or_default(),
            format_timestamp(&self.admit_time),
            format_timestamp(&self.discharge_time),
            format_optional_timestamp(self.death_time.as_ref()),
            self.ethnicity.clone(),
            self.gender.clone(),
            self.age.to_string(),
            u8::from(self.mortality_inunit).to_string(),
            u8::from(self.mortality_inhospital).to_string(),
        ]
    }
}

/// A single row of a time-stamped event log.
///
/// `charttime` and `value` are carried as source text; the partitioner never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub subject_id: SubjectId,
    pub hadm_id: Option<HadmId>,
    pub stay_id: Option<StayId>,
    pub charttime: String,
    pub itemid: i64,
    pub value: String,
    pub valueuom: String,
}

impl EventRecord {
    pub fn to_record(&self) -> [String; 7] {
        [
            self.subject_id.to_string(),
            self.hadm_id.map(|id| id.to_string()).unwrap_or_default(),
            self.stay_id.map(|id| id.to_string()).unwrap_or_default(),
            self.charttime.clone(),
            self.itemid.to_string(),
            self.value.clone(),
            self.valueuom.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn icd_version_parses_numbers_only() {
        assert_eq!("9".parse::<IcdVersion>(), Ok(IcdVersion::Icd9));
        assert_eq!("10".parse::<IcdVersion>(), Ok(IcdVersion::Icd10));
        assert_eq!(
            "11".parse::<IcdVersion>(),
            Err(ModelError::InvalidIcdVersion("11".to_string()))
        );
        assert_eq!(IcdVersion::Icd10.to_string(), "10");
    }

    #[test]
    fn cohort_row_record_matches_header_width() {
        let stay = IcuStay {
            subject_id: SubjectId::new(1),
            hadm_id: HadmId::new(10),
            stay_id: StayId::new(100),
            first_care_unit: "MICU".to_string(),
            last_care_unit: "MICU".to_string(),
            in_time: ts("2150-01-01 00:00:00"),
            out_time: ts("2150-01-02 12:00:00"),
            length_of_stay: Some(1.5),
        };
        let admission = Admission {
            subject_id: SubjectId::new(1),
            hadm_id: HadmId::new(10),
            admit_time: ts("2149-12-31 00:00:00"),
            discharge_time: ts("2150-01-05 00:00:00"),
            death_time: None,
            ethnicity: "WHITE".to_string(),
        };
        let patient = Patient {
            subject_id: SubjectId::new(1),
            gender: "F".to_string(),
            age: 64,
        };
        let row = CohortRow::join(stay, &admission, &patient);
        let record = row.to_record();
        assert_eq!(record.len(), STAY_COLUMNS.len());
        assert_eq!(record[5], "2150-01-01 00:00:00");
        assert_eq!(record[7], "1.5");
        assert_eq!(record[10], "");
        assert_eq!(record[14], "0");
    }

    #[test]
    fn event_record_renders_missing_ids_empty() {
        let event = EventRecord {
            subject_id: SubjectId::new(7),
            hadm_id: None,
            stay_id: None,
            charttime: "2150-01-01 00:00:00".to_string(),
            itemid: 50912,
            value: "1.1".to_string(),
            valueuom: "mg/dL".to_string(),
        };
        assert_eq!(
            event.to_record(),
            [
                "7".to_string(),
                String::new(),
                String::new(),
                "2150-01-01 00:00:00".to_string(),
                "50912".to_string(),
                "1.1".to_string(),
                "mg/dL".to_string(),
            ]
        );
    }
}
