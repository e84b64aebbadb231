//! Per-subject partition directories and their files.
//!
//! Directory and file creation is idempotent: finding an existing directory
//! or file is reported as [`Creation::Existing`], never as an error.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use tracing::debug;

use cohort_model::{
    CohortDiagnosis, CohortRow, DIAGNOSIS_COLUMNS, STAY_COLUMNS, StayKey, SubjectId,
};

use crate::cohort::Cohort;
use crate::error::{PartitionError, Result};
use crate::phenotype::LabelMatrix;

pub const STAYS_FILE: &str = "stays.csv";
pub const DIAGNOSES_FILE: &str = "diagnoses.csv";
pub const EVENTS_FILE: &str = "events.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    Existing,
}

pub fn partition_dir(root: &Path, subject_id: SubjectId) -> PathBuf {
    root.join(subject_id.to_string())
}

/// Creates `<root>/<subject_id>` if it does not exist yet.
pub fn ensure_partition_dir(root: &Path, subject_id: SubjectId) -> Result<(PathBuf, Creation)> {
    let dir = partition_dir(root, subject_id);
    match fs::create_dir(&dir) {
        Ok(()) => Ok((dir, Creation::Created)),
        Err(error) if error.kind() == ErrorKind::AlreadyExists && dir.is_dir() => {
            Ok((dir, Creation::Existing))
        }
        Err(error) => Err(PartitionError::io(dir, error)),
    }
}

/// Creates `path` holding only `header` if it does not exist yet.
///
/// An existing empty file also receives the header, so the header is written
/// exactly once however often this is called.
pub fn ensure_file_with_header(path: &Path, header: &[&str]) -> Result<Creation> {
    let (file, creation) = match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => (file, Creation::Created),
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|error| PartitionError::io(path, error))?;
            (file, Creation::Existing)
        }
        Err(error) => return Err(PartitionError::io(path, error)),
    };
    let len = file
        .metadata()
        .map_err(|error| PartitionError::io(path, error))?
        .len();
    if len == 0 {
        let mut writer = headerless_writer(file);
        writer
            .write_record(header)
            .map_err(|error| PartitionError::csv(path, error))?;
        writer
            .flush()
            .map_err(|error| PartitionError::io(path, error))?;
    }
    Ok(creation)
}

/// Appends records to an existing file.
pub fn append_records<I, R>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|error| PartitionError::io(path, error))?;
    let mut writer = headerless_writer(file);
    let mut written = 0;
    for record in records {
        writer
            .write_record(record)
            .map_err(|error| PartitionError::csv(path, error))?;
        written += 1;
    }
    writer
        .flush()
        .map_err(|error| PartitionError::io(path, error))?;
    Ok(written)
}

fn headerless_writer(file: File) -> Writer<File> {
    WriterBuilder::new().has_headers(false).from_writer(file)
}

/// Replaces `path` with `header` followed by `records`.
fn write_records<I, R>(path: &Path, header: &[&str], records: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let file = File::create(path).map_err(|error| PartitionError::io(path, error))?;
    let mut writer = headerless_writer(file);
    writer
        .write_record(header)
        .map_err(|error| PartitionError::csv(path, error))?;
    for record in records {
        writer
            .write_record(record)
            .map_err(|error| PartitionError::csv(path, error))?;
    }
    writer
        .flush()
        .map_err(|error| PartitionError::io(path, error))
}

/// Writes `<root>/<subject_id>/stays.csv` for every cohort subject, rows
/// ordered by ICU admission time. Returns the number of subjects written.
pub fn write_subject_stays(root: &Path, cohort: &Cohort) -> Result<usize> {
    let mut by_subject: BTreeMap<SubjectId, Vec<&CohortRow>> = BTreeMap::new();
    for row in cohort.rows() {
        by_subject.entry(row.subject_id()).or_default().push(row);
    }
    for (subject_id, rows) in &mut by_subject {
        rows.sort_by_key(|row| (row.stay.in_time, row.stay.stay_id));
        let (dir, _) = ensure_partition_dir(root, *subject_id)?;
        write_records(
            &dir.join(STAYS_FILE),
            &STAY_COLUMNS,
            rows.iter().map(|row| row.to_record()),
        )?;
    }
    debug!(subjects = by_subject.len(), "subject stays written");
    Ok(by_subject.len())
}

/// Writes `<root>/<subject_id>/diagnoses.csv`, rows ordered by
/// `(stay_id, seq_num)`. Returns the number of subjects written.
///
/// With `labels`, every row also carries one `0`/`1` column per label group,
/// taken from the row of its stay; stays without a label row read as `0`.
pub fn write_subject_diagnoses(
    root: &Path,
    diagnoses: &[CohortDiagnosis],
    labels: Option<&LabelMatrix>,
) -> Result<usize> {
    let mut by_subject: BTreeMap<SubjectId, Vec<&CohortDiagnosis>> = BTreeMap::new();
    for diagnosis in diagnoses {
        by_subject
            .entry(diagnosis.record.subject_id)
            .or_default()
            .push(diagnosis);
    }
    let groups = labels.map(LabelMatrix::groups).unwrap_or_default();
    let header: Vec<&str> = DIAGNOSIS_COLUMNS
        .iter()
        .copied()
        .chain(groups.iter().map(String::as_str))
        .collect();
    for (subject_id, rows) in &mut by_subject {
        rows.sort_by_key(|row| (row.stay_id, row.record.sequence_number));
        let (dir, _) = ensure_partition_dir(root, *subject_id)?;
        write_records(
            &dir.join(DIAGNOSES_FILE),
            &header,
            rows.iter().map(|row| labelled_record(row, labels)),
        )?;
    }
    debug!(
        subjects = by_subject.len(),
        label_groups = groups.len(),
        "subject diagnoses written"
    );
    Ok(by_subject.len())
}

fn labelled_record(diagnosis: &CohortDiagnosis, labels: Option<&LabelMatrix>) -> Vec<String> {
    let mut record = Vec::from(diagnosis.to_record());
    if let Some(labels) = labels {
        let key = StayKey {
            subject_id: diagnosis.record.subject_id,
            hadm_id: diagnosis.record.hadm_id,
            stay_id: diagnosis.stay_id,
        };
        match labels.row(&key) {
            Some(row) => record.extend(row.iter().map(|label| u8::from(*label).to_string())),
            None => record.extend(labels.groups().iter().map(|_| "0".to_string())),
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_model::{DiagnosisRecord, HadmId, IcdVersion, StayId};

    #[test]
    fn directory_creation_is_idempotent() {
        let root = tempfile::tempdir().expect("temp dir");
        let subject = SubjectId::new(42);
        let (dir, first) = ensure_partition_dir(root.path(), subject).expect("first");
        let (_, second) = ensure_partition_dir(root.path(), subject).expect("second");
        assert_eq!(first, Creation::Created);
        assert_eq!(second, Creation::Existing);
        assert!(dir.ends_with("42"));
    }

    #[test]
    fn header_is_written_once() {
        let root = tempfile::tempdir().expect("temp dir");
        let path = root.path().join("events.csv");
        let header = ["a", "b"];
        assert_eq!(
            ensure_file_with_header(&path, &header).expect("first"),
            Creation::Created
        );
        assert_eq!(
            ensure_file_with_header(&path, &header).expect("second"),
            Creation::Existing
        );
        append_records(&path, [["1", "2"]]).expect("append");
        ensure_file_with_header(&path, &header).expect("third");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn empty_existing_file_gets_header() {
        let root = tempfile::tempdir().expect("temp dir");
        let path = root.path().join("events.csv");
        fs::write(&path, "").unwrap();
        assert_eq!(
            ensure_file_with_header(&path, &["a"]).expect("header"),
            Creation::Existing
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    fn diagnosis(stay: i64, seq: i64, code: &str) -> CohortDiagnosis {
        CohortDiagnosis {
            stay_id: StayId::new(stay),
            record: DiagnosisRecord {
                subject_id: SubjectId::new(1),
                hadm_id: HadmId::new(10),
                sequence_number: seq,
                icd_code: code.to_string(),
                icd_version: IcdVersion::Icd9,
                long_title: "t".to_string(),
            },
        }
    }

    #[test]
    fn diagnoses_carry_label_columns_of_their_stay() {
        let root = tempfile::tempdir().expect("temp dir");
        let mut labels = LabelMatrix::new(vec!["Sepsis".to_string(), "Shock".to_string()]);
        let labelled = StayKey {
            subject_id: SubjectId::new(1),
            hadm_id: HadmId::new(10),
            stay_id: StayId::new(100),
        };
        labels.set(labelled, "Shock", true);

        let subjects = write_subject_diagnoses(
            root.path(),
            &[diagnosis(101, 1, "4019"), diagnosis(100, 2, "78552"), diagnosis(100, 1, "99591")],
            Some(&labels),
        )
        .expect("write");

        assert_eq!(subjects, 1);
        assert_eq!(
            fs::read_to_string(root.path().join("1").join(DIAGNOSES_FILE)).unwrap(),
            "subject_id,hadm_id,stay_id,seq_num,icd_code,icd_version,long_title,Sepsis,Shock\n\
             1,10,100,1,99591,9,t,0,1\n\
             1,10,100,2,78552,9,t,0,1\n\
             1,10,101,1,4019,9,t,0,0\n"
        );
    }

    #[test]
    fn diagnoses_without_labels_keep_the_plain_columns() {
        let root = tempfile::tempdir().expect("temp dir");
        write_subject_diagnoses(root.path(), &[diagnosis(100, 1, "4019")], None).expect("write");
        assert_eq!(
            fs::read_to_string(root.path().join("1").join(DIAGNOSES_FILE)).unwrap(),
            "subject_id,hadm_id,stay_id,seq_num,icd_code,icd_version,long_title\n\
             1,10,100,1,4019,9,t\n"
        );
    }
}
