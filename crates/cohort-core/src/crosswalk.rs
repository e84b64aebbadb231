//! ICD-10 to ICD-9 crosswalk and diagnosis normalization.
//!
//! The crosswalk is partial: not every ICD-10 code has an ICD-9 target. Rows
//! whose code has no target are dropped from the normalized output, and every
//! such loss is accounted for in a [`CrosswalkReport`].

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use cohort_ingest::{ColumnSpec, LoadError, Projection, open_source};
use cohort_model::{DiagnosisAssignment, DiagnosisRecord, IcdVersion};

use crate::diagnoses::{DiagnosisDictionary, attach_titles};

const CROSSWALK_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("icd10cm").with_aliases(&["icd10", "icd_10", "source"]),
    ColumnSpec::required("icd9cm").with_aliases(&["icd9", "icd_9", "target"]),
];

/// Target placeholder used by General Equivalence Mappings for "no diagnosis".
const NO_DIAGNOSIS: &str = "NODX";

/// Canonical form used for crosswalk keys: trimmed, dot-free, uppercase.
pub fn normalize_code(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| *ch != '.')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Result of a crosswalk lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrosswalkLookup<'a> {
    Mapped(&'a str),
    Unmapped,
}

/// Counters collected while building a crosswalk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrosswalkBuildStats {
    pub rows: usize,
    pub entries: usize,
    /// Rows whose target is blank or the "no diagnosis" placeholder.
    pub no_target_rows: usize,
    /// Rows without a usable source code.
    pub malformed_rows: usize,
    /// Rows mapping an already-mapped source code to a different target.
    /// The first mapping wins.
    pub conflicting_rows: usize,
}

/// Static many-to-one ICD-10 → ICD-9 translation table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Crosswalk {
    entries: HashMap<String, String>,
    stats: CrosswalkBuildStats,
}

impl Crosswalk {
    /// Builds a crosswalk from `(icd10, icd9)` pairs.
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut crosswalk = Self::default();
        for (source, target) in pairs {
            crosswalk.insert(source.as_ref(), target.as_ref());
        }
        crosswalk
    }

    /// Loads a crosswalk table with `icd10cm` and `icd9cm` columns.
    ///
    /// Structurally broken rows are counted as malformed rather than failing the
    /// load; I/O failures and missing columns are fatal.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let start = Instant::now();
        let input = open_source(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);
        let headers = reader
            .headers()
            .map_err(|error| LoadError::Csv {
                path: path.to_path_buf(),
                error,
            })?
            .clone();
        let projection = Projection::resolve(CROSSWALK_COLUMNS, &headers, path)?;
        let mut crosswalk = Self::default();
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) if error.is_io_error() => {
                    return Err(LoadError::Csv {
                        path: path.to_path_buf(),
                        error,
                    });
                }
                Err(_) => {
                    crosswalk.stats.rows += 1;
                    crosswalk.stats.malformed_rows += 1;
                    continue;
                }
            }
            let row = projection.row(&record);
            crosswalk.insert(row.raw("icd10cm"), row.raw("icd9cm"));
        }
        debug!(
            path = %path.display(),
            rows = crosswalk.stats.rows,
            entries = crosswalk.stats.entries,
            duration_ms = start.elapsed().as_millis(),
            "crosswalk loaded"
        );
        if crosswalk.stats.malformed_rows > 0 || crosswalk.stats.conflicting_rows > 0 {
            warn!(
                malformed_rows = crosswalk.stats.malformed_rows,
                conflicting_rows = crosswalk.stats.conflicting_rows,
                "crosswalk contains rows that were not used"
            );
        }
        Ok(crosswalk)
    }

    fn insert(&mut self, source: &str, target: &str) {
        self.stats.rows += 1;
        let source = normalize_code(source);
        if source.is_empty() {
            self.stats.malformed_rows += 1;
            return;
        }
        let target = normalize_code(target);
        if target.is_empty() || target == NO_DIAGNOSIS {
            self.stats.no_target_rows += 1;
            return;
        }
        match self.entries.get(&source) {
            Some(existing) if *existing != target => self.stats.conflicting_rows += 1,
            Some(_) => {}
            None => {
                self.entries.insert(source, target);
                self.stats.entries += 1;
            }
        }
    }

    pub fn lookup(&self, code: &str) -> CrosswalkLookup<'_> {
        match self.entries.get(&normalize_code(code)) {
            Some(target) => CrosswalkLookup::Mapped(target),
            None => CrosswalkLookup::Unmapped,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CrosswalkBuildStats {
        self.stats
    }
}

/// Coverage summary of one normalization pass.
///
/// `output_rows + unmapped_rows == input_rows` always holds. `input_rows`
/// counts assignments that survived the dictionary join; those that did not
/// are counted in `untitled_rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrosswalkReport {
    pub untitled_rows: usize,
    pub input_rows: usize,
    pub icd9_rows: usize,
    pub icd10_rows: usize,
    pub mapped_rows: usize,
    pub unmapped_rows: usize,
    pub unmapped_codes: BTreeSet<String>,
    pub output_rows: usize,
}

impl CrosswalkReport {
    pub fn is_balanced(&self) -> bool {
        self.output_rows + self.unmapped_rows == self.input_rows
    }

    /// Fraction of ICD-10 rows that found a target; 1.0 when there were none.
    pub fn icd10_coverage(&self) -> f64 {
        if self.icd10_rows == 0 {
            1.0
        } else {
            self.mapped_rows as f64 / self.icd10_rows as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedDiagnoses {
    /// ICD-9 records sorted by `(subject_id, hadm_id, sequence_number)`.
    pub records: Vec<DiagnosisRecord>,
    pub report: CrosswalkReport,
}

/// Titles raw assignments against `dictionary`, then normalizes the titled
/// records. Assignments without a title never reach the crosswalk.
pub fn normalize_assignments(
    assignments: Vec<DiagnosisAssignment>,
    dictionary: &DiagnosisDictionary,
    crosswalk: &Crosswalk,
) -> NormalizedDiagnoses {
    let titled = attach_titles(assignments, dictionary);
    let mut normalized = normalize_diagnoses(titled.records, crosswalk);
    normalized.report.untitled_rows = titled.untitled_rows;
    normalized
}

/// Rewrites ICD-10 diagnoses onto ICD-9.
///
/// ICD-9 records pass through unchanged. ICD-10 records found in the crosswalk
/// get the target code and version 9; the long title stays the one of the
/// source code. Records without a target are dropped and accounted for.
pub fn normalize_diagnoses(records: Vec<DiagnosisRecord>, crosswalk: &Crosswalk) -> NormalizedDiagnoses {
    let mut report = CrosswalkReport {
        input_rows: records.len(),
        ..CrosswalkReport::default()
    };
    let mut output = Vec::with_capacity(records.len());
    for mut record in records {
        match record.icd_version {
            IcdVersion::Icd9 => {
                report.icd9_rows += 1;
                output.push(record);
            }
            IcdVersion::Icd10 => {
                report.icd10_rows += 1;
                match crosswalk.lookup(&record.icd_code) {
                    CrosswalkLookup::Mapped(target) => {
                        report.mapped_rows += 1;
                        record.icd_code = target.to_string();
                        record.icd_version = IcdVersion::Icd9;
                        output.push(record);
                    }
                    CrosswalkLookup::Unmapped => {
                        report.unmapped_rows += 1;
                        report.unmapped_codes.insert(record.icd_code.trim().to_string());
                    }
                }
            }
        }
    }
    output.sort_by_key(|record| (record.subject_id, record.hadm_id, record.sequence_number));
    report.output_rows = output.len();
    info!(
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        unmapped_rows = report.unmapped_rows,
        unmapped_codes = report.unmapped_codes.len(),
        "diagnosis codes normalized"
    );
    if report.unmapped_rows > 0 {
        warn!(
            unmapped_rows = report.unmapped_rows,
            unmapped_codes = report.unmapped_codes.len(),
            "diagnoses dropped: ICD-10 codes without an ICD-9 target"
        );
    }
    NormalizedDiagnoses {
        records: output,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_model::{DiagnosisTitle, HadmId, SubjectId};

    fn diagnosis(seq: i64, code: &str, version: IcdVersion) -> DiagnosisRecord {
        DiagnosisRecord {
            subject_id: SubjectId::new(1),
            hadm_id: HadmId::new(10),
            sequence_number: seq,
            icd_code: code.to_string(),
            icd_version: version,
            long_title: String::new(),
        }
    }

    #[test]
    fn maps_known_codes_and_reports_unknown_ones() {
        let crosswalk = Crosswalk::from_pairs([("A01", "B01")]);
        let result = normalize_diagnoses(
            vec![
                diagnosis(1, "A01", IcdVersion::Icd10),
                diagnosis(2, "Z99", IcdVersion::Icd10),
            ],
            &crosswalk,
        );
        assert_eq!(result.records, vec![diagnosis(1, "B01", IcdVersion::Icd9)]);
        assert_eq!(
            result.report.unmapped_codes,
            BTreeSet::from(["Z99".to_string()])
        );
        assert_eq!(result.report.unmapped_rows, 1);
        assert_eq!(result.report.output_rows, 1);
        assert_eq!(result.report.input_rows, 2);
        assert!(result.report.is_balanced());
        assert!((result.report.icd10_coverage() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn icd9_rows_pass_through_and_output_is_sorted() {
        let crosswalk = Crosswalk::default();
        let result = normalize_diagnoses(
            vec![
                diagnosis(3, "4019", IcdVersion::Icd9),
                diagnosis(1, "25000", IcdVersion::Icd9),
            ],
            &crosswalk,
        );
        let seqs: Vec<i64> = result.records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(result.report.icd9_rows, 2);
        assert_eq!(result.report.unmapped_rows, 0);
    }

    #[test]
    fn rewritten_records_keep_the_source_title() {
        let dictionary = DiagnosisDictionary::new(vec![
            DiagnosisTitle {
                icd_code: "I10".to_string(),
                icd_version: IcdVersion::Icd10,
                long_title: "Essential (primary) hypertension".to_string(),
            },
            DiagnosisTitle {
                icd_code: "4019".to_string(),
                icd_version: IcdVersion::Icd9,
                long_title: "Unspecified essential hypertension".to_string(),
            },
        ]);
        let assignments = vec![
            DiagnosisAssignment {
                subject_id: SubjectId::new(1),
                hadm_id: HadmId::new(10),
                sequence_number: 2,
                icd_code: "I10".to_string(),
                icd_version: IcdVersion::Icd10,
            },
            DiagnosisAssignment {
                subject_id: SubjectId::new(1),
                hadm_id: HadmId::new(10),
                sequence_number: 1,
                icd_code: "XXXX".to_string(),
                icd_version: IcdVersion::Icd9,
            },
        ];
        let result = normalize_assignments(
            assignments,
            &dictionary,
            &Crosswalk::from_pairs([("I10", "4019")]),
        );
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].icd_code, "4019");
        assert_eq!(result.records[0].icd_version, IcdVersion::Icd9);
        assert_eq!(result.records[0].long_title, "Essential (primary) hypertension");
        assert_eq!(result.report.untitled_rows, 1);
        assert_eq!(result.report.input_rows, 1);
        assert!(result.report.is_balanced());
    }

    #[test]
    fn lookup_ignores_dots_and_case() {
        let crosswalk = Crosswalk::from_pairs([("I10", "4019")]);
        assert_eq!(crosswalk.lookup("i1.0"), CrosswalkLookup::Mapped("4019"));
        assert_eq!(crosswalk.lookup("I11"), CrosswalkLookup::Unmapped);
    }

    #[test]
    fn build_stats_separate_malformed_from_missing_targets() {
        let crosswalk = Crosswalk::from_pairs([
            ("I10", "4019"),
            ("I10", "4011"),
            ("", "4019"),
            ("R69", "NoDx"),
            ("R68", ""),
        ]);
        let stats = crosswalk.stats();
        assert_eq!(stats.rows, 5);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.conflicting_rows, 1);
        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(stats.no_target_rows, 2);
        assert_eq!(crosswalk.lookup("I10"), CrosswalkLookup::Mapped("4019"));
        assert_eq!(crosswalk.lookup("R69"), CrosswalkLookup::Unmapped);
    }
}
