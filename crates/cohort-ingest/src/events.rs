//! Row-by-row reading of large event logs.
//!
//! Event logs are far too large to materialize; [`EventReader`] performs a
//! single linear scan and yields one row at a time. Rows that cannot be
//! converted are reported as [`EventRow::Malformed`] so the caller can skip
//! and count them, while I/O failures end the scan with an error.

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};

use cohort_model::EventRecord;

use crate::error::{FieldError, Result};
use crate::loader::csv_error;
use crate::source::{open_source, resolve_source};
use crate::table::{ColumnSpec, ProjectedRow, Projection};

/// Columns projected from every event log. `stay_id` is absent from some logs.
pub const EVENT_SOURCE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("subject_id"),
    ColumnSpec::required("hadm_id"),
    ColumnSpec::optional("stay_id").with_aliases(&["icustay_id"]),
    ColumnSpec::required("charttime"),
    ColumnSpec::required("itemid"),
    ColumnSpec::required("value"),
    ColumnSpec::required("valueuom"),
];

/// One item of an event scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRow {
    Event(EventRecord),
    /// A row that could not be converted. `column` is `None` for structural
    /// problems such as invalid UTF-8.
    Malformed { line: u64, column: Option<String> },
}

pub struct EventReader {
    path: PathBuf,
    reader: Reader<Box<dyn Read>>,
    projection: Projection,
    record: StringRecord,
    rows_read: u64,
}

impl EventReader {
    /// Opens the event log `<root>/<name>.csv[.gz]`.
    pub fn open_source(root: &Path, name: &str) -> Result<Self> {
        let path = resolve_source(root, name)?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let input = open_source(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);
        let headers = reader
            .headers()
            .map_err(|error| csv_error(path, error))?
            .clone();
        let projection = Projection::resolve(EVENT_SOURCE_COLUMNS, &headers, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            projection,
            record: StringRecord::new(),
            rows_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of non-blank data rows scanned so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Whether the log carries a stay identifier column.
    pub fn has_stay_ids(&self) -> bool {
        self.projection.has_column("stay_id")
    }
}

fn convert(row: &ProjectedRow<'_>) -> std::result::Result<EventRecord, FieldError> {
    Ok(EventRecord {
        subject_id: row.id("subject_id")?,
        hadm_id: row.optional_id("hadm_id")?,
        stay_id: row.optional_id("stay_id")?,
        charttime: row.text("charttime"),
        itemid: row.integer("itemid")?,
        value: row.text("value"),
        valueuom: row.text("valueuom"),
    })
}

impl Iterator for EventReader {
    type Item = Result<EventRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(error) if error.is_io_error() => {
                    return Some(Err(csv_error(&self.path, error)));
                }
                Err(error) => {
                    self.rows_read += 1;
                    let line = error.position().map_or(0, csv::Position::line);
                    return Some(Ok(EventRow::Malformed { line, column: None }));
                }
            }
            if self.record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            self.rows_read += 1;
            let line = self.record.position().map_or(0, csv::Position::line);
            let row = match convert(&self.projection.row(&self.record)) {
                Ok(event) => EventRow::Event(event),
                Err(FieldError::Invalid { column, .. } | FieldError::Timestamp { column, .. }) => {
                    EventRow::Malformed {
                        line,
                        column: Some(column),
                    }
                }
            };
            return Some(Ok(row));
        }
    }
}

impl std::fmt::Debug for EventReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("path", &self.path)
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}

