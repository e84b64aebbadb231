use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::source::{open_source, resolve_source};
use crate::table::{Projection, SourceTable};

/// Loads typed relations from an export directory.
#[derive(Debug, Clone)]
pub struct TableLoader {
    root: PathBuf,
}

impl TableLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the whole relation `T` from `<root>/<T::SOURCE>.csv[.gz]`.
    pub fn load<T: SourceTable>(&self) -> Result<Vec<T>> {
        let path = resolve_source(&self.root, T::SOURCE)?;
        load_table_from_path(&path)
    }
}

/// Loads a relation from an explicit path, preserving row order.
///
/// Any row that fails to convert aborts the load: later joins depend on row
/// identity, so rows are never silently dropped here.
pub fn load_table_from_path<T: SourceTable>(path: &Path) -> Result<Vec<T>> {
    let start = Instant::now();
    let input = open_source(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let headers = reader
        .headers()
        .map_err(|error| csv_error(path, error))?
        .clone();
    let projection = Projection::resolve(T::COLUMNS, &headers, path)?;
    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => return Err(csv_error(path, error)),
        }
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = record.position().map_or(0, csv::Position::line);
        let row = T::from_row(&projection.row(&record))
            .map_err(|error| error.into_load_error(path.to_path_buf(), line))?;
        rows.push(row);
    }
    debug!(
        source = T::SOURCE,
        path = %path.display(),
        rows = rows.len(),
        duration_ms = start.elapsed().as_millis(),
        "table loaded"
    );
    Ok(rows)
}

pub(crate) fn csv_error(path: &Path, error: csv::Error) -> LoadError {
    LoadError::Csv {
        path: path.to_path_buf(),
        error,
    }
}
