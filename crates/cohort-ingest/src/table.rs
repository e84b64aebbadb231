//! Column projection over delimited source rows.
//!
//! A [`SourceTable`] names its source and the fixed set of columns it needs.
//! Headers are matched case-insensitively; columns outside the projection are
//! never read.

use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;

use cohort_model::{parse_integer, parse_timestamp};

use crate::error::{FieldError, LoadError, Result};
use crate::source::normalize_header;

/// A projected column, optionally known under alternate header names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Optional columns may be absent from the header; their cells read as empty.
    pub optional: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            optional: false,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            optional: true,
        }
    }

    pub const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn matches(&self, header: &str) -> bool {
        self.name == header || self.aliases.contains(&header)
    }
}

/// A typed relation loadable from a named source.
pub trait SourceTable: Sized {
    /// Source name, resolved to `<root>/<SOURCE>.csv[.gz]`.
    const SOURCE: &'static str;
    const COLUMNS: &'static [ColumnSpec];

    fn from_row(row: &ProjectedRow<'_>) -> std::result::Result<Self, FieldError>;
}

/// Header positions of the projected columns.
#[derive(Debug, Clone)]
pub struct Projection {
    columns: &'static [ColumnSpec],
    indices: Vec<Option<usize>>,
}

impl Projection {
    pub fn resolve(
        columns: &'static [ColumnSpec],
        headers: &StringRecord,
        path: &Path,
    ) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut indices = Vec::with_capacity(columns.len());
        for spec in columns {
            let index = normalized.iter().position(|header| spec.matches(header));
            if index.is_none() && !spec.optional {
                return Err(LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: spec.name.to_string(),
                });
            }
            indices.push(index);
        }
        Ok(Self { columns, indices })
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> ProjectedRow<'a> {
        ProjectedRow {
            projection: self,
            record,
        }
    }

    /// Whether a projected column was found in the header.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name)
            .and_then(|pos| self.indices[pos])
            .is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|spec| spec.name == name)
    }
}

/// A source row viewed through a [`Projection`].
#[derive(Debug, Clone, Copy)]
pub struct ProjectedRow<'a> {
    projection: &'a Projection,
    record: &'a StringRecord,
}

impl<'a> ProjectedRow<'a> {
    /// Raw trimmed cell for a projected column. Absent optional columns and
    /// short rows read as empty.
    pub fn raw(&self, column: &str) -> &'a str {
        debug_assert!(
            self.projection.position(column).is_some(),
            "column `{column}` is not projected"
        );
        self.projection
            .position(column)
            .and_then(|pos| self.projection.indices[pos])
            .and_then(|index| self.record.get(index))
            .map(str::trim)
            .unwrap_or("")
    }

    pub fn text(&self, column: &str) -> String {
        self.raw(column).to_string()
    }

    pub fn integer(&self, column: &str) -> std::result::Result<i64, FieldError> {
        let value = self.raw(column);
        parse_integer(value).ok_or_else(|| FieldError::invalid(column, value, "expected integer"))
    }

    pub fn optional_integer(&self, column: &str) -> std::result::Result<Option<i64>, FieldError> {
        if self.raw(column).is_empty() {
            return Ok(None);
        }
        self.integer(column).map(Some)
    }

    pub fn id<T: From<i64>>(&self, column: &str) -> std::result::Result<T, FieldError> {
        self.integer(column).map(T::from)
    }

    pub fn optional_id<T: From<i64>>(
        &self,
        column: &str,
    ) -> std::result::Result<Option<T>, FieldError> {
        self.optional_integer(column).map(|value| value.map(T::from))
    }

    pub fn optional_float(&self, column: &str) -> std::result::Result<Option<f64>, FieldError> {
        let value = self.raw(column);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FieldError::invalid(column, value, "expected number"))
    }

    pub fn timestamp(&self, column: &str) -> std::result::Result<NaiveDateTime, FieldError> {
        let value = self.raw(column);
        parse_timestamp(value).ok_or_else(|| FieldError::Timestamp {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    pub fn optional_timestamp(
        &self,
        column: &str,
    ) -> std::result::Result<Option<NaiveDateTime>, FieldError> {
        if self.raw(column).is_empty() {
            return Ok(None);
        }
        self.timestamp(column).map(Some)
    }
}
