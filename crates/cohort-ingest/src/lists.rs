//! Identifier allow-list files: one integer per line.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

use cohort_model::parse_integer;

use crate::error::{LoadError, Result};
use crate::source::open_source;

/// Reads an allow-list of integer identifiers.
///
/// Blank lines and `#` comments are ignored, as is a non-numeric first line
/// (a column header). Only the first comma-separated field is considered.
pub fn read_id_list(path: &Path) -> Result<BTreeSet<i64>> {
    let reader = BufReader::new(open_source(path)?);
    let mut ids = BTreeSet::new();
    let mut seen_content = false;
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|error| LoadError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let field = line.split(',').next().unwrap_or("").trim();
        if field.is_empty() || field.starts_with('#') {
            continue;
        }
        match parse_integer(field) {
            Some(id) => {
                ids.insert(id);
            }
            None if !seen_content => {}
            None => {
                return Err(LoadError::Field {
                    path: path.to_path_buf(),
                    line: index as u64 + 1,
                    column: "id".to_string(),
                    value: field.to_string(),
                    reason: "expected integer".to_string(),
                });
            }
        }
        seen_content = true;
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_comments_and_blanks() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "itemid,label\n# vitals\n220045,HR\n\n220210\n220045\n").unwrap();
        let ids = read_id_list(&path).expect("read ids");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![220045, 220210]);
    }

    #[test]
    fn rejects_non_numeric_after_first_entry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("subjects.txt");
        std::fs::write(&path, "10001\nabc\n").unwrap();
        let err = read_id_list(&path).unwrap_err();
        assert!(matches!(err, LoadError::Field { line: 2, .. }));
    }
}
