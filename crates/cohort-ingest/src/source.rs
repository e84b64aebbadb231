//! Resolution and opening of named sources under an export root.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{LoadError, Result};

/// Module directories of a MIMIC-IV export, searched after the root itself.
pub const MODULE_DIRS: [&str; 3] = ["core", "hosp", "icu"];

/// Resolves `<name>.csv`, then `<name>.csv.gz`, first under `root` and then
/// under each of [`MODULE_DIRS`]. A name that already carries a module
/// prefix (`icu/chartevents`) resolves directly against `root`.
pub fn resolve_source(root: &Path, name: &str) -> Result<PathBuf> {
    let bases = std::iter::once(root.to_path_buf())
        .chain(MODULE_DIRS.iter().map(|module| root.join(module)));
    for base in bases {
        for extension in ["csv", "csv.gz"] {
            let candidate = base.join(format!("{name}.{extension}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(LoadError::SourceNotFound {
        source_name: name.to_string(),
        root: root.to_path_buf(),
    })
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Opens a source file for a single linear scan, decoding gzip transparently.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            LoadError::SourceNotFound {
                source_name: path.display().to_string(),
                root: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                error,
            }
        }
    })?;
    let reader = BufReader::with_capacity(1 << 16, file);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Normalizes a header cell: trims whitespace and BOM, lowercases.
pub(crate) fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_plain_csv_over_gzip() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("patients.csv"), "subject_id\n").unwrap();
        std::fs::write(dir.path().join("patients.csv.gz"), b"").unwrap();
        let path = resolve_source(dir.path(), "patients").expect("resolve");
        assert_eq!(path, dir.path().join("patients.csv"));
    }

    #[test]
    fn finds_sources_in_module_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("hosp")).unwrap();
        std::fs::create_dir_all(dir.path().join("icu")).unwrap();
        std::fs::write(dir.path().join("hosp/labevents.csv.gz"), b"").unwrap();
        std::fs::write(dir.path().join("icu/chartevents.csv"), "subject_id\n").unwrap();

        let labs = resolve_source(dir.path(), "labevents").expect("resolve labevents");
        assert_eq!(labs, dir.path().join("hosp/labevents.csv.gz"));
        let prefixed = resolve_source(dir.path(), "icu/chartevents").expect("resolve prefixed");
        assert_eq!(prefixed, dir.path().join("icu/chartevents.csv"));
    }

    #[test]
    fn root_level_source_shadows_module_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("core")).unwrap();
        std::fs::write(dir.path().join("patients.csv.gz"), b"").unwrap();
        std::fs::write(dir.path().join("core/patients.csv"), "subject_id\n").unwrap();
        let path = resolve_source(dir.path(), "patients").expect("resolve");
        assert_eq!(path, dir.path().join("patients.csv.gz"));
    }

    #[test]
    fn missing_source_is_reported_by_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = resolve_source(dir.path(), "icustays").unwrap_err();
        assert!(matches!(
            err,
            LoadError::SourceNotFound { ref source_name, .. } if source_name == "icustays"
        ));
    }

    #[test]
    fn header_normalization_strips_bom_and_case() {
        assert_eq!(normalize_header("\u{feff}SUBJECT_ID "), "subject_id");
    }
}
