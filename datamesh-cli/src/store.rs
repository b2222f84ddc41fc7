//! JSON-array record store: one file per dataset, each row a flat object.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use datamesh_records::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ciphertexts and keys must go to different files, both were {0}")]
    SharedDestination(PathBuf),
}

pub fn load_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    load(path)
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded dataset");
    Ok(value)
}

pub fn save<T: Serialize + ?Sized>(path: &Path, dataset: &T) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), dataset).map_err(|source| {
        StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(path = %path.display(), "saved dataset");
    Ok(())
}

/// Refuses to write both halves of an encryption to the same file.
pub fn ensure_separate(ciphertexts: &Path, keys: &Path) -> Result<(), StoreError> {
    let same = ciphertexts == keys
        || matches!(
            (fs::canonicalize(ciphertexts), fs::canonicalize(keys)),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(StoreError::SharedDestination(keys.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use datamesh_records::Value;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn records_round_trip_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.json");
        let records = vec![
            Record::new().with("id", 1).with("name", "Ada").with("score", 9.5),
            Record::new().with("id", 2).with("name", Value::Null),
        ];
        save(&path, &records).unwrap();
        assert_eq!(load_records(&path).unwrap(), records);
    }

    #[test]
    fn reports_malformed_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(load_records(&path), Err(StoreError::Json { .. })));
        assert!(matches!(
            load_records(&dir.path().join("missing.json")),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn cipher_and_key_files_must_differ() {
        let dir = tempdir().unwrap();
        let cipher = dir.path().join("cipher.json");
        let keys = dir.path().join("keys.json");
        ensure_separate(&cipher, &keys).unwrap();
        assert!(matches!(
            ensure_separate(&cipher, &cipher),
            Err(StoreError::SharedDestination(_))
        ));

        fs::write(&cipher, "[]").unwrap();
        let aliased = dir.path().join(".").join("cipher.json");
        assert!(ensure_separate(&cipher, &aliased).is_err());
    }
}
