//! Draft Persistence - Local Snapshots
//!
//! One JSON envelope per form id, last write wins. The store is a side
//! channel: a failed write downgrades the auto-save status, it never
//! touches in-memory values, and a corrupt file reads as "no draft".

use crate::schema::FormValues;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Draft encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftEnvelope {
    form_id: String,
    saved_at: DateTime<Utc>,
    checksum: String,
    values: FormValues,
}

/// Directory-backed draft store, one `draft_form_<formId>.json` per form.
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, form_id: &str) -> PathBuf {
        self.dir.join(format!("draft_form_{}.json", form_id))
    }

    /// Persist a full snapshot of the current values.
    pub fn save(&self, form_id: &str, values: &FormValues) -> Result<(), DraftError> {
        let envelope = DraftEnvelope {
            form_id: form_id.to_string(),
            saved_at: Utc::now(),
            checksum: values_checksum(values)?,
            values: values.clone(),
        };
        let encoded = serde_json::to_string_pretty(&envelope)?;
        fs::write(self.entry_path(form_id), encoded)?;
        Ok(())
    }

    /// Load the draft for a form id. Absent, unreadable, undecodable, and
    /// checksum-mismatched entries all read as `None`; a bad draft must
    /// never take the session down.
    pub fn load(&self, form_id: &str) -> Option<FormValues> {
        let path = self.entry_path(form_id);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("ignoring unreadable draft {}: {}", path.display(), e);
                return None;
            }
        };
        let envelope: DraftEnvelope = match serde_json::from_str(&content) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("ignoring corrupt draft {}: {}", path.display(), e);
                return None;
            }
        };
        match values_checksum(&envelope.values) {
            Ok(checksum) if checksum == envelope.checksum => Some(envelope.values),
            Ok(_) => {
                log::warn!("ignoring draft {} with stale checksum", path.display());
                None
            }
            Err(e) => {
                log::warn!("ignoring unverifiable draft {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove the draft for a form id. Removing a draft that does not
    /// exist is not an error.
    pub fn delete(&self, form_id: &str) -> Result<(), DraftError> {
        match fs::remove_file(self.entry_path(form_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// SHA-256 over the JSON encoding of the values. `serde_json` maps are
/// ordered by key, so the encoding is stable across runs and the checksum
/// is reproducible.
fn values_checksum(values: &FormValues) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(&serde_json::to_value(values)?)?;
    let digest = Sha256::digest(&encoded);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldValue;

    fn sample_values() -> FormValues {
        let mut values = FormValues::new();
        values.insert("name".to_string(), FieldValue::Text("Jane".to_string()));
        values.insert("age".to_string(), FieldValue::Number(34.0));
        values.insert("smoker".to_string(), FieldValue::Bool(false));
        values
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let values = sample_values();
        store.save("health", &values).unwrap();
        assert_eq!(store.load("health"), Some(values));
    }

    #[test]
    fn absent_draft_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        assert_eq!(store.load("missing"), None);
    }

    #[test]
    fn corrupt_draft_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("draft_form_health.json"), "{not json").unwrap();
        assert_eq!(store.load("health"), None);
    }

    #[test]
    fn tampered_draft_fails_checksum_and_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        store.save("health", &sample_values()).unwrap();

        let path = dir.path().join("draft_form_health.json");
        let tampered = fs::read_to_string(&path).unwrap().replace("Jane", "Mallory");
        fs::write(&path, tampered).unwrap();
        assert_eq!(store.load("health"), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        store.save("health", &sample_values()).unwrap();
        store.delete("health").unwrap();
        store.delete("health").unwrap();
        assert_eq!(store.load("health"), None);
    }

    #[test]
    fn checksum_is_reproducible() {
        let values = sample_values();
        let a = values_checksum(&values).unwrap();
        let b = values_checksum(&values.clone()).unwrap();
        assert_eq!(a, b);
    }
}
