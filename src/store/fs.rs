//! One-JSON-file-per-key durable store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::logging::{debug, warn};
use crate::value::Value;

use super::error::StoreError;
use super::{DurableRecord, DurableStore};

/// Extension of record files.
const RECORD_EXT: &str = "json";

/// On-disk record layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    /// Absent in legacy records; the file mtime stands in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    computed_at: Option<u64>,
    /// Absent in legacy records; the file stem stands in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default)]
    sig: String,
    #[serde(default, skip_serializing_if = "Value::is_undefined")]
    value: Value,
}

/// Filesystem store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    base_path: PathBuf,
}

impl FsStore {
    /// Create a store under `base_path`. The directory is created on first save.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.{}", filenamify(key), RECORD_EXT))
    }

    async fn read_record(
        &self,
        path: &Path,
        fallback_key: &str,
    ) -> Result<Option<DurableRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let stored: StoredRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::json(path, e))?;

        let computed_at = match stored.computed_at {
            Some(ms) => ms,
            None => {
                warn!(path = %path.display(), "record without computedAt, using file mtime");
                modified_millis(path).await?
            }
        };

        Ok(Some(DurableRecord {
            key: stored.key.unwrap_or_else(|| fallback_key.to_string()),
            value: stored.value,
            signature: stored.sig,
            computed_at,
        }))
    }
}

impl DurableStore for FsStore {
    async fn load(&self, key: &str) -> Result<Option<DurableRecord>, StoreError> {
        let path = self.record_path(key);
        let record = self.read_record(&path, key).await?;
        debug!(key = %key, found = record.is_some(), "durable load");
        Ok(record)
    }

    async fn save(&self, record: &DurableRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| StoreError::io(&self.base_path, e))?;

        let stored = StoredRecord {
            computed_at: Some(record.computed_at),
            key: Some(record.key.clone()),
            sig: record.signature.clone(),
            value: record.value.clone(),
        };
        let path = self.record_path(&record.key);
        let content =
            serde_json::to_string_pretty(&stored).map_err(|e| StoreError::json(&path, e))?;

        // Readers never observe a half-written record.
        let tmp_path = path.with_extension(format!("{}.tmp", RECORD_EXT));
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!(key = %record.key, path = %path.display(), "durable save");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "durable delete");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<DurableRecord>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.base_path, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.base_path, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(record) = self.read_record(&path, &stem).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

async fn modified_millis(path: &Path) -> Result<u64, StoreError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    let modified = metadata.modified().map_err(|e| StoreError::io(path, e))?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    Ok(millis)
}

/// Make a key safe to use as a file name.
///
/// Reserved characters (`< > : " / \ | ? *`) and control characters become
/// `-` one for one; remaining whitespace runs collapse into a single `-`.
pub fn filenamify(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_space = false;
    for c in key.chars() {
        if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control() {
            out.push('-');
            in_space = false;
        } else if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(key: &str, value: Value) -> DurableRecord {
        DurableRecord {
            key: key.to_string(),
            value,
            signature: "sig".to_string(),
            computed_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_filenamify() {
        assert_eq!(filenamify("user/profile:1"), "user-profile-1");
        assert_eq!(filenamify("a   b"), "a-b");
        assert_eq!(filenamify("a\tb"), "a-b");
        assert_eq!(filenamify("plain-key_1"), "plain-key_1");
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path().join("cache"));

        assert_eq!(store.load("k").await.unwrap(), None);

        let saved = record("k", Value::from(42));
        store.save(&saved).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(saved));

        store.delete("k").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), None);
        // Deleting twice is fine.
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_undefined_value_is_distinct_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        store.save(&record("nothing", Value::Undefined)).await.unwrap();
        store.save(&record("null", Value::Null)).await.unwrap();

        let nothing = store.load("nothing").await.unwrap().unwrap();
        assert_eq!(nothing.value, Value::Undefined);
        let null = store.load("null").await.unwrap().unwrap();
        assert_eq!(null.value, Value::Null);
    }

    #[tokio::test]
    async fn test_legacy_record_uses_mtime_and_stem() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        std::fs::write(dir.path().join("old.json"), r#"{"sig": "s1", "value": [1, 2]}"#).unwrap();

        let loaded = store.load("old").await.unwrap().unwrap();
        assert_eq!(loaded.key, "old");
        assert_eq!(loaded.signature, "s1");
        assert!(loaded.computed_at > 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[tokio::test]
    async fn test_list_sorted_by_key() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.list().await.unwrap().is_empty());

        store.save(&record("b/2", Value::from(2))).await.unwrap();
        store.save(&record("a 1", Value::from(1))).await.unwrap();

        let keys: Vec<_> = store.list().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a 1".to_string(), "b/2".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_filenamify_is_path_safe(key in ".{0,40}") {
            let name = filenamify(&key);
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.contains('\\'));
            prop_assert!(!name.chars().any(|c| c.is_control() || c.is_whitespace()));
        }
    }
}
