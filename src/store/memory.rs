//! In-process durable store.
//!
//! Records live as long as the store instance, which makes it useful for
//! embedding the coordinator without a filesystem and for tests that need a
//! durable tier shared across several coordinators (i.e. several "runs").

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::error::StoreError;
use super::{DurableRecord, DurableStore};

/// Map-backed store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, DurableRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<DurableRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(key).cloned())
    }

    async fn save(&self, record: &DurableRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DurableRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }
}
