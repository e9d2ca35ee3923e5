//! Durable storage for persistent keys.
//!
//! Records outlive a run: a value computed with a validity duration is
//! written here and reloaded by later runs until it expires or its signature
//! changes. The coordinator is generic over [`DurableStore`] so the backend
//! can be swapped; [`FsStore`] keeps one JSON file per key and
//! [`MemoryStore`] keeps records in process memory.

mod error;
#[cfg(feature = "fs")]
mod fs;
mod memory;

use std::future::Future;

pub use error::StoreError;
#[cfg(feature = "fs")]
pub use fs::{FsStore, filenamify};
pub use memory::MemoryStore;

use crate::value::Value;

/// A value persisted beyond the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct DurableRecord {
    pub key: String,
    pub value: Value,
    /// Encoded signature of the call that produced `value`.
    pub signature: String,
    /// Epoch milliseconds of the computation.
    pub computed_at: u64,
}

/// Backend for persistent records.
///
/// Calls for one key are serialized by the coordinator's claim protocol, so
/// implementations need no per-key locking of their own.
pub trait DurableStore: Send + Sync + 'static {
    /// Load the record for `key`, or `None` when nothing is stored.
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<DurableRecord>, StoreError>> + Send;

    /// Create or replace the record for `record.key`.
    fn save(&self, record: &DurableRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the record for `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All stored records, ordered by key.
    fn list(&self) -> impl Future<Output = Result<Vec<DurableRecord>, StoreError>> + Send;
}
