//! Error types for the coordinator.

use thiserror::Error;

use crate::store::StoreError;

use super::entry::EntryState;

/// Errors returned by [`Coordinator`](super::Coordinator) operations.
///
/// Signature mismatches and failed computations are not errors; they are
/// reported through [`GetOutcome`](super::GetOutcome).
#[derive(Error, Debug)]
pub enum CacheError {
    /// `set` for a key that was never requested in this run.
    #[error("Cannot set value for key \"{key}\" that is not loaded")]
    NotLoaded { key: String },

    /// `set` for a key this run did not claim, or already finalized.
    #[error("Cannot set value for key \"{key}\" that is not in \"computing\" state ({state})")]
    NotComputing { key: String, state: EntryState },

    #[error("Durable store error: {0}")]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Returns `true` for caller protocol violations.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(self, Self::NotLoaded { .. } | Self::NotComputing { .. })
    }
}
