//! Convenient re-exports for common usage patterns.
//!
//! ```ignore
//! use global_cache::prelude::*;
//!
//! let cache = Coordinator::new(MemoryStore::new());
//! let outcome = cache.get("key", "sig", None).await?;
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Coordinator
pub use crate::cache::{
    CacheError, Completion, Coordinator, CoordinatorBuilder, EntrySnapshot, EntryState,
    GetOutcome, MissReason,
};

// Signatures and validity durations
pub use crate::signature::{CallSite, Signature, SignatureField, SignatureMismatch};
pub use crate::ttl::Ttl;

// Durable storage
#[cfg(feature = "fs")]
pub use crate::store::FsStore;
pub use crate::store::{DurableRecord, DurableStore, MemoryStore};

pub use crate::value::Value;
