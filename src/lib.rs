//! Compute-once value cache shared by parallel workers.
//!
//! Many worker processes (for example parallel test executors) ask one
//! coordinating process for a value by key. The first asker computes it, the
//! others wait for that result, and keys requested with a validity duration
//! are persisted so later runs can reuse them until they expire or the code
//! that produces them changes.
//!
//! # Quick Start
//!
//! ```ignore
//! use global_cache::prelude::*;
//!
//! let cache = Coordinator::new(FsStore::new(".global-cache"));
//! let ttl = Ttl::parse("1h")?;
//! let sig = Signature::compute(&CallSite::capture(), ttl, "load_fixtures()");
//!
//! match cache.get("fixtures", sig.as_str(), ttl).await? {
//!     GetOutcome::Hit(value) => use_value(value),
//!     GetOutcome::Miss(_) => {
//!         let value = load_fixtures().await;
//!         cache.set("fixtures", Completion::Value(value)).await?;
//!     }
//!     GetOutcome::Mismatch(m) => eprintln!("{}", m.describe("fixtures")),
//!     GetOutcome::Error(message) => return Err(message.into()),
//! }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Run registry, waiters and the get/set coordinator
//! - [`signature`] - Call signatures and mismatch diagnostics
//! - [`store`] - Durable storage for persistent keys
//! - [`ttl`] - Validity durations
//! - [`value`] - Cached payloads with a distinct "no value"
//! - [`server`] - HTTP API (requires `server` feature)
//!
//! # Feature Flags
//!
//! - `fs` - Filesystem durable store (enabled by default)
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the `global-cache` inspection binary
//! - `server` - Enable the HTTP API server
//! - `full` - Enable all features

pub mod cache;
mod logging;
pub mod prelude;
#[cfg(feature = "server")]
pub mod server;
pub mod signature;
pub mod store;
pub mod ttl;
pub mod value;

mod error;

pub use error::{Error, Result};

pub use cache::{
    CacheError, Completion, Coordinator, CoordinatorBuilder, EntrySnapshot, EntryState,
    GetOutcome, MissReason,
};
pub use signature::{CallSite, Signature, SignatureField, SignatureMismatch};
#[cfg(feature = "fs")]
pub use store::FsStore;
pub use store::{DurableRecord, DurableStore, MemoryStore, StoreError};
pub use ttl::{Ttl, TtlError};
pub use value::Value;
