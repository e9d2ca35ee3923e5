//! Run-scoped cache coordination.
//!
//! A [`Coordinator`] answers two requests. `get` returns a value, parks the
//! caller until another caller's computation finishes, or hands the caller
//! the exclusive right to compute. `set` finalizes that computation. Keys
//! requested with a validity duration are also written to a
//! [`DurableStore`](crate::store::DurableStore) and reused by later runs.

mod clock;
mod coordinator;
mod entry;
mod error;
mod registry;
mod waiters;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{Completion, Coordinator, CoordinatorBuilder, GetOutcome, MissReason};
pub use entry::{EntrySnapshot, EntryState, ValueEntry};
pub use error::CacheError;
pub use registry::RunRegistry;
pub use waiters::{WaitOutcome, Waiters};
