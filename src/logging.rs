//! Library-side log events of the cache engine.
//!
//! Each macro forwards to the matching `tracing` macro when the `logging`
//! feature is on and expands to an empty statement otherwise, so embedding
//! the coordinator never requires a subscriber.
//!
//! | level | emitted for |
//! |-------|-------------|
//! | trace | every `get` request, waiter release |
//! | debug | hits, claims, completions, durable load/save/delete |
//! | info  | run clears, durable values invalidated by a signature change |
//! | warn  | in-run signature mismatches, legacy or foreign durable records |
//! | error | durable writes that fail after waiters were released |
//!
//! ```rust,ignore
//! use crate::logging::{debug, warn};
//!
//! debug!(key = %key, "claimed");
//! warn!(key = %key, field = %mismatch.field, "signature mismatch");
//! ```

macro_rules! log_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::trace!($($arg)*);
        }
    };
}

macro_rules! log_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::debug!($($arg)*);
        }
    };
}

macro_rules! log_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::info!($($arg)*);
        }
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::warn!($($arg)*);
        }
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::error!($($arg)*);
        }
    };
}

pub(crate) use log_debug as debug;
pub(crate) use log_error as error;
pub(crate) use log_info as info;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;
