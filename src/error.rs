//! Unified error type for the global-cache library.

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;
use crate::ttl::TtlError;

/// Any error produced by this crate.
///
/// # Example
///
/// ```ignore
/// use global_cache::{Result, Ttl};
///
/// fn parse(input: &str) -> Result<Option<Ttl>> {
///     Ok(Ttl::parse(input)?)
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ttl(#[from] TtlError),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if a caller broke the claim/finalize protocol.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(self, Self::Cache(e) if e.is_protocol_misuse())
    }

    /// Returns `true` if the durable store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Cache(CacheError::Store(_)))
    }
}
