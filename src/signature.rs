//! Call signatures used to detect stale or colliding cache keys.
//!
//! A signature fingerprints *how* a value is produced: where the request was
//! made from, the validity duration it asked for, and the text of the compute
//! function. Any change to one of them invalidates a persisted value, and two
//! call sites sharing a key within a run are reported as a conflict.
//!
//! Signatures travel as strings. Older stored records may carry an opaque
//! plain-string signature; those are compared by literal equality.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

use crate::ttl::Ttl;

/// Source location of the code requesting a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite(String);

impl CallSite {
    /// Record the location of the caller of this function.
    ///
    /// Propagate `#[track_caller]` through wrapper functions so the recorded
    /// frame stays in user code.
    #[track_caller]
    pub fn capture() -> Self {
        let loc = Location::caller();
        Self(format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
    }

    /// A call site reported by a remote client, e.g. a stack-frame line.
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded signature fields, in comparison order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Fields {
    ttl: String,
    call_site: String,
    #[serde(rename = "fn")]
    body: String,
}

/// String-encoded signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Fingerprint a call.
    pub fn compute(call_site: &CallSite, ttl: Option<Ttl>, fn_body: &str) -> Self {
        let fields = Fields {
            ttl: ttl.map_or_else(|| "none".to_string(), |t| t.to_string()),
            call_site: call_site.to_string(),
            body: normalize_body(fn_body),
        };
        // A struct of three strings always serializes.
        let encoded = serde_json::to_string(&fields).unwrap_or_default();
        Self(encoded)
    }

    /// Wrap an already-encoded signature received from a client.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_body(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The signature component that differs between two calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureField {
    Ttl,
    CallSite,
    FunctionBody,
    /// Legacy signatures have no fields; the whole string differs.
    Signature,
}

impl fmt::Display for SignatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ttl => "ttl",
            Self::CallSite => "call site",
            Self::FunctionBody => "function body",
            Self::Signature => "signature",
        })
    }
}

/// Explanation of why two signatures differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMismatch {
    pub field: SignatureField,
    /// Value recorded by the first call (or the stored record).
    pub stored: String,
    /// Value sent by the current call.
    pub current: String,
}

impl SignatureMismatch {
    /// Human-oriented warning for a key requested with a different signature.
    pub fn describe(&self, key: &str) -> String {
        format!(
            "Signature mismatch ({field}). Please ensure you don't request key \"{key}\" from multiple places.\n\
             1st call {field}: {stored}\n\
             2nd call {field}: {current}",
            field = self.field,
            key = key,
            stored = self.stored,
            current = self.current,
        )
    }
}

/// Compare a stored signature with the one sent by the current caller.
pub fn compare(stored: &str, current: &str) -> Option<SignatureMismatch> {
    if stored == current {
        return None;
    }

    let decoded = serde_json::from_str::<Fields>(stored)
        .ok()
        .zip(serde_json::from_str::<Fields>(current).ok());

    let Some((old, new)) = decoded else {
        return Some(SignatureMismatch {
            field: SignatureField::Signature,
            stored: stored.to_string(),
            current: current.to_string(),
        });
    };

    let pairs = [
        (SignatureField::Ttl, old.ttl, new.ttl),
        (SignatureField::CallSite, old.call_site, new.call_site),
        (SignatureField::FunctionBody, old.body, new.body),
    ];
    pairs
        .into_iter()
        .find(|(_, a, b)| a != b)
        .map(|(field, stored, current)| SignatureMismatch {
            field,
            stored,
            current,
        })
}
