//! Per-key value entries and their state transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::DurableRecord;
use crate::value::Value;

/// Lifecycle state of a key within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryState {
    Missing,
    Computing,
    Computed,
    Expired,
    SignatureChanged,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::Computing => "computing",
            Self::Computed => "computed",
            Self::Expired => "expired",
            Self::SignatureChanged => "signature-changed",
        })
    }
}

/// Run-scoped bookkeeping for one key.
///
/// Only `computed` entries hold a `value`. `previous_value` is filled when a
/// persistent entry is invalidated and read back by stale lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub(crate) key: String,
    pub(crate) signature: String,
    pub(crate) state: EntryState,
    pub(crate) value: Value,
    pub(crate) previous_value: Value,
    pub(crate) computed_at: Option<u64>,
    /// Fixed on first access: `true` iff that access carried a TTL.
    pub(crate) persistent: bool,
}

impl ValueEntry {
    pub(crate) fn missing(key: &str, signature: &str, persistent: bool) -> Self {
        Self {
            key: key.to_string(),
            signature: signature.to_string(),
            state: EntryState::Missing,
            value: Value::Undefined,
            previous_value: Value::Undefined,
            computed_at: None,
            persistent,
        }
    }

    /// A computed entry for `key` loaded from the durable store.
    pub(crate) fn from_record(key: &str, record: DurableRecord) -> Self {
        Self {
            key: key.to_string(),
            signature: record.signature,
            state: EntryState::Computed,
            value: record.value,
            previous_value: Value::Undefined,
            computed_at: Some(record.computed_at),
            persistent: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// Leave `computed` for `expired` or `signature-changed`, keeping the old
    /// value around for stale reads.
    pub(crate) fn invalidate(&mut self, to: EntryState) {
        debug_assert!(matches!(to, EntryState::Expired | EntryState::SignatureChanged));
        self.previous_value = std::mem::take(&mut self.value);
        self.computed_at = None;
        self.state = to;
    }

    /// Take the exclusive right to compute. Returns the state claimed from.
    pub(crate) fn claim(&mut self) -> EntryState {
        let from = self.state;
        self.state = EntryState::Computing;
        self.value = Value::Undefined;
        self.computed_at = None;
        from
    }

    pub(crate) fn complete(&mut self, value: Value, now: u64) {
        self.state = EntryState::Computed;
        self.value = value;
        self.computed_at = Some(now);
    }

    pub(crate) fn fail(&mut self) {
        self.state = EntryState::Missing;
        self.value = Value::Undefined;
        self.computed_at = None;
    }

    /// Persistent keys report the value from before this run's recomputation;
    /// memory-only keys report their current value.
    pub fn stale_value(&self) -> &Value {
        if self.persistent {
            &self.previous_value
        } else {
            &self.value
        }
    }

    /// Durable form of a computed entry.
    pub(crate) fn to_record(&self) -> DurableRecord {
        DurableRecord {
            key: self.key.clone(),
            value: self.value.clone(),
            signature: self.signature.clone(),
            computed_at: self.computed_at.unwrap_or_default(),
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            key: self.key.clone(),
            state: self.state,
            persistent: self.persistent,
            computed_at: self.computed_at,
            value: self.value.clone(),
            previous_value: self.previous_value.clone(),
        }
    }
}

/// Read-only copy of an entry, as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub key: String,
    pub state: EntryState,
    pub persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Value::is_undefined")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Value::is_undefined")]
    pub previous_value: Value,
}
