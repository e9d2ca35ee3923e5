//! Request and response bodies of the worker-facing API.
//!
//! A `Value::Undefined` field is omitted from the JSON body, while `null` is
//! sent as `null`, so the two stay distinguishable over the wire.

use serde::{Deserialize, Serialize};

use crate::cache::{Completion, GetOutcome};
use crate::value::Value;

/// Query parameters of `GET .../get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetQuery {
    pub key: String,
    pub sig: String,
    /// Validity duration text (`"1h"`, `"500ms"`, `"infinite"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

/// Response of `GET .../get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum GetResponse {
    CacheHit {
        #[serde(default, skip_serializing_if = "Value::is_undefined")]
        value: Value,
    },
    CacheMiss {
        message: String,
    },
    SigMismatch {
        message: String,
    },
    Error {
        message: String,
    },
}

impl GetResponse {
    pub fn from_outcome(key: &str, outcome: GetOutcome) -> Self {
        match outcome {
            GetOutcome::Hit(value) => Self::CacheHit { value },
            GetOutcome::Miss(reason) => Self::CacheMiss {
                message: reason.to_string(),
            },
            GetOutcome::Mismatch(mismatch) => Self::SigMismatch {
                message: mismatch.describe(key),
            },
            GetOutcome::Error(message) => Self::Error { message },
        }
    }
}

/// Body of `POST .../set`. A present `error` finalizes the key as failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    #[serde(default, skip_serializing_if = "Value::is_undefined")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetRequest {
    pub fn into_parts(self) -> (String, Completion) {
        let completion = match self.error {
            Some(message) => Completion::Error(message),
            None => Completion::Value(self.value),
        };
        (self.key, completion)
    }
}

/// Query parameters of `GET .../get-stale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleQuery {
    pub key: String,
}

/// Response of `GET .../get-stale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleResponse {
    #[serde(default, skip_serializing_if = "Value::is_undefined")]
    pub value: Value,
}

/// Query parameters of `GET .../get-stale-list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaleListQuery {
    #[serde(default)]
    pub prefix: String,
}

/// Response of `GET .../get-stale-list`. Undefined elements are sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleListResponse {
    pub values: Vec<Value>,
}
