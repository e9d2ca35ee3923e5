//! Cached payloads.
//!
//! Values cross two serialization boundaries (HTTP and the durable store), and
//! both must keep "no value" apart from `null`. [`Value::Undefined`] models the
//! former: a struct field holding it is omitted from the output, and an omitted
//! field reads back as `Undefined`.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Reply {
//!     #[serde(default, skip_serializing_if = "Value::is_undefined")]
//!     value: Value,
//! }
//! ```
//!
//! Nested `Undefined` cannot survive JSON: array elements become `null` and
//! object members are dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Longest rendering returned by [`Value::preview`] before truncation.
const PREVIEW_LEN: usize = 50;

/// A computed value, or the explicit absence of one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The producer returned nothing. Distinct from `Null`.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Convert to JSON, applying the lossy rules for nested `Undefined`.
    ///
    /// A top-level `Undefined` has no JSON form and yields `None`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Undefined => None,
            other => Some(other.to_json_nested()),
        }
    }

    fn to_json_nested(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json_nested).collect())
            }
            Self::Object(members) => serde_json::Value::Object(
                members
                    .iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json_nested()))
                    .collect(),
            ),
        }
    }

    /// Short human-readable rendering for logs and CLI listings.
    pub fn preview(&self) -> String {
        let Some(json) = self.to_json() else {
            return "<undefined>".to_string();
        };
        let text = json.to_string();
        if text.chars().count() <= PREVIEW_LEN {
            return text;
        }
        let head: String = text.chars().take(PREVIEW_LEN).collect();
        format!("{}...", head)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(members) => Self::Object(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Option<serde_json::Value>> for Value {
    fn from(json: Option<serde_json::Value>) -> Self {
        json.map(Self::from).unwrap_or_default()
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Some(json) => write!(f, "{}", json),
            None => f.write_str("undefined"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    // Undefined elements serialize as null via the arm above.
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(members) => {
                let present = members.iter().filter(|(_, v)| !v.is_undefined());
                let mut map = serializer.serialize_map(None)?;
                for (k, v) in present {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
