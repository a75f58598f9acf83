//! Id generation and the paging/filter/page types shared by controllers and clients.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generates correlation ids and entity ids.
pub struct IdGenerator;

impl IdGenerator {
    /// Short random id: 9 decimal digits. Used for correlation ids.
    #[must_use]
    pub fn next_short() -> String {
        rand::rng().random_range(100_000_000u32..1_000_000_000).to_string()
    }

    /// Long unique id: 32 lowercase hex characters. Used for entity ids.
    #[must_use]
    pub fn next_long() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Free-form string filter passed as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterParams(BTreeMap<String, String>);

impl FilterParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from `(key, value)` pairs.
    pub fn from_tuples<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Converts a JSON object into a filter. Non-string scalars are stringified,
    /// nulls dropped, anything that is not an object yields an empty filter.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        Self(
            map.iter()
                .filter_map(|(k, v)| match v {
                    Value::Null => None,
                    Value::String(s) => Some((k.clone(), s.clone())),
                    other => Some((k.clone(), other.to_string())),
                })
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Skip/take paging window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingParams {
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Whether the total count should be computed.
    pub total: bool,
}

impl PagingParams {
    #[must_use]
    pub fn new(skip: Option<u64>, take: Option<u64>, total: bool) -> Self {
        Self { skip, take, total }
    }

    /// Parses paging from a JSON object; numbers may also arrive as strings
    /// when they come from a query string.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let number = |key: &str| match value.get(key) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        let total = match value.get("total") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        };
        Self {
            skip: number("skip"),
            take: number("take"),
            total,
        }
    }

    /// Skip value, never below `min_skip`.
    #[must_use]
    pub fn get_skip(&self, min_skip: u64) -> u64 {
        self.skip.map_or(min_skip, |s| s.max(min_skip))
    }

    /// Take value, capped at `max_take`.
    #[must_use]
    pub fn get_take(&self, max_take: u64) -> u64 {
        self.take.map_or(max_take, |t| t.min(max_take))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> DataPage<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: Option<u64>) -> Self {
        Self { data, total }
    }
}
