//! Raw submitted values
//!
//! A submission maps field handles to either a scalar string or, for
//! multi-valued controls, a list of strings. Missing handles are absent
//! values and are treated as the empty string by the validator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single submitted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedValue {
    Text(String),
    List(Vec<String>),
}

impl SubmittedValue {
    /// The scalar text, if this is not a list
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SubmittedValue::Text(s) => Some(s),
            SubmittedValue::List(_) => None,
        }
    }

    /// Empty string, or a list with no non-empty entries
    pub fn is_blank(&self) -> bool {
        match self {
            SubmittedValue::Text(s) => s.is_empty(),
            SubmittedValue::List(items) => items.iter().all(|s| s.is_empty()),
        }
    }

    /// Number of submitted entries; a scalar counts as one
    pub fn count(&self) -> usize {
        match self {
            SubmittedValue::Text(_) => 1,
            SubmittedValue::List(items) => items.len(),
        }
    }

    /// Number of non-empty entries
    pub fn selected_count(&self) -> usize {
        match self {
            SubmittedValue::Text(s) => usize::from(!s.is_empty()),
            SubmittedValue::List(items) => items.iter().filter(|s| !s.is_empty()).count(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            SubmittedValue::Text(s) => Value::String(s.clone()),
            SubmittedValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for SubmittedValue {
    fn from(s: &str) -> Self {
        SubmittedValue::Text(s.to_string())
    }
}

impl From<String> for SubmittedValue {
    fn from(s: String) -> Self {
        SubmittedValue::Text(s)
    }
}

impl From<Vec<String>> for SubmittedValue {
    fn from(items: Vec<String>) -> Self {
        SubmittedValue::List(items)
    }
}

impl From<Vec<&str>> for SubmittedValue {
    fn from(items: Vec<&str>) -> Self {
        SubmittedValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Raw submission keyed by field handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSubmission {
    values: BTreeMap<String, SubmittedValue>,
}

impl RawSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, handle: impl Into<String>, value: impl Into<SubmittedValue>) -> Self {
        self.insert(handle, value);
        self
    }

    /// Insert or replace the value for a handle
    pub fn insert(&mut self, handle: impl Into<String>, value: impl Into<SubmittedValue>) {
        self.values.insert(handle.into(), value.into());
    }

    /// Look up the submitted value for a handle
    pub fn get(&self, handle: &str) -> Option<&SubmittedValue> {
        self.values.get(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.values.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubmittedValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Opaque JSON payload stored on a submission record
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

impl<K, V> FromIterator<(K, V)> for RawSubmission
where
    K: Into<String>,
    V: Into<SubmittedValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut raw = RawSubmission::new();
        for (k, v) in iter {
            raw.insert(k, v);
        }
        raw
    }
}
