use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::codec::CodecError;

/// Auxiliary index attributes of a view, keyed by column name.
///
/// These are the lookup columns stored next to the serialized payload. Derived
/// queries select on them in storage, and session matchers usually test them in
/// memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexColumns(BTreeMap<String, Value>);

impl IndexColumns {
    pub fn new() -> Self {
        IndexColumns(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Insert any serializable value. Values that cannot be represented as JSON
    /// are stored as `null`.
    pub fn insert_serialized<T: Serialize + ?Sized>(&mut self, column: &str, value: &T) {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(
                target: "view_cache::view",
                column,
                error = %e,
                "index column is not representable, storing null"
            );
            Value::Null
        });
        self.0.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// Decode a column into a typed value. Missing columns yield `None`.
    pub fn decode<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>, CodecError> {
        match self.0.get(column) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| CodecError::Decode(format!("column {}: {}", column, e))),
            None => Ok(None),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
