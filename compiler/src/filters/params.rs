//! Bind parameter table
//!
//! Collects bound values during one compilation pass. Names are minted from
//! a counter (`p1`, `p2`, ...) and never reused until the table is reset.

use serde_json::{Map, Value};

use super::types::BindValue;

/// Default prefix for minted placeholder names
pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "p";

/// Collects SQL parameters during query building (maintains insertion order)
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParams {
    prefix: String,
    counter: usize,
    values: Vec<(String, BindValue)>,
}

impl Default for SqlParams {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PLACEHOLDER_PREFIX)
    }
}

impl SqlParams {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counter: 0,
            values: Vec::new(),
        }
    }

    /// Bind a value under a fresh name and return that name (without the colon)
    pub fn allocate(&mut self, value: impl Into<BindValue>) -> String {
        self.counter += 1;
        let name = format!("{}{}", self.prefix, self.counter);
        self.values.push((name.clone(), value.into()));
        name
    }

    /// Bind a value and return its `:name` placeholder, ready to embed in SQL
    pub fn placeholder(&mut self, value: impl Into<BindValue>) -> String {
        format!(":{}", self.allocate(value))
    }

    pub fn get(&self, name: &str) -> Option<&BindValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Clear all bound values and restart numbering
    pub fn reset(&mut self) {
        self.counter = 0;
        self.values.clear();
    }

    /// Ordered `name -> value` JSON object
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    serde_json::to_value(value).unwrap_or(Value::Null),
                )
            })
            .collect();
        Value::Object(map)
    }
}
