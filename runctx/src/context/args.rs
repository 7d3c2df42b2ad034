//! Named construction arguments for context types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bag of named construction arguments passed to a context type's factory.
///
/// Keys are argument names; values are arbitrary JSON values, interpreted by
/// the context type being constructed. The bag is built by a single caller
/// before entry, so no interior locking is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextArgs {
    values: HashMap<String, serde_json::Value>,
}

impl ContextArgs {
    /// Creates an empty argument bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets an argument, replacing any existing value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Gets an argument value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Checks whether an argument is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns all argument names.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Iterates over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.values.iter()
    }
}

impl From<HashMap<String, serde_json::Value>> for ContextArgs {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}
