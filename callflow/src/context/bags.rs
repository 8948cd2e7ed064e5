//! Per-call attribute bag.

use crate::errors::DataConflictError;
use std::collections::{HashMap, HashSet};

/// A string-keyed bag of per-call attributes.
///
/// Writing to an existing key with [`Attributes::set`] raises a
/// `DataConflictError`. Keys written with [`Attributes::seal`] also refuse
/// [`Attributes::set_force`] and [`Attributes::remove`], which keeps values
/// such as the correlation id immutable once attached.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    data: HashMap<String, serde_json::Value>,
    sealed: HashSet<String>,
}

impl Attributes {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value from the bag.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a value in the bag.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(DataConflictError::new(key));
        }
        self.data.insert(key, value);
        Ok(())
    }

    /// Sets a value once and seals the key against later overwrite or removal.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn seal(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let key = key.into();
        self.set(key.clone(), value)?;
        self.sealed.insert(key);
        Ok(())
    }

    /// Returns true if the key was written with [`Attributes::seal`].
    #[must_use]
    pub fn is_sealed(&self, key: &str) -> bool {
        self.sealed.contains(key)
    }

    /// Sets a value, allowing overwrites of unsealed keys.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key is sealed.
    pub fn set_force(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let key = key.into();
        if self.sealed.contains(&key) {
            return Err(DataConflictError::new(key));
        }
        self.data.insert(key, value);
        Ok(())
    }

    /// Removes an unsealed value, returning it if present.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key is sealed.
    pub fn remove(&mut self, key: &str) -> Result<Option<serde_json::Value>, DataConflictError> {
        if self.sealed.contains(key) {
            return Err(DataConflictError::new(key));
        }
        Ok(self.data.remove(key))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_is_write_once() {
        let mut bag = Attributes::new();
        bag.set("call_id", json!("abc")).unwrap();

        let err = bag.set("call_id", json!("other")).unwrap_err();
        assert_eq!(err.key, "call_id");
        assert_eq!(bag.get_str("call_id"), Some("abc"));
    }

    #[test]
    fn test_set_force_overwrites() {
        let mut bag = Attributes::new();
        bag.set_force("counter", json!(1)).unwrap();
        bag.set_force("counter", json!(2)).unwrap();
        assert_eq!(bag.get("counter"), Some(&json!(2)));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_get_str_ignores_non_strings() {
        let mut bag = Attributes::new();
        bag.set("n", json!(3)).unwrap();
        assert!(bag.get_str("n").is_none());
        assert!(bag.get_str("missing").is_none());
    }

    #[test]
    fn test_remove() {
        let mut bag = Attributes::new();
        bag.set("k", json!(true)).unwrap();
        assert_eq!(bag.remove("k").unwrap(), Some(json!(true)));
        assert!(bag.is_empty());
    }

    #[test]
    fn test_sealed_key_refuses_overwrite_and_removal() {
        let mut bag = Attributes::new();
        bag.seal("call_id", json!("abc")).unwrap();
        assert!(bag.is_sealed("call_id"));

        assert_eq!(bag.set_force("call_id", json!("other")).unwrap_err().key, "call_id");
        assert_eq!(bag.remove("call_id").unwrap_err().key, "call_id");
        assert!(bag.seal("call_id", json!("again")).is_err());
        assert_eq!(bag.get_str("call_id"), Some("abc"));
    }
}
