// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Name to value registry

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0:?} is already registered")]
    Duplicate(String),
}

/// Names mapped to values, filled in during startup.
///
/// A name can be registered once; registering it again is an error and
/// leaves the existing value in place.
#[derive(Debug)]
pub struct Registry<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: V) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.insert(name, value);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&V> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries.remove(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Entries sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        let mut entries: Vec<(&str, &V)> =
            self.entries.iter().map(|(name, value)| (name.as_str(), value)).collect();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_add_keeps_first_value() {
        let mut registry = Registry::new();
        registry.add("fs", 1).unwrap();
        assert_eq!(registry.add("fs", 2), Err(RegistryError::Duplicate("fs".into())));
        assert_eq!(registry.find("fs"), Some(&1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_allows_re_adding() {
        let mut registry = Registry::new();
        registry.add("core", "a").unwrap();
        assert_eq!(registry.remove("core"), Some("a"));
        assert!(registry.find("core").is_none());
        registry.add("core", "b").unwrap();
        assert_eq!(registry.find("core"), Some(&"b"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = Registry::new();
        for name in ["subprocess", "core", "fs"] {
            registry.add(name, ()).unwrap();
        }
        assert_eq!(registry.names(), ["core", "fs", "subprocess"]);
        assert!(registry.find("missing").is_none());
    }
}
