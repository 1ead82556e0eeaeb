// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache for require()

use crate::fs::CanonicalPath;
use sable_script::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Cached module entry
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Canonical path the module resolved to
    pub canonical_path: CanonicalPath,
    /// The identifier first used to require the module
    pub id: String,
    /// The module's exports
    pub exports: Value,
    /// Whether the module has finished evaluating
    pub loaded: bool,
}

/// Canonical path to module record. Entries are inserted before evaluation
/// so circular requires see the partially populated exports.
#[derive(Debug, Default)]
pub struct ModuleCache {
    cache: RefCell<BTreeMap<CanonicalPath, ModuleRecord>>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached module by path
    pub fn get(&self, path: &str) -> Option<ModuleRecord> {
        self.cache.borrow().get(path).cloned()
    }

    /// The exports of a cached module
    pub fn exports(&self, path: &str) -> Option<Value> {
        self.cache.borrow().get(path).map(|record| record.exports.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, path: &str) -> bool {
        self.cache.borrow().contains_key(path)
    }

    /// Add a module to the cache
    pub fn insert(&self, record: ModuleRecord) {
        self.cache
            .borrow_mut()
            .insert(record.canonical_path.clone(), record);
    }

    /// Preseeds a finished module.
    pub fn preseed(&self, path: impl Into<CanonicalPath>, exports: Value) {
        let path = path.into();
        self.insert(ModuleRecord {
            id: path.clone(),
            canonical_path: path,
            exports,
            loaded: true,
        });
    }

    /// Replaces a module's exports after `module.exports` was reassigned.
    pub fn set_exports(&self, path: &str, exports: Value) {
        if let Some(record) = self.cache.borrow_mut().get_mut(path) {
            record.exports = exports;
        }
    }

    /// Marks a module as fully evaluated.
    pub fn mark_loaded(&self, path: &str) {
        if let Some(record) = self.cache.borrow_mut().get_mut(path) {
            record.loaded = true;
        }
    }

    /// Remove a module from the cache
    pub fn remove(&self, path: &str) -> Option<ModuleRecord> {
        self.cache.borrow_mut().remove(path)
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Get all cached module paths, sorted
    pub fn keys(&self) -> Vec<CanonicalPath> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Snapshot of every record, sorted by path
    pub fn records(&self) -> Vec<ModuleRecord> {
        self.cache.borrow().values().cloned().collect()
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_script::ObjectRef;

    #[test]
    fn test_lifecycle() {
        let cache = ModuleCache::new();
        let exports = Value::Object(ObjectRef::ordinary());
        cache.insert(ModuleRecord {
            canonical_path: "file:///r/a.js".into(),
            id: "a".into(),
            exports: exports.clone(),
            loaded: false,
        });
        assert!(cache.has("file:///r/a.js"));
        assert!(!cache.get("file:///r/a.js").unwrap().loaded);

        cache.mark_loaded("file:///r/a.js");
        assert!(cache.get("file:///r/a.js").unwrap().loaded);
        assert_eq!(cache.exports("file:///r/a.js"), Some(exports));

        cache.set_exports("file:///r/a.js", Value::Number(1.0));
        assert_eq!(cache.exports("file:///r/a.js"), Some(Value::Number(1.0)));

        assert!(cache.remove("file:///r/a.js").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_preseed_and_keys() {
        let cache = ModuleCache::default();
        cache.preseed("file:///r/b.js", Value::Null);
        cache.preseed("file:///r/a.js", Value::Null);
        assert_eq!(cache.keys(), ["file:///r/a.js", "file:///r/b.js"]);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.keys().is_empty());
    }
}
