// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The package manifest and the checker that validates `require()` calls
//! against it.
//!
//! ```json
//! {
//!   "main.js": {
//!     "dependencies": { "panel": { "url": "file:///addon/lib/panel.js" } },
//!     "needsChrome": false
//!   },
//!   "panel.js": { "needsChrome": true, "e10s-adapter": "panel-e10s-adapter.js" }
//! }
//! ```

use crate::error::Result;
use crate::fs::{CanonicalPath, SourceFile};
use crate::module_system::SecurityPolicy;
use parking_lot::Mutex;
use sable_script::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// A declared dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Where the packager found the dependency; `None` when it could not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// What the manifest knows about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Identifiers the module may require
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    /// Whether the module needs the elevated principal
    #[serde(default, rename = "needsChrome")]
    pub needs_chrome: bool,
    /// Adapter to run in the restricted process instead of the module
    #[serde(default, rename = "e10s-adapter", skip_serializing_if = "Option::is_none")]
    pub e10s_adapter: Option<String>,
}

/// Canonical path to manifest entry. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<CanonicalPath, ManifestEntry>,
}

impl Manifest {
    /// Parses manifest JSON. Relative paths (entry keys, adapters and
    /// dependency URLs) are joined onto `root`.
    pub fn from_json(json: &str, root: Option<&Url>) -> Result<Self> {
        let raw: BTreeMap<String, ManifestEntry> = serde_json::from_str(json)?;
        let mut entries = BTreeMap::new();
        for (key, mut entry) in raw {
            entry.e10s_adapter = entry.e10s_adapter.map(|adapter| absolutize(&adapter, root));
            for dependency in entry.dependencies.values_mut() {
                dependency.url = dependency.url.take().map(|url| absolutize(&url, root));
            }
            entries.insert(absolutize(&key, root), entry);
        }
        tracing::debug!(entries = entries.len(), "manifest loaded");
        Ok(Self { entries })
    }

    /// Reads a manifest file.
    pub fn load(path: impl AsRef<Path>, root: Option<&Url>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, root)
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, path: impl Into<CanonicalPath>, entry: ManifestEntry) {
        self.entries.insert(path.into(), entry);
    }

    /// The entry for a canonical path.
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true for an empty manifest.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalPath, &ManifestEntry)> {
        self.entries.iter()
    }
}

fn absolutize(path: &str, root: Option<&Url>) -> String {
    if Url::parse(path).is_ok() {
        return path.to_string();
    }
    match root.map(|root| root.join(path)) {
        Some(Ok(url)) => url.into(),
        _ => path.to_string(),
    }
}

/// Collected warnings, shared between a checker and whoever reports them.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Arc<Mutex<Vec<String>>>);

impl Diagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records a warning.
    pub fn warn(&self, message: String) {
        tracing::warn!("{message}");
        self.0.lock().push(message);
    }

    /// The warnings so far.
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Removes and returns the warnings so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// A [`SecurityPolicy`] that compares each `require()` with the requesting
/// module's declared dependencies. Mismatches are warnings; in strict mode
/// they are refused.
#[derive(Debug, Clone)]
pub struct ManifestChecker {
    manifest: Arc<Manifest>,
    diagnostics: Diagnostics,
    strict: bool,
}

impl ManifestChecker {
    /// Checks against `manifest`.
    pub fn new(manifest: impl Into<Arc<Manifest>>) -> Self {
        Self {
            manifest: manifest.into(),
            diagnostics: Diagnostics::new(),
            strict: false,
        }
    }

    /// Records warnings into `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Refuse instead of warning.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// The warning sink.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn check(&self, base: Option<&str>, identifier: &str, file: Option<&SourceFile>) -> bool {
        // Top-level requires come from the embedder.
        let Some(base) = base else {
            return true;
        };
        let parent = self.manifest.get(base);
        if parent.is_some_and(|entry| entry.needs_chrome) {
            return true;
        }

        let Some(dependency) = parent.and_then(|entry| entry.dependencies.get(identifier)) else {
            self.diagnostics
                .warn(format!("undeclared require({identifier}) called from {base}"));
            return !self.strict;
        };
        let Some(file) = file else {
            return true;
        };

        let is_loading = &file.filename;
        match &dependency.url {
            None => {
                self.diagnostics.warn(format!(
                    "require({identifier}) (called from {base}) is loading {is_loading}, \
                     but the manifest couldn't find it"
                ));
                !self.strict
            }
            Some(should_load) if should_load != is_loading => {
                self.diagnostics.warn(format!(
                    "require({identifier}) (called from {base}) is loading {is_loading}, \
                     but is supposed to be loading {should_load}"
                ));
                !self.strict
            }
            Some(_) => true,
        }
    }
}

impl SecurityPolicy for ManifestChecker {
    fn allow_import(
        &self,
        base: Option<&str>,
        identifier: &str,
        file: Option<&SourceFile>,
        _exports: &Value,
    ) -> bool {
        self.check(base, identifier, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("file:///addon/lib/").unwrap()
    }

    #[test]
    fn test_relative_paths_are_joined() {
        let manifest = Manifest::from_json(
            r#"{
                "main.js": { "dependencies": { "panel": { "url": "panel.js" }, "gone": {} } },
                "panel.js": { "needsChrome": true, "e10s-adapter": "panel-e10s-adapter.js" },
                "file:///elsewhere/x.js": {}
            }"#,
            Some(&root()),
        )
        .unwrap();

        assert_eq!(manifest.len(), 3);
        let main = manifest.get("file:///addon/lib/main.js").unwrap();
        assert_eq!(
            main.dependencies["panel"].url.as_deref(),
            Some("file:///addon/lib/panel.js")
        );
        assert_eq!(main.dependencies["gone"].url, None);
        assert!(!main.needs_chrome);

        let panel = manifest.get("file:///addon/lib/panel.js").unwrap();
        assert!(panel.needs_chrome);
        assert_eq!(
            panel.e10s_adapter.as_deref(),
            Some("file:///addon/lib/panel-e10s-adapter.js")
        );
        assert!(manifest.get("file:///elsewhere/x.js").is_some());
    }

    #[test]
    fn test_checker_warnings() {
        let manifest = Manifest::from_json(
            r#"{
                "main.js": { "dependencies": {
                    "good": { "url": "good.js" },
                    "moved": { "url": "moved.js" },
                    "lost": {}
                } },
                "privileged.js": { "needsChrome": true }
            }"#,
            Some(&root()),
        )
        .unwrap();
        let checker = ManifestChecker::new(manifest);
        let main = Some("file:///addon/lib/main.js");
        let file = |name: &str| SourceFile::new(format!("file:///addon/lib/{name}"), "");

        assert!(checker.check(None, "anything", None));
        assert!(checker.check(main, "good", Some(&file("good.js"))));
        assert!(checker.check(Some("file:///addon/lib/privileged.js"), "x", Some(&file("x.js"))));
        assert!(checker.diagnostics().messages().is_empty());

        assert!(checker.check(main, "moved", Some(&file("other.js"))));
        assert!(checker.check(main, "lost", Some(&file("lost.js"))));
        assert!(checker.check(main, "sneaky", Some(&file("sneaky.js"))));
        assert_eq!(
            checker.diagnostics().take(),
            [
                "require(moved) (called from file:///addon/lib/main.js) is loading \
                 file:///addon/lib/other.js, but is supposed to be loading file:///addon/lib/moved.js",
                "require(lost) (called from file:///addon/lib/main.js) is loading \
                 file:///addon/lib/lost.js, but the manifest couldn't find it",
                "undeclared require(sneaky) called from file:///addon/lib/main.js",
            ]
        );
    }

    #[test]
    fn test_strict_refuses() {
        let checker = ManifestChecker::new(Manifest::default()).strict(true);
        assert!(!checker.check(Some("file:///addon/lib/main.js"), "x", None));
        assert!(checker.check(None, "x", None));
    }
}
