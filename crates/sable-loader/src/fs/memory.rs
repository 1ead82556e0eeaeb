// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory modules for embedding and tests.

use super::{CanonicalPath, FileSystem, SOURCE_SUFFIX, SourceFile, candidate, root_dir};
use crate::error::{LoaderError, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use url::Url;

/// Root used by [`MemoryFileSystem::new`].
pub const MEMORY_ROOT: &str = "file:///memory/";

/// A filesystem over a map of virtual files. Clones share the same files,
/// so a test can keep a handle and edit modules after handing one to a
/// loader.
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    root: Url,
    root_dir: String,
    files: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryFileSystem {
    /// An empty filesystem rooted at [`MEMORY_ROOT`].
    pub fn new() -> Self {
        match Url::parse(MEMORY_ROOT) {
            Ok(root) => Self::with_root(root),
            Err(e) => unreachable!("{MEMORY_ROOT} is a valid URL: {e}"),
        }
    }

    /// An empty filesystem rooted at `root`.
    pub fn with_root(root: Url) -> Self {
        Self {
            root_dir: root_dir(&root),
            root,
            files: Rc::default(),
        }
    }

    /// Adds or replaces the module `id` (no suffix, relative to the root).
    pub fn insert(&self, id: &str, contents: impl Into<String>) -> CanonicalPath {
        let path = self.path_of(id);
        self.files.borrow_mut().insert(path.clone(), contents.into());
        path
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_module(self, id: &str, contents: impl Into<String>) -> Self {
        self.insert(id, contents);
        self
    }

    /// Removes the module `id`.
    pub fn remove(&self, id: &str) -> bool {
        let path = self.path_of(id);
        self.files.borrow_mut().remove(&path).is_some()
    }

    /// The canonical path module `id` would have.
    pub fn path_of(&self, id: &str) -> CanonicalPath {
        format!("{}{}{SOURCE_SUFFIX}", self.root_dir, id.trim_start_matches('/'))
    }

    /// The root directory URL string.
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFileSystem {
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        let Some(url) = candidate(&self.root, &self.root_dir, base, identifier)? else {
            return Ok(None);
        };
        let path = String::from(url);
        Ok(self.files.borrow().contains_key(&path).then_some(path))
    }

    fn get_file(&self, path: &str) -> Result<SourceFile> {
        match self.files.borrow().get(path) {
            Some(contents) => Ok(SourceFile::new(path, contents.clone())),
            None => Err(LoaderError::fetch(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such in-memory module"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let mfs = MemoryFileSystem::new().with_module("lib/a", "1");
        let path = mfs.resolve_module(None, "lib/a").unwrap().unwrap();
        assert_eq!(path, "file:///memory/lib/a.js");
        assert_eq!(mfs.get_file(&path).unwrap(), SourceFile::new(path.clone(), "1"));

        let sibling = mfs.insert("lib/b", "2");
        assert_eq!(mfs.resolve_module(Some(&path), "./b").unwrap(), Some(sibling));
    }

    #[test]
    fn test_clones_share_files() {
        let mfs = MemoryFileSystem::new();
        let handle = mfs.clone();
        handle.insert("late", "");
        assert!(mfs.resolve_module(None, "late").unwrap().is_some());
        assert!(handle.remove("late"));
        assert!(mfs.resolve_module(None, "late").unwrap().is_none());
    }

    #[test]
    fn test_never_escapes_root() {
        let mfs = MemoryFileSystem::new();
        assert_eq!(mfs.resolve_module(None, "../../etc/passwd").unwrap(), None);
    }
}
