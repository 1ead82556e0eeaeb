// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ordered search across several filesystems.

use super::{CanonicalPath, FileSystem, SourceFile};
use crate::error::{LoaderError, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// Tries each member in order; the first to resolve an identifier wins, and
/// later fetches of that path go back to the same member.
#[derive(Default)]
pub struct CompositeFileSystem {
    members: Vec<Box<dyn FileSystem>>,
    routes: RefCell<HashMap<CanonicalPath, usize>>,
}

impl CompositeFileSystem {
    /// Creates a composite over `members`, searched in order.
    pub fn new(members: Vec<Box<dyn FileSystem>>) -> Self {
        Self {
            members,
            routes: RefCell::default(),
        }
    }

    /// Appends a member after the existing ones.
    pub fn push(&mut self, member: impl FileSystem + 'static) {
        self.members.push(Box::new(member));
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true when there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FileSystem for CompositeFileSystem {
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        for (index, member) in self.members.iter().enumerate() {
            if let Some(path) = member.resolve_module(base, identifier)? {
                self.routes.borrow_mut().insert(path.clone(), index);
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn get_file(&self, path: &str) -> Result<SourceFile> {
        let index = self.routes.borrow().get(path).copied();
        match index.and_then(|i| self.members.get(i)) {
            Some(member) => member.get_file(path),
            None => Err(LoaderError::module_not_found(path)),
        }
    }
}
