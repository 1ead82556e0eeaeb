// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module filesystems.
//!
//! A [`FileSystem`] maps `require()` identifiers to canonical paths (URL
//! strings) beneath a root directory and fetches source text for them.
//!
//! Resolution appends `.js`, resolves bare identifiers against the root and
//! `./`/`../` identifiers against the requiring module, then refuses any
//! candidate whose normalised URL is not beneath the root directory.

mod composite;
mod local;
mod memory;

pub use composite::CompositeFileSystem;
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Suffix appended to every identifier.
pub const SOURCE_SUFFIX: &str = ".js";

/// Canonical location of a module: the string form of its URL.
pub type CanonicalPath = String;

/// Source text of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Name used in stack traces; the canonical path for fetched modules
    pub filename: String,
    /// UTF-8 source text
    pub contents: String,
}

impl SourceFile {
    /// Create a source file
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }
}

/// Resolves identifiers and fetches module source.
pub trait FileSystem {
    /// Resolves `identifier` as required from the module at `base`
    /// (`None` for top-level requires). `Ok(None)` means not found.
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>>;

    /// Fetches a module previously returned by
    /// [`resolve_module`](Self::resolve_module).
    fn get_file(&self, path: &str) -> Result<SourceFile>;
}

impl<F: FileSystem + ?Sized> FileSystem for Box<F> {
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        (**self).resolve_module(base, identifier)
    }

    fn get_file(&self, path: &str) -> Result<SourceFile> {
        (**self).get_file(path)
    }
}

/// Rejects identifiers that cannot form a path segment.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let malformed = identifier.is_empty()
        || identifier
            .chars()
            .any(|c| matches!(c, '\0' | '\\' | ':' | '?' | '#') || c.is_whitespace() || c.is_control());
    if malformed {
        return Err(LoaderError::MalformedIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// The directory part of a root URL: the URL itself when it names a
/// directory, its parent otherwise.
pub(crate) fn root_dir(root: &Url) -> String {
    let spec = root.as_str();
    match spec.rfind('/') {
        Some(slash) => spec[..=slash].to_string(),
        None => spec.to_string(),
    }
}

/// Steps 1-4 of resolution: the normalised candidate URL for `identifier`,
/// or `None` when it falls outside `root_dir`.
pub(crate) fn candidate(
    root: &Url,
    root_dir: &str,
    base: Option<&str>,
    identifier: &str,
) -> Result<Option<Url>> {
    validate_identifier(identifier)?;
    let relative = format!("{identifier}{SOURCE_SUFFIX}");

    let base_url = match base {
        Some(base) if identifier.starts_with('.') => Url::parse(base)
            .map_err(|_| LoaderError::MalformedIdentifier(base.to_string()))?,
        _ => root.clone(),
    };
    let url = base_url
        .join(&relative)
        .map_err(|_| LoaderError::MalformedIdentifier(identifier.to_string()))?;

    if !url.as_str().starts_with(root_dir) {
        tracing::debug!(%identifier, candidate = %url, "refusing path outside the module root");
        return Ok(None);
    }
    Ok(Some(url))
}
