// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Modules on local disk.

use super::{CanonicalPath, FileSystem, SourceFile, candidate, root_dir};
use crate::error::{LoaderError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use url::Url;

/// A filesystem rooted at one directory on disk.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: Url,
    root_dir: String,
}

impl LocalFileSystem {
    /// Roots the filesystem at `root`. A directory is its own root; a file
    /// roots the filesystem at its parent directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let absolute = root
            .canonicalize()
            .map_err(|e| LoaderError::Config(format!("module root {}: {e}", root.display())))?;

        let url = if absolute.is_dir() {
            Url::from_directory_path(&absolute)
        } else {
            Url::from_file_path(&absolute)
        }
        .map_err(|()| LoaderError::Config(format!("module root {} is not a local path", absolute.display())))?;

        Ok(Self::from_url(url))
    }

    /// Roots the filesystem at a `file:` URL.
    pub fn from_url(root: Url) -> Self {
        let root_dir = root_dir(&root);
        tracing::debug!(root = %root, "local module filesystem");
        Self { root, root_dir }
    }

    /// The root URL.
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// The root directory as a URL string; every canonical path starts with it.
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// The root directory on disk.
    pub fn root_path(&self) -> Option<PathBuf> {
        Url::parse(&self.root_dir).ok()?.to_file_path().ok()
    }
}

impl FileSystem for LocalFileSystem {
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        let Some(url) = candidate(&self.root, &self.root_dir, base, identifier)? else {
            return Ok(None);
        };
        let Ok(file) = url.to_file_path() else {
            return Ok(None);
        };

        match std::fs::metadata(&file) {
            Ok(meta) if meta.is_file() => Ok(Some(url.into())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_file(&self, path: &str) -> Result<SourceFile> {
        let file = Url::parse(path)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| LoaderError::fetch(path, std::io::Error::new(ErrorKind::InvalidInput, "not a file URL")))?;
        let contents = std::fs::read_to_string(&file).map_err(|e| LoaderError::fetch(path, e))?;
        Ok(SourceFile::new(path, contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("beets.js"), "exports.beets = 5;").unwrap();

        let lfs = LocalFileSystem::new(dir.path()).unwrap();
        let path = lfs.resolve_module(None, "beets").unwrap().unwrap();
        assert!(path.starts_with(lfs.root_dir()));
        assert!(path.ends_with("/beets.js"));
        assert_eq!(lfs.get_file(&path).unwrap().contents, "exports.beets = 5;");

        assert_eq!(lfs.resolve_module(None, "carrots").unwrap(), None);
    }

    #[test]
    fn test_file_root_uses_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.js"), "").unwrap();
        fs::write(dir.path().join("helper.js"), "").unwrap();

        let lfs = LocalFileSystem::new(dir.path().join("main.js")).unwrap();
        assert!(lfs.resolve_module(None, "helper").unwrap().is_some());
    }

    #[test]
    fn test_directories_are_not_modules() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pkg.js")).unwrap();
        let lfs = LocalFileSystem::new(dir.path()).unwrap();
        assert_eq!(lfs.resolve_module(None, "pkg").unwrap(), None);
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let lfs = LocalFileSystem::new(dir.path()).unwrap();
        let path = format!("{}gone.js", lfs.root_dir());
        assert!(matches!(lfs.get_file(&path), Err(LoaderError::Fetch { .. })));
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            LocalFileSystem::new("/definitely/not/a/sable/root"),
            Err(LoaderError::Config(_))
        ));
    }
}
