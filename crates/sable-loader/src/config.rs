// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration management for sable.
//!
//! Settings come from `sable.toml`, then `SABLE_*` environment variables,
//! then the command line.
//!
//! ```toml
//! root_paths = ["lib", "vendor"]
//! default_principal = "restricted"
//! manifest = "manifest.json"
//! remote = false
//!
//! [globals]
//! appName = "demo"
//! ```

use crate::error::{LoaderError, Result};
use crate::manifest::{Manifest, ManifestChecker};
use crate::module_system::LoaderOptions;
use sable_script::{Principal, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "sable.toml";

/// Configuration for sable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Module roots, searched in order
    pub root_paths: Vec<PathBuf>,

    /// Principal for module contexts
    pub default_principal: Principal,

    /// Package manifest to check requires against
    pub manifest: Option<PathBuf>,

    /// Refuse requires the manifest does not declare
    pub strict_manifest: bool,

    /// Run the main module in a restricted child process
    pub remote: bool,

    /// String globals injected into every module
    pub globals: BTreeMap<String, String>,
}

/// The file form: everything optional so a file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    root_paths: Option<Vec<PathBuf>>,
    default_principal: Option<Principal>,
    manifest: Option<PathBuf>,
    strict_manifest: Option<bool>,
    remote: Option<bool>,
    globals: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from `./sable.toml` (if present) and the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let project_config = PathBuf::from(CONFIG_FILE);
        if project_config.exists() {
            config.merge_from_file(&project_config)?;
        }

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from an explicit file and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.merge_from_file(path)?;
        config.load_from_env();
        Ok(config)
    }

    /// Merge configuration from a file. Relative paths are taken relative
    /// to the file's directory.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let relative = |p: PathBuf| if p.is_relative() { dir.join(p) } else { p };

        if let Some(roots) = file.root_paths {
            self.root_paths = roots.into_iter().map(relative).collect();
        }
        if let Some(principal) = file.default_principal {
            self.default_principal = principal;
        }
        if let Some(manifest) = file.manifest {
            self.manifest = Some(relative(manifest));
        }
        if let Some(strict) = file.strict_manifest {
            self.strict_manifest = strict;
        }
        if let Some(remote) = file.remote {
            self.remote = remote;
        }
        self.globals.extend(file.globals);

        tracing::debug!(path = %path.display(), "merged configuration file");
        Ok(())
    }

    /// Load configuration from environment variables.
    pub fn load_from_env(&mut self) {
        self.apply_env(std::env::vars());
    }

    /// Applies `SABLE_ROOT` (a path list) and `SABLE_PRINCIPAL`.
    pub fn apply_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            let setting = match key.as_str() {
                "SABLE_ROOT" => "root",
                "SABLE_PRINCIPAL" => "principal",
                "SABLE_MANIFEST" => "manifest",
                _ => continue,
            };
            if let Err(e) = self.set(setting, &value) {
                tracing::warn!("ignoring {key}: {e}");
            }
        }
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "root" => self.root_paths = std::env::split_paths(value).collect(),
            "principal" => {
                self.default_principal = value
                    .parse()
                    .map_err(|e: sable_script::sandbox::ParsePrincipalError| {
                        LoaderError::Config(e.to_string())
                    })?
            }
            "manifest" => self.manifest = Some(PathBuf::from(value)),
            "strict-manifest" => self.strict_manifest = value == "true",
            "remote" => self.remote = value == "true",
            _ => {
                if let Some(name) = key.strip_prefix("globals.") {
                    self.globals.insert(name.to_string(), value.to_string());
                } else {
                    return Err(LoaderError::Config(format!("unknown setting '{key}'")));
                }
            }
        }
        Ok(())
    }

    /// Loads the configured manifest. Relative manifest paths are joined
    /// onto the first module root.
    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        let Some(path) = &self.manifest else {
            return Ok(None);
        };
        let root = self.manifest_root();
        Manifest::load(path, root.as_ref()).map(Some)
    }

    fn manifest_root(&self) -> Option<Url> {
        let root = self.root_paths.first()?.canonicalize().ok()?;
        Url::from_directory_path(root).ok()
    }

    /// Loader options for this configuration.
    pub fn loader_options(&self) -> Result<LoaderOptions> {
        let mut options = LoaderOptions::new()
            .root_paths(self.root_paths.iter().cloned())
            .default_principal(self.default_principal);
        for (name, value) in &self.globals {
            options = options.global(name, Value::from(value.as_str()));
        }
        if let Some(manifest) = self.load_manifest()? {
            options = options.security_policy(ManifestChecker::new(manifest).strict(self.strict_manifest));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
                root_paths = ["lib", "/abs/vendor"]
                default_principal = "system"
                manifest = "manifest.json"

                [globals]
                appName = "demo"
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.merge_from_file(&path).unwrap();
        assert_eq!(
            config.root_paths,
            [dir.path().join("lib"), PathBuf::from("/abs/vendor")]
        );
        assert_eq!(config.default_principal, Principal::Elevated);
        assert_eq!(config.manifest, Some(dir.path().join("manifest.json")));
        assert!(!config.remote);
        assert_eq!(config.globals["appName"], "demo");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "rootpath = 'x'\n").unwrap();
        assert!(matches!(
            Config::default().merge_from_file(&path),
            Err(LoaderError::Toml(_))
        ));
    }

    #[test]
    fn test_environment() {
        let mut config = Config::default();
        config.apply_env([
            ("SABLE_PRINCIPAL".to_string(), "elevated".to_string()),
            ("SABLE_ROOT".to_string(), "/srv/modules".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);
        assert_eq!(config.default_principal, Principal::Elevated);
        assert_eq!(config.root_paths, [PathBuf::from("/srv/modules")]);

        config.apply_env([("SABLE_PRINCIPAL".to_string(), "root".to_string())]);
        assert_eq!(config.default_principal, Principal::Elevated);
    }

    #[test]
    fn test_set() {
        let mut config = Config::default();
        config.set("globals.mode", "test").unwrap();
        config.set("remote", "true").unwrap();
        assert!(config.remote);
        assert_eq!(config.globals["mode"], "test");
        assert!(config.set("colour", "blue").is_err());
        assert!(config.set("principal", "admin").is_err());
    }

    #[test]
    fn test_no_roots_is_an_error() {
        let options = Config::default().loader_options().unwrap();
        assert!(matches!(options.build(), Err(LoaderError::Config(_))));
    }
}
