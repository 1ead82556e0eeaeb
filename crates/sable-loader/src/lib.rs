// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # sable-loader
//!
//! Secure CommonJS module loading on top of `sable-script`.
//!
//! ## Features
//!
//! - Module resolution confined to one or more root directories
//! - One evaluation per canonical path, with `require()` identity
//! - Per-module execution contexts with an explicit principal
//! - Manifest checks of declared dependencies
//! - A remote process bridge that runs restricted code elsewhere and
//!   substitutes adapters for privileged modules
//!
//! ## Example
//!
//! ```
//! use sable_loader::{Loader, MemoryFileSystem, Value};
//!
//! let fs = MemoryFileSystem::new().with_module("beets", "exports.beets = 5;");
//! let loader = Loader::builder().fs(fs).build()?;
//! assert_eq!(loader.run_script("require('beets').beets")?, Value::Number(5.0));
//! # Ok::<(), sable_loader::LoaderError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod config;
pub mod console;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod module_system;
pub mod unload;

pub use config::Config;
pub use error::{LoaderError, Result};
pub use fs::{CanonicalPath, CompositeFileSystem, FileSystem, LocalFileSystem, MemoryFileSystem, SourceFile};
pub use manifest::{Diagnostics, Manifest, ManifestChecker, ManifestEntry};
pub use module_system::{Loader, LoaderOptions, ModuleCache, ModuleRecord, ScriptSource, SecurityPolicy};
pub use sable_script::{Principal, Value};
pub use unload::UnloadRegistry;
