// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS module system
//!
//! - `require()` scoped to the requesting module's canonical path
//! - `module.exports` / `exports` / `module.setExports()`
//! - Synchronous loading, one evaluation per canonical path
//! - Circular requires observe partially populated exports

mod cache;
mod loader;
mod require;

pub use cache::{ModuleCache, ModuleRecord};
pub use loader::{
    GetModuleExports, Loader, LoaderOptions, ModifyModuleContext, ScriptSource, SecurityPolicy,
};
