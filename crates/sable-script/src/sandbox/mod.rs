// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Sandboxes: execution contexts bound to a principal.
//!
//! A [`SandboxFactory`] owns a table of privileged capabilities. Contexts
//! created with [`Principal::Elevated`] see each capability as a global;
//! [`Principal::Restricted`] contexts get a `PermissionDeniedError` when
//! they read, write, call or `typeof` one.
//!
//! ```
//! use sable_script::sandbox::{ContextOptions, DefaultSandboxFactory, Principal, SandboxFactory};
//!
//! let factory = DefaultSandboxFactory::new(Principal::Restricted);
//! let context = factory.create_context(ContextOptions::default());
//! let err = context.evaluate("host.platform", None).unwrap_err();
//! assert!(err.is_permission_denied());
//! ```

mod context;
mod principal;

pub use context::{ANONYMOUS_FILENAME, ContextOptions, ExecutionContext, script_error};
pub use principal::{ParsePrincipalError, Principal};

use crate::builtins;
use crate::runtime::{CallStack, Environment, ObjectRef, Realm, Throw, Value, arg, native_function};
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// Name of the built-in host capability.
pub const HOST_CAPABILITY: &str = "host";

/// Creates execution contexts.
pub trait SandboxFactory {
    /// Principal used when [`ContextOptions::principal`] is `None`.
    fn default_principal(&self) -> Principal;

    /// Creates a fresh context with the standard library installed.
    fn create_context(&self, options: ContextOptions) -> ExecutionContext;
}

/// The stock factory: one shared call stack, a capability table seeded with
/// `host`.
pub struct DefaultSandboxFactory {
    default_principal: Principal,
    capabilities: Vec<(Rc<str>, Value)>,
    call_stack: Rc<CallStack>,
}

impl DefaultSandboxFactory {
    /// Creates a factory whose contexts default to `default_principal`.
    pub fn new(default_principal: Principal) -> Self {
        Self {
            default_principal,
            capabilities: vec![(Rc::from(HOST_CAPABILITY), host_capability())],
            call_stack: Rc::new(CallStack::new()),
        }
    }

    /// Adds (or replaces) a privileged capability.
    pub fn with_capability(mut self, name: &str, value: Value) -> Self {
        self.capabilities.retain(|(existing, _)| &**existing != name);
        self.capabilities.push((Rc::from(name), value));
        self
    }

    /// Names of the privileged capabilities.
    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|(name, _)| &**name)
    }
}

impl Default for DefaultSandboxFactory {
    fn default() -> Self {
        Self::new(Principal::Restricted)
    }
}

impl SandboxFactory for DefaultSandboxFactory {
    fn default_principal(&self) -> Principal {
        self.default_principal
    }

    fn create_context(&self, options: ContextOptions) -> ExecutionContext {
        let principal = options.principal.unwrap_or(self.default_principal);
        let filename: Rc<str> = Rc::from(options.filename.as_deref().unwrap_or(ANONYMOUS_FILENAME));

        let global_object = ObjectRef::ordinary();
        builtins::install(&global_object);

        let mut guarded = FxHashSet::default();
        for (name, value) in &self.capabilities {
            match principal {
                Principal::Elevated => global_object.set(name, value.clone()),
                Principal::Restricted => {
                    guarded.insert(name.clone());
                }
            }
        }

        tracing::debug!(%filename, %principal, "created execution context");
        let realm = Realm {
            principal,
            filename,
            global: Environment::global(global_object.clone()),
            global_object,
            guarded,
            call_stack: self.call_stack.clone(),
        };
        ExecutionContext::new(Rc::new(realm))
    }
}

/// The `host` capability: process environment, file reading, platform.
fn host_capability() -> Value {
    let host = ObjectRef::ordinary();
    host.set("platform", Value::from(std::env::consts::OS));
    host.set(
        "getenv",
        native_function("getenv", |_, args| {
            let name = arg(args, 0).to_js_string();
            Ok(std::env::var(&name).map_or(Value::Undefined, Value::from))
        }),
    );
    host.set(
        "readFile",
        native_function("readFile", |_, args| {
            let path = arg(args, 0).to_js_string();
            std::fs::read_to_string(&path)
                .map(Value::from)
                .map_err(|e| Throw::error(crate::error::ErrorKind::Error, format!("{path}: {e}")))
        }),
    );
    Value::Object(host)
}
