// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The remote process bridge.
//!
//! A [`RemoteRuntime`] runs module code with the restricted principal in
//! another thread or process. Its `require()` asks a [`BridgeHost`], which
//! resolves against a privileged [`Loader`](crate::Loader) and consults the
//! manifest:
//!
//! - modules that need no privileges are sent as they are;
//! - a module `x` that needs them is replaced by `x-e10s-adapter`, which
//!   talks back to the host through `chrome.call()`/`chrome.send()`;
//! - without an adapter the remote gets a permission error.
//!
//! ```no_run
//! use sable_loader::bridge::BridgeHost;
//! use sable_loader::{Loader, Principal};
//!
//! let loader = Loader::builder()
//!     .root_path("lib")
//!     .default_principal(Principal::Elevated)
//!     .build()?;
//! let (host, _remote) = BridgeHost::in_process(loader, None)?;
//! host.start_main("main", serde_json::json!({}))?;
//! let status = host.run_until_quit()?;
//! assert_eq!(status, "OK");
//! # Ok::<(), sable_loader::LoaderError>(())
//! ```

mod endpoint;
mod host;
pub mod protocol;
mod remote;
mod transport;

pub use endpoint::{Endpoint, Incoming};
pub use host::BridgeHost;
pub use remote::{RemoteRuntime, spawn_in_process};
pub use transport::Transport;

use crate::error::{LoaderError, Result};
use sable_script::runtime::json::{from_json, to_json};
use sable_script::sandbox::script_error;
use sable_script::{Throw, Value, call_function};
use std::cell::RefCell;
use std::collections::HashMap;

/// Appended to an identifier to name its adapter.
pub const ADAPTER_SUFFIX: &str = "-e10s-adapter";

/// Named message listeners.
#[derive(Default)]
pub(crate) struct Listeners(RefCell<HashMap<String, Vec<Value>>>);

impl Listeners {
    pub(crate) fn on(&self, name: &str, listener: Value) {
        self.0
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(listener);
    }

    pub(crate) fn remove(&self, name: &str, listener: &Value) -> bool {
        let mut listeners = self.0.borrow_mut();
        let Some(registered) = listeners.get_mut(name) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|existing| !existing.strict_equals(listener));
        before != registered.len()
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Calls each listener for `name` in registration order.
    pub(crate) fn fire(&self, name: &str, args: &[Value]) -> Result<()> {
        let listeners = self.0.borrow().get(name).cloned().unwrap_or_default();
        if listeners.is_empty() {
            tracing::debug!(%name, "message with no listeners");
        }
        for listener in &listeners {
            call_function(listener, Value::Undefined, args)
                .map_err(|thrown| LoaderError::from_script(script_error(&thrown, "<bridge>")))?;
        }
        Ok(())
    }
}

/// Script arguments to JSON; functions and `undefined` become `null`.
pub(crate) fn to_wire(args: &[Value]) -> std::result::Result<Vec<serde_json::Value>, Throw> {
    args.iter()
        .map(|value| Ok(to_json(value)?.unwrap_or(serde_json::Value::Null)))
        .collect()
}

/// Handler arguments: the message name, then the decoded payload.
pub(crate) fn from_wire(name: &str, args: &[serde_json::Value]) -> Vec<Value> {
    std::iter::once(Value::from(name))
        .chain(args.iter().map(from_json))
        .collect()
}
