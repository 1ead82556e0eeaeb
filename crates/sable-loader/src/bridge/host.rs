// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The privileged side of the bridge.

use super::endpoint::{Endpoint, Incoming};
use super::protocol::{CallOutcome, Event, ExceptionInfo, Reply, Request, RequireResponse};
use super::transport::Transport;
use super::{ADAPTER_SUFFIX, Listeners, from_wire, to_wire};
use crate::console::ConsoleLevel;
use crate::error::{LoaderError, Result};
use crate::fs::CanonicalPath;
use crate::manifest::{Diagnostics, Manifest, ManifestEntry};
use crate::module_system::Loader;
use sable_script::runtime::arg;
use sable_script::sandbox::script_error;
use sable_script::{ErrorKind, ObjectRef, Throw, Value, call_function, native_function};
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::Child;
use std::rc::{Rc, Weak};
use std::thread::JoinHandle;

type ConsoleHook = Box<dyn Fn(ConsoleLevel, &[String])>;

/// Answers a remote process's requests with modules from a privileged
/// loader, substituting adapters for modules that need privileges.
///
/// Adapters are registered once per bridge with `register(bridge)` and
/// unregistered newest first on [`shutdown`](Self::shutdown) or when the
/// loader unloads.
#[derive(Clone)]
pub struct BridgeHost {
    state: Rc<HostState>,
}

struct HostState {
    loader: Loader,
    manifest: Option<Manifest>,
    diagnostics: RefCell<Diagnostics>,
    endpoint: Endpoint,
    bridge: Value,
    adapters: RefCell<Vec<(CanonicalPath, Value)>>,
    calls: RefCell<HashMap<String, Value>>,
    listeners: Listeners,
    console: RefCell<Option<ConsoleHook>>,
    child: RefCell<Option<Child>>,
}

impl BridgeHost {
    /// Serves the remote at the other end of `transport`.
    pub fn new(loader: Loader, manifest: Option<Manifest>, transport: Transport) -> Self {
        let state = Rc::new_cyclic(|weak: &Weak<HostState>| HostState {
            loader: loader.clone(),
            manifest,
            diagnostics: RefCell::default(),
            endpoint: Endpoint::new(transport),
            bridge: bridge_object(weak),
            adapters: RefCell::default(),
            calls: RefCell::default(),
            listeners: Listeners::default(),
            console: RefCell::default(),
            child: RefCell::default(),
        });

        let weak = Rc::downgrade(&state);
        loader.on_unload(move |reason| {
            if let Some(state) = weak.upgrade() {
                tracing::debug!(%reason, "loader unloading, shutting down bridge");
                state.unregister_adapters();
            }
        });
        Self { state }
    }

    /// Starts a remote runtime on a thread.
    pub fn in_process(
        loader: Loader,
        manifest: Option<Manifest>,
    ) -> Result<(Self, JoinHandle<Result<()>>)> {
        let (ours, theirs) = Transport::in_process_pair();
        let remote = super::remote::spawn_in_process(theirs)?;
        Ok((Self::new(loader, manifest, ours), remote))
    }

    /// Starts a remote runtime in a child process: `program args...` must
    /// speak the bridge protocol on its stdin and stdout.
    pub fn spawn_child<I, S>(
        loader: Loader,
        manifest: Option<Manifest>,
        program: impl AsRef<std::ffi::OsStr>,
        args: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let (transport, child) = Transport::spawn_child(program, args)?;
        let host = Self::new(loader, manifest, transport);
        *host.state.child.borrow_mut() = Some(child);
        Ok(host)
    }

    /// Receives remote `console.*` calls in addition to the log.
    pub fn with_console(self, hook: impl Fn(ConsoleLevel, &[String]) + 'static) -> Self {
        *self.state.console.borrow_mut() = Some(Box::new(hook));
        self
    }

    /// Records refused requires into `diagnostics`, e.g. the one a
    /// [`ManifestChecker`](crate::ManifestChecker) uses.
    pub fn with_diagnostics(self, diagnostics: Diagnostics) -> Self {
        *self.state.diagnostics.borrow_mut() = diagnostics;
        self
    }

    /// Warnings about requires the remote was refused.
    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics.borrow().clone()
    }

    /// The object adapters receive in `register(bridge)`.
    pub fn bridge_object(&self) -> Value {
        self.state.bridge.clone()
    }

    /// Answers one require request.
    pub fn handle_require(&self, base: Option<&str>, identifier: &str) -> RequireResponse {
        self.state.handle_require(base, identifier)
    }

    /// Runs the call handler registered under `name`.
    pub fn handle_call(&self, name: &str, args: &[serde_json::Value]) -> CallOutcome {
        self.state.handle_call(name, args)
    }

    /// Asks the remote to require `main` and call its `main(options, callbacks)`.
    pub fn start_main(&self, main: &str, options: serde_json::Value) -> Result<()> {
        tracing::info!(%main, "starting main in remote process");
        self.state.endpoint.send_event(Event::StartMain {
            main: main.to_string(),
            options,
        })
    }

    /// Sends a named message to the remote's `chrome.on()` listeners.
    pub fn send(&self, name: &str, args: Vec<serde_json::Value>) -> Result<()> {
        self.state.endpoint.send_event(Event::Message {
            name: name.to_string(),
            args,
        })
    }

    /// Serves requests until the remote quits; returns the quit status.
    /// An uncaught remote exception ends the run with its details.
    pub fn run_until_quit(&self) -> Result<String> {
        loop {
            let Some(message) = self.state.endpoint.recv() else {
                return Err(LoaderError::remote("remote process exited without quitting"));
            };
            if let Some(outcome) = self.state.dispatch(message) {
                return outcome;
            }
        }
    }

    /// Handles whatever has already arrived without blocking.
    pub fn pump(&self) -> Result<()> {
        while let Some(message) = self.state.endpoint.try_recv() {
            if let Some(Err(e)) = self.state.dispatch(message) {
                return Err(e);
            }
        }
        Ok(())
    }

    /// Unregisters adapters newest first and stops a child process.
    pub fn shutdown(&self) {
        self.state.unregister_adapters();
        self.state.calls.borrow_mut().clear();
        self.state.listeners.clear();
        if let Some(mut child) = self.state.child.borrow_mut().take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "remote process already gone");
            }
            match child.wait() {
                Ok(status) => tracing::debug!(%status, "remote process exited"),
                Err(e) => tracing::debug!(error = %e, "failed to wait for remote process"),
            }
        }
        tracing::info!("bridge shut down");
    }

    /// Paths of registered adapters, oldest first.
    pub fn registered_adapters(&self) -> Vec<CanonicalPath> {
        self.state
            .adapters
            .borrow()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl HostState {
    fn handle_require(&self, base: Option<&str>, identifier: &str) -> RequireResponse {
        match self.vet(base, identifier) {
            Ok(response) => response,
            Err(e) => {
                self.diagnostics
                    .borrow()
                    .warn(format!("require({identifier}) for the remote process failed: {e}"));
                RequireResponse::Error
            }
        }
    }

    fn vet(&self, base: Option<&str>, identifier: &str) -> Result<RequireResponse> {
        let path = self.loader.resolve(base, identifier)?;
        let adapter_id = format!("{identifier}{ADAPTER_SUFFIX}");
        let adapter = self.loader.resolve(base, &adapter_id)?;

        let entry = match (&self.manifest, &path) {
            (Some(manifest), Some(path)) => manifest.get(path).cloned().unwrap_or_default(),
            _ => ManifestEntry::default(),
        };
        if self.manifest.is_some() && entry.e10s_adapter != adapter {
            return Err(LoaderError::AdapterMismatch {
                declared: entry.e10s_adapter.unwrap_or_else(|| "null".to_string()),
                actual: adapter,
            });
        }

        if let Some(adapter) = adapter {
            self.register_adapter(&adapter_id, &adapter)?;
            return Ok(RequireResponse::Ok {
                script: self.loader.fetch(&adapter)?,
                needs_messaging: true,
            });
        }

        if entry.needs_chrome {
            tracing::debug!(%identifier, "module needs chrome and has no adapter");
            return Ok(RequireResponse::AccessDenied);
        }
        match path {
            Some(path) => Ok(RequireResponse::Ok {
                script: self.loader.fetch(&path)?,
                needs_messaging: false,
            }),
            None => Ok(RequireResponse::NotFound),
        }
    }

    fn register_adapter(&self, adapter_id: &str, path: &str) -> Result<()> {
        if self.adapters.borrow().iter().any(|(registered, _)| registered == path) {
            return Ok(());
        }
        // Vetted against the manifest above; the requester never sees it.
        let exports = self.loader.require_path(path, adapter_id)?;
        let register = exports.as_object().map(|obj| obj.get("register"));
        if let Some(register) = register.filter(Value::is_callable) {
            call_function(&register, exports.clone(), &[self.bridge.clone()])
                .map_err(|thrown| LoaderError::from_script(script_error(&thrown, path)))?;
        }
        tracing::info!(adapter = %path, "registered adapter");
        self.adapters
            .borrow_mut()
            .push((path.to_string(), exports));
        Ok(())
    }

    fn unregister_adapters(&self) {
        loop {
            let Some((path, exports)) = self.adapters.borrow_mut().pop() else {
                break;
            };
            let unregister = exports.as_object().map(|obj| obj.get("unregister"));
            if let Some(unregister) = unregister.filter(Value::is_callable) {
                if let Err(thrown) = call_function(&unregister, exports.clone(), &[self.bridge.clone()]) {
                    tracing::warn!(adapter = %path, "unregister failed: {}", script_error(&thrown, &path));
                }
            }
            tracing::debug!(adapter = %path, "unregistered adapter");
        }
    }

    fn handle_call(&self, name: &str, args: &[serde_json::Value]) -> CallOutcome {
        let handler = self.calls.borrow().get(name).cloned();
        let Some(handler) = handler else {
            return CallOutcome::Exception(ExceptionInfo {
                message: format!("No receiver registered for call '{name}'"),
                ..ExceptionInfo::default()
            });
        };

        let outcome = call_function(&handler, Value::Undefined, &from_wire(name, args)).and_then(
            |value| sable_script::runtime::json::to_json(&value),
        );
        match outcome {
            Ok(value) => CallOutcome::ReturnValue(value.unwrap_or(serde_json::Value::Null)),
            Err(thrown) => {
                let err = LoaderError::from_script(script_error(&thrown, "<bridge>"));
                tracing::debug!(%name, "call handler threw: {err}");
                CallOutcome::Exception(ExceptionInfo::from_error(&err))
            }
        }
    }

    /// Handles one message; `Some` ends [`BridgeHost::run_until_quit`].
    fn dispatch(&self, message: Incoming) -> Option<Result<String>> {
        match message {
            Incoming::Request { id, request } => {
                let reply = match request {
                    Request::Require {
                        base_path,
                        identifier,
                    } => Reply::Require(self.handle_require(base_path.as_deref(), &identifier)),
                    Request::Call { name, args } => Reply::Call(self.handle_call(&name, &args)),
                };
                if let Err(e) = self.endpoint.reply(id, reply) {
                    return Some(Err(e));
                }
            }
            Incoming::Event(Event::Console { level, args }) => {
                level.trace(&args.join(" "));
                if let Some(hook) = &*self.console.borrow() {
                    hook(level, &args);
                }
            }
            Incoming::Event(Event::Exception { exception }) => {
                tracing::error!(
                    file = %exception.file_name,
                    line = exception.line_number,
                    "uncaught exception in remote process: {}",
                    exception.message
                );
                return Some(Err(exception.into_error()));
            }
            Incoming::Event(Event::Quit { status }) => {
                tracing::info!(%status, "remote process quit");
                return Some(Ok(status));
            }
            Incoming::Event(Event::Message { name, args }) => {
                if let Err(e) = self.listeners.fire(&name, &from_wire(&name, &args)) {
                    tracing::warn!("listener for '{name}' threw: {e}");
                }
            }
            Incoming::Event(Event::StartMain { main, .. }) => {
                tracing::warn!(%main, "ignoring startMain sent to the host");
            }
        }
        None
    }
}

/// `registerCall(name, fn)`, `on(name, fn)` and `send(name, ...args)`.
fn bridge_object(state: &Weak<HostState>) -> Value {
    let bridge = ObjectRef::ordinary();

    let weak = state.clone();
    bridge.set(
        "registerCall",
        native_function("registerCall", move |_, args| {
            let state = upgrade(&weak)?;
            let name = arg(args, 0).to_js_string();
            let handler = callable_arg(args, 1, "registerCall")?;
            let mut calls = state.calls.borrow_mut();
            if calls.contains_key(&name) {
                return Err(Throw::error(
                    ErrorKind::Error,
                    format!("call already registered for '{name}'"),
                ));
            }
            calls.insert(name, handler);
            Ok(Value::Undefined)
        }),
    );

    let weak = state.clone();
    bridge.set(
        "on",
        native_function("on", move |_, args| {
            let state = upgrade(&weak)?;
            let handler = callable_arg(args, 1, "on")?;
            state.listeners.on(&arg(args, 0).to_js_string(), handler);
            Ok(Value::Undefined)
        }),
    );

    let weak = state.clone();
    bridge.set(
        "send",
        native_function("send", move |_, args| {
            let state = upgrade(&weak)?;
            let name = arg(args, 0).to_js_string();
            let payload = to_wire(args.get(1..).unwrap_or_default())?;
            state
                .endpoint
                .send_event(Event::Message { name, args: payload })
                .map_err(LoaderError::into_throw)?;
            Ok(Value::Undefined)
        }),
    );

    Value::Object(bridge)
}

fn upgrade(weak: &Weak<HostState>) -> std::result::Result<Rc<HostState>, Throw> {
    weak.upgrade()
        .ok_or_else(|| Throw::error(ErrorKind::Error, "bridge has shut down"))
}

pub(super) fn callable_arg(args: &[Value], index: usize, function: &str) -> std::result::Result<Value, Throw> {
    let value = arg(args, index);
    if value.is_callable() {
        Ok(value)
    } else {
        Err(Throw::type_error(format!("{function}() expects a function")))
    }
}
