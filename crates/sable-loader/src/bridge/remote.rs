// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The restricted side of the bridge: a loader whose filesystem is the host.

use super::endpoint::{Endpoint, Incoming};
use super::host::callable_arg;
use super::protocol::{CallOutcome, Event, ExceptionInfo, Reply, Request, RequireResponse};
use super::transport::Transport;
use super::{ADAPTER_SUFFIX, Listeners, from_wire, to_wire};
use crate::console;
use crate::error::{LoaderError, Result};
use crate::fs::{CanonicalPath, FileSystem, SourceFile, validate_identifier};
use crate::module_system::Loader;
use sable_script::runtime::arg;
use sable_script::runtime::json::from_json;
use sable_script::sandbox::script_error;
use sable_script::{
    ErrorKind, ExecutionContext, ObjectRef, Principal, Throw, Value, call_function, native_function,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::thread::{self, JoinHandle};

/// Stack size for the in-process remote thread; deep script recursion
/// needs more than the default.
const REMOTE_STACK_SIZE: usize = 16 * 1024 * 1024;

struct RemoteState {
    endpoint: Endpoint,
    scripts: RefCell<HashMap<CanonicalPath, SourceFile>>,
    resolved: RefCell<HashMap<(Option<String>, String), CanonicalPath>>,
    messaging: RefCell<HashSet<CanonicalPath>>,
    listeners: Listeners,
}

impl RemoteState {
    fn dispatch(&self, message: Incoming) {
        match message {
            Incoming::Event(Event::Message { name, args }) => {
                if let Err(e) = self.listeners.fire(&name, &from_wire(&name, &args)) {
                    self.report(&e);
                }
            }
            Incoming::Request { id, request } => {
                tracing::warn!(?request, "remote process does not serve requests");
                let refusal = Reply::Call(CallOutcome::Exception(ExceptionInfo {
                    message: "remote process does not serve requests".to_string(),
                    ..ExceptionInfo::default()
                }));
                if let Err(e) = self.endpoint.reply(id, refusal) {
                    tracing::debug!(error = %e, "failed to refuse request");
                }
            }
            Incoming::Event(event) => tracing::warn!(?event, "unexpected event in remote process"),
        }
    }

    fn report(&self, err: &LoaderError) {
        tracing::debug!("uncaught exception: {err}");
        let exception = ExceptionInfo::from_error(err);
        if self.endpoint.send_event(Event::Exception { exception }).is_err() {
            tracing::debug!("host is gone; exception not reported");
        }
    }

    fn request(&self, request: Request) -> Result<Reply> {
        self.endpoint.request(request, &mut |message| self.dispatch(message))
    }
}

/// Resolves modules by asking the host. Each `(base, identifier)` pair is
/// asked once; scripts are kept by file name.
struct BridgeFileSystem {
    state: Rc<RemoteState>,
}

impl FileSystem for BridgeFileSystem {
    fn resolve_module(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        validate_identifier(identifier)?;
        let key = (base.map(str::to_string), identifier.to_string());
        if let Some(path) = self.state.resolved.borrow().get(&key) {
            return Ok(Some(path.clone()));
        }

        let reply = self.state.request(Request::Require {
            base_path: key.0.clone(),
            identifier: identifier.to_string(),
        })?;
        match reply {
            Reply::Require(RequireResponse::Ok {
                script,
                needs_messaging,
            }) => {
                let path = script.filename.clone();
                if needs_messaging {
                    self.state.messaging.borrow_mut().insert(path.clone());
                }
                self.state.scripts.borrow_mut().insert(path.clone(), script);
                self.state.resolved.borrow_mut().insert(key, path.clone());
                Ok(Some(path))
            }
            Reply::Require(RequireResponse::NotFound) => Ok(None),
            Reply::Require(RequireResponse::AccessDenied) => Err(LoaderError::PermissionDenied {
                capability: format!("{identifier}{ADAPTER_SUFFIX}"),
                principal: Principal::Restricted,
            }),
            Reply::Require(RequireResponse::Error) => Err(LoaderError::remote(format!(
                "the host refused to load '{identifier}'; see the host log"
            ))),
            Reply::Call(_) => Err(LoaderError::remote("unexpected reply to a require request")),
        }
    }

    fn get_file(&self, path: &str) -> Result<SourceFile> {
        self.state.scripts.borrow().get(path).cloned().ok_or_else(|| {
            LoaderError::fetch(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "script was not sent by the host"),
            )
        })
    }
}

/// A restricted loader driven by a [`BridgeHost`](super::BridgeHost).
pub struct RemoteRuntime {
    state: Rc<RemoteState>,
    loader: Loader,
}

impl RemoteRuntime {
    /// Connects to the host at the other end of `transport`.
    pub fn new(transport: Transport) -> Result<Self> {
        let state = Rc::new(RemoteState {
            endpoint: Endpoint::new(transport),
            scripts: RefCell::default(),
            resolved: RefCell::default(),
            messaging: RefCell::default(),
            listeners: Listeners::default(),
        });

        let forward = state.clone();
        let console = console::create(move |level, args| {
            if forward.endpoint.send_event(Event::Console { level, args }).is_err() {
                tracing::debug!("host is gone; console output dropped");
            }
        });

        let hook_state = state.clone();
        let loader = Loader::builder()
            .fs(BridgeFileSystem {
                state: state.clone(),
            })
            .default_principal(Principal::Restricted)
            .global("console", console)
            .modify_module_context(move |context, file| {
                if hook_state.messaging.borrow().contains(&file.filename) {
                    context.define_global("chrome", messaging_handle(&hook_state, context));
                }
                Ok(())
            })
            .build()?;

        Ok(Self { state, loader })
    }

    /// The remote loader.
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Serves the host until it disconnects.
    pub fn run(&self) -> Result<()> {
        tracing::debug!("remote runtime ready");
        while let Some(message) = self.state.endpoint.recv() {
            match message {
                Incoming::Event(Event::StartMain { main, options }) => self.start_main(&main, &options),
                other => self.state.dispatch(other),
            }
        }
        tracing::debug!("host disconnected, remote runtime exiting");
        Ok(())
    }

    /// Requires `main` and calls its `main(options, callbacks)` if it has
    /// one. Failures are reported to the host as exception events.
    pub fn start_main(&self, main: &str, options: &serde_json::Value) {
        if let Err(e) = self.call_main(main, options) {
            self.state.report(&e);
        }
    }

    fn call_main(&self, main: &str, options: &serde_json::Value) -> Result<()> {
        let exports = self.loader.require(main)?;
        let entry = exports.as_object().map(|obj| obj.get("main"));
        let Some(entry) = entry.filter(Value::is_callable) else {
            tracing::debug!(%main, "main module has no main()");
            return Ok(());
        };

        let callbacks = ObjectRef::ordinary();
        let state = self.state.clone();
        callbacks.set(
            "quit",
            native_function("quit", move |_, args| {
                let status = match arg(args, 0) {
                    Value::Undefined => "OK".to_string(),
                    status => status.to_js_string(),
                };
                state
                    .endpoint
                    .send_event(Event::Quit { status })
                    .map_err(LoaderError::into_throw)?;
                Ok(Value::Undefined)
            }),
        );

        call_function(&entry, exports.clone(), &[from_json(options), Value::Object(callbacks)])
            .map_err(|thrown| LoaderError::from_script(script_error(&thrown, main)))?;
        Ok(())
    }
}

impl Drop for RemoteRuntime {
    fn drop(&mut self) {
        // Listeners close over contexts that hold the messaging handle.
        self.state.listeners.clear();
        self.loader.unload("shutdown");
    }
}

/// The `chrome` object given to adapter scripts.
fn messaging_handle(state: &Rc<RemoteState>, context: &ExecutionContext) -> Value {
    let chrome = ObjectRef::ordinary();

    let call_state = state.clone();
    let call_stack = context.call_stack();
    chrome.set(
        "call",
        native_function("call", move |_, args| {
            let name = arg(args, 0).to_js_string();
            let payload = to_wire(args.get(1..).unwrap_or_default())?;
            let reply = call_state
                .request(Request::Call {
                    name,
                    args: payload,
                })
                .map_err(LoaderError::into_throw)?;
            match reply {
                Reply::Call(CallOutcome::ReturnValue(value)) => Ok(from_json(&value)),
                Reply::Call(CallOutcome::Exception(exception)) => {
                    // Host frames first, then ours.
                    let error = ObjectRef::error(ErrorKind::Error, &exception.message);
                    error.set("fileName", Value::from(exception.file_name));
                    error.set("lineNumber", Value::Number(f64::from(exception.line_number)));
                    error.set(
                        "stack",
                        Value::from(format!("{}{}", exception.stack, call_stack.render())),
                    );
                    Err(Throw::new(Value::Object(error)))
                }
                Reply::Require(_) => Err(Throw::error(
                    ErrorKind::Error,
                    "unexpected reply to a call request",
                )),
            }
        }),
    );

    let send_state = state.clone();
    chrome.set(
        "send",
        native_function("send", move |_, args| {
            let name = arg(args, 0).to_js_string();
            let payload = to_wire(args.get(1..).unwrap_or_default())?;
            send_state
                .endpoint
                .send_event(Event::Message {
                    name,
                    args: payload,
                })
                .map_err(LoaderError::into_throw)?;
            Ok(Value::Undefined)
        }),
    );

    let on_state = state.clone();
    chrome.set(
        "on",
        native_function("on", move |_, args| {
            let handler = callable_arg(args, 1, "on")?;
            on_state.listeners.on(&arg(args, 0).to_js_string(), handler);
            Ok(Value::Undefined)
        }),
    );

    let remove_state = state.clone();
    chrome.set(
        "removeListener",
        native_function("removeListener", move |_, args| {
            let removed = remove_state
                .listeners
                .remove(&arg(args, 0).to_js_string(), &arg(args, 1));
            Ok(Value::Boolean(removed))
        }),
    );

    Value::Object(chrome)
}

/// Runs a [`RemoteRuntime`] on its own thread.
pub fn spawn_in_process(transport: Transport) -> Result<JoinHandle<Result<()>>> {
    let handle = thread::Builder::new()
        .name("sable-remote".to_string())
        .stack_size(REMOTE_STACK_SIZE)
        .spawn(move || RemoteRuntime::new(transport)?.run())?;
    Ok(handle)
}
