// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution contexts.

use super::Principal;
use crate::error::{ErrorKind, ScriptError};
use crate::interpreter::{Interpreter, call_function};
use crate::parser::parse;
use crate::runtime::json::to_json_lossy;
use crate::runtime::{CallStack, ObjectRef, Realm, Throw, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// File name given to code evaluated without one.
pub const ANONYMOUS_FILENAME: &str = "<string>";

/// Options for [`SandboxFactory::create_context`](super::SandboxFactory::create_context).
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Principal to run with; the factory default when `None`
    pub principal: Option<Principal>,
    /// Default file name for code evaluated in the context
    pub filename: Option<String>,
}

impl ContextOptions {
    /// Options naming the file the context is made for.
    pub fn for_file(filename: impl Into<String>) -> Self {
        Self {
            principal: None,
            filename: Some(filename.into()),
        }
    }

    /// Sets the principal.
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// An isolated global scope bound to one principal.
///
/// Contexts are cheap handles; clones share the same global scope.
#[derive(Clone)]
pub struct ExecutionContext {
    realm: Rc<Realm>,
    injected: Rc<RefCell<Vec<String>>>,
}

impl ExecutionContext {
    pub(crate) fn new(realm: Rc<Realm>) -> Self {
        Self {
            realm,
            injected: Rc::default(),
        }
    }

    /// The principal the context was created with.
    pub fn principal(&self) -> Principal {
        self.realm.principal
    }

    /// The context's default file name.
    pub fn filename(&self) -> &str {
        &self.realm.filename
    }

    /// Defines (or overwrites) a global binding.
    pub fn define_global(&self, name: &str, value: Value) {
        self.realm.global_object.set(name, value);
        let mut injected = self.injected.borrow_mut();
        if !injected.iter().any(|n| n == name) {
            injected.push(name.to_string());
        }
    }

    /// Reads a global binding; `None` when unbound.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.realm.global_object.get_own(name)
    }

    /// The object backing the global scope (`this` at top level).
    pub fn global_object(&self) -> ObjectRef {
        self.realm.global_object.clone()
    }

    /// Names injected with [`define_global`](Self::define_global), in order.
    pub fn injected_names(&self) -> Vec<String> {
        self.injected.borrow().clone()
    }

    /// The call stack shared by every context of the creating factory.
    pub fn call_stack(&self) -> Rc<CallStack> {
        self.realm.call_stack.clone()
    }

    /// Evaluates `source` in the context's global scope and returns the value
    /// of the last expression statement.
    pub fn evaluate(&self, source: &str, filename: Option<&str>) -> Result<Value, ScriptError> {
        let filename: Rc<str> = match filename {
            Some(name) => Rc::from(name),
            None => self.realm.filename.clone(),
        };
        tracing::trace!(%filename, principal = %self.realm.principal, "evaluating");

        let program = parse(source, &filename)?;
        Interpreter::new(self.realm.clone(), filename.clone())
            .run_program(&program)
            .map_err(|thrown| script_error(&thrown, &filename))
    }

    /// Calls a function value from outside script code.
    pub fn call(&self, function: &Value, this: Value, args: &[Value]) -> Result<Value, ScriptError> {
        call_function(function, this, args).map_err(|thrown| script_error(&thrown, &self.realm.filename))
    }
}

/// Converts an uncaught exception into a [`ScriptError`].
pub fn script_error(thrown: &Throw, filename: &str) -> ScriptError {
    let location = thrown.location.as_ref();
    let fallback_file = location.map_or(filename, |l| &*l.filename).to_string();
    let fallback_line = location.map_or(0, |l| l.line);
    let fallback_stack = location.map(|l| l.stack.clone()).unwrap_or_default();

    let value = to_json_lossy(&thrown.value);
    let Some(obj) = thrown.value.as_object().filter(|obj| obj.error_kind().is_some()) else {
        return ScriptError::new(
            ErrorKind::Thrown,
            thrown.value.to_js_string(),
            fallback_file,
            fallback_line,
        )
        .with_stack(fallback_stack)
        .with_value(value);
    };

    let kind = obj.error_kind().unwrap_or(ErrorKind::Error);
    let message = match obj.get("message") {
        Value::Undefined => String::new(),
        message => message.to_js_string(),
    };
    let filename = match obj.get("fileName") {
        Value::String(name) => name.to_string(),
        _ => fallback_file,
    };
    let line = match obj.get("lineNumber") {
        Value::Number(n) => n as u32,
        _ => fallback_line,
    };
    let stack = match obj.get("stack") {
        Value::String(stack) => stack.to_string(),
        _ => fallback_stack,
    };

    ScriptError::new(kind, message, filename, line)
        .with_stack(stack)
        .with_value(value)
        .with_payload(obj.payload())
}
