// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Callable values.

use super::environment::Environment;
use super::object::ObjectRef;
use super::realm::Realm;
use super::throw::Throw;
use super::value::Value;
use crate::ast::FunctionLiteral;
use std::rc::Rc;

/// Signature of a host-implemented function: `(this, arguments)`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, Throw>;

/// A callable.
#[derive(Clone)]
pub enum Function {
    /// Defined in script source; closes over its scope and realm
    Script(Rc<ScriptFunction>),
    /// Implemented in Rust
    Native(Rc<NativeFunction>),
}

/// A closure created from a function literal.
pub struct ScriptFunction {
    /// The literal the closure was created from
    pub literal: Rc<FunctionLiteral>,
    /// The scope the closure was created in
    pub scope: Rc<Environment>,
    /// The context the closure belongs to; calls run with its principal
    pub realm: Rc<Realm>,
    /// File the literal appeared in
    pub filename: Rc<str>,
}

/// A host function.
pub struct NativeFunction {
    /// Name reported by `fn.name` and in stack traces
    pub name: Rc<str>,
    /// Implementation
    pub call: Box<NativeFn>,
}

impl Function {
    /// The function's name; empty for anonymous functions.
    pub fn name(&self) -> &str {
        match self {
            Function::Script(f) => f.literal.name.as_deref().unwrap_or(""),
            Function::Native(f) => &f.name,
        }
    }

    /// Declared parameter count.
    pub fn arity(&self) -> usize {
        match self {
            Function::Script(f) => f.literal.params.len(),
            Function::Native(_) => 0,
        }
    }
}

/// Wraps a Rust closure as a script function value.
pub fn native_function<F>(name: &str, call: F) -> Value
where
    F: Fn(&Value, &[Value]) -> Result<Value, Throw> + 'static,
{
    let function = Function::Native(Rc::new(NativeFunction {
        name: Rc::from(name),
        call: Box::new(call),
    }));
    Value::Object(ObjectRef::function(function))
}

/// Returns the argument at `index`, or `undefined`.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}
