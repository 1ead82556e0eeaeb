// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tree-walking interpreter.
//!
//! An [`Interpreter`] is a lightweight view of one realm and file; a new one
//! is made for every evaluation and every script function call, so closures
//! always run with the principal of the context that created them.

mod expressions;
mod statements;

use crate::ast::{FunctionLiteral, Program};
use crate::error::ErrorKind;
use crate::runtime::{
    Environment, Function, ObjectRef, Realm, ScriptFunction, Throw, Value, arg,
};
use std::rc::Rc;

/// Result of executing script code.
pub type Exec<T> = Result<T, Throw>;

/// How a statement finished.
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Executes programs and functions for one realm.
pub struct Interpreter {
    realm: Rc<Realm>,
    filename: Rc<str>,
}

impl Interpreter {
    /// Creates an interpreter for code from `filename` running in `realm`.
    pub fn new(realm: Rc<Realm>, filename: Rc<str>) -> Self {
        Self { realm, filename }
    }

    /// Runs a program in the realm's global scope and returns the value of
    /// the last expression statement executed.
    pub fn run_program(&self, program: &Program) -> Exec<Value> {
        let stack = self.realm.call_stack.clone();
        stack.push(Rc::from(""), self.filename.clone(), 1)?;

        let env = self.realm.global.clone();
        self.hoist_declarations(&program.body, &env);
        let mut completion = Value::Undefined;
        let result = self.execute_statements(&program.body, &env, &mut completion);

        stack.pop();
        result.map(|_| completion)
    }

    /// Creates a closure over `env`.
    pub(crate) fn make_closure(&self, literal: &Rc<FunctionLiteral>, env: &Rc<Environment>) -> Value {
        let function = Function::Script(Rc::new(ScriptFunction {
            literal: literal.clone(),
            scope: env.clone(),
            realm: self.realm.clone(),
            filename: self.filename.clone(),
        }));
        let obj = ObjectRef::function(function);
        let prototype = ObjectRef::ordinary();
        prototype.set("constructor", Value::Object(obj.clone()));
        obj.set("prototype", Value::Object(prototype));
        Value::Object(obj)
    }

    /// Calls any function, stamping error locations from this realm's stack.
    pub(crate) fn invoke(&self, function: &Function, this: Value, args: &[Value]) -> Exec<Value> {
        let result = match function {
            Function::Script(script) => call_script(script, this, args),
            Function::Native(native) => (native.call)(&this, args),
        };
        match result {
            Ok(value) => {
                self.realm.call_stack.stamp(&value);
                Ok(value)
            }
            Err(mut thrown) => {
                self.realm.call_stack.locate(&mut thrown);
                Err(thrown)
            }
        }
    }

    /// Builds an error thrown at the current location.
    pub(crate) fn error(&self, kind: ErrorKind, message: impl AsRef<str>) -> Throw {
        let mut thrown = Throw::error(kind, message);
        self.realm.call_stack.locate(&mut thrown);
        thrown
    }

    /// Builds the error raised when a guarded capability is touched.
    pub(crate) fn permission_denied(&self, capability: &str) -> Throw {
        let principal = self.realm.principal;
        self.error(
            ErrorKind::PermissionDenied {
                capability: capability.to_string(),
                principal,
            },
            format!("permission denied to access '{capability}' from a {principal} context"),
        )
    }

    fn run_function(&self, function: &ScriptFunction, this: Value, args: &[Value]) -> Exec<Value> {
        let env = Environment::function(function.scope.clone(), this);
        env.declare("arguments", Value::Object(ObjectRef::array(args.to_vec())), true);
        for (index, param) in function.literal.params.iter().enumerate() {
            env.declare(param, arg(args, index), true);
        }

        self.hoist_declarations(&function.literal.body, &env);
        let mut scratch = Value::Undefined;
        match self.execute_statements(&function.literal.body, &env, &mut scratch)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }
}

fn call_script(function: &Rc<ScriptFunction>, this: Value, args: &[Value]) -> Exec<Value> {
    let realm = function.realm.clone();
    let name: Rc<str> = Rc::from(function.literal.name.as_deref().unwrap_or(""));
    realm
        .call_stack
        .push(name, function.filename.clone(), function.literal.line)?;

    let interpreter = Interpreter::new(realm.clone(), function.filename.clone());
    let result = interpreter.run_function(function, this, args);

    realm.call_stack.pop();
    result
}

/// Calls `callee` with the given receiver and arguments.
///
/// This is how built-ins and embedders call back into script code; closures
/// run with the principal of the context that created them.
pub fn call_function(callee: &Value, this: Value, args: &[Value]) -> Exec<Value> {
    let Some(function) = callee.as_object().and_then(ObjectRef::as_function) else {
        return Err(Throw::type_error(format!(
            "{} is not a function",
            callee.type_of()
        )));
    };
    match function {
        Function::Script(script) => call_script(&script, this, args),
        Function::Native(native) => (native.call)(&this, args),
    }
}

/// Implements `new callee(args)`.
pub fn construct(callee: &Value, args: &[Value]) -> Exec<Value> {
    let Some(constructor) = callee.as_object() else {
        return Err(Throw::type_error(format!("{} is not a constructor", callee.type_of())));
    };
    match constructor.as_function() {
        Some(Function::Script(script)) => {
            let instance = ObjectRef::ordinary();
            if let Value::Object(prototype) = constructor.get("prototype") {
                instance.borrow_mut().prototype = Some(prototype);
            }
            let result = call_script(&script, Value::Object(instance.clone()), args)?;
            match result {
                Value::Object(_) => Ok(result),
                _ => Ok(Value::Object(instance)),
            }
        }
        // Built-in constructors allocate their own instances.
        Some(Function::Native(native)) => (native.call)(&Value::Undefined, args),
        None => Err(Throw::type_error("object is not a constructor")),
    }
}

/// Converts a value to a string, calling a script-defined `toString` when
/// an ordinary object has one.
pub fn to_string(value: &Value) -> Exec<String> {
    if let Value::Object(obj) = value {
        if obj.error_kind().is_none() && !obj.is_array() && !obj.is_callable() {
            let method = obj.get("toString");
            if let Some(Function::Script(_)) = method.as_object().and_then(ObjectRef::as_function) {
                return Ok(call_function(&method, value.clone(), &[])?.to_js_string());
            }
        }
    }
    Ok(value.to_js_string())
}
