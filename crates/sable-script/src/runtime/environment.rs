// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical environments for variable binding.

use super::object::ObjectRef;
use super::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Outcome of assigning to a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A binding was updated
    Assigned,
    /// No binding with that name exists in the chain
    Unbound,
    /// The binding is a `const`
    Immutable,
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// A scope in the chain.
///
/// The outermost scope of a context is backed by its global object, so
/// top-level `var`s and injected globals are visible as `this.name`.
/// Function and block scopes keep declarative bindings only.
pub struct Environment {
    bindings: RefCell<FxHashMap<Rc<str>, Binding>>,
    object: Option<ObjectRef>,
    outer: Option<Rc<Environment>>,
    function_scope: bool,
    this_value: Option<Value>,
}

impl Environment {
    /// Creates the outermost scope of a context.
    pub fn global(global_object: ObjectRef) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(FxHashMap::default()),
            object: Some(global_object.clone()),
            outer: None,
            function_scope: true,
            this_value: Some(Value::Object(global_object)),
        })
    }

    /// Creates the scope of a function call.
    pub fn function(outer: Rc<Environment>, this_value: Value) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(FxHashMap::default()),
            object: None,
            outer: Some(outer),
            function_scope: true,
            this_value: Some(this_value),
        })
    }

    /// Creates a block scope for `let`/`const`.
    pub fn block(outer: Rc<Environment>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(FxHashMap::default()),
            object: None,
            outer: Some(outer),
            function_scope: false,
            this_value: None,
        })
    }

    /// Declares a block-scoped (or parameter) binding in this scope,
    /// replacing any existing one.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(Rc::from(name), Binding { value, mutable });
    }

    /// Declares a `var` in this scope. An existing binding keeps its value
    /// unless `value` is given.
    pub fn declare_var(&self, name: &str, value: Option<Value>) {
        if let Some(object) = &self.object {
            if let Some(value) = value {
                object.set(name, value);
            } else if !object.has_own(name) {
                object.set(name, Value::Undefined);
            }
            return;
        }

        let mut bindings = self.bindings.borrow_mut();
        match (bindings.get_mut(name), value) {
            (Some(binding), Some(value)) => binding.value = value,
            (Some(_), None) => {}
            (None, value) => {
                bindings.insert(
                    Rc::from(name),
                    Binding {
                        value: value.unwrap_or_default(),
                        mutable: true,
                    },
                );
            }
        }
    }

    /// Resolves a name through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        if let Some(object) = &self.object {
            if object.has_property(name) {
                return Some(object.get(name));
            }
        }
        self.outer.as_ref().and_then(|outer| outer.lookup(name))
    }

    /// Returns true if the name is bound anywhere in the chain.
    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
            || self.object.as_ref().is_some_and(|o| o.has_property(name))
            || self.outer.as_ref().is_some_and(|outer| outer.has_binding(name))
    }

    /// Assigns to the nearest binding of `name`.
    pub fn assign(&self, name: &str, value: Value) -> Assignment {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(binding) = bindings.get_mut(name) {
                if !binding.mutable {
                    return Assignment::Immutable;
                }
                binding.value = value;
                return Assignment::Assigned;
            }
        }
        if let Some(object) = &self.object {
            if object.has_property(name) {
                object.set(name, value);
                return Assignment::Assigned;
            }
        }
        match &self.outer {
            Some(outer) => outer.assign(name, value),
            None => Assignment::Unbound,
        }
    }

    /// The nearest function (or global) scope, where `var` declarations land.
    pub fn var_scope(self: &Rc<Self>) -> Rc<Self> {
        let mut env = self.clone();
        while !env.function_scope {
            match &env.outer {
                Some(outer) => env = outer.clone(),
                None => break,
            }
        }
        env
    }

    /// The `this` value of the nearest function (or global) scope.
    pub fn this_value(&self) -> Value {
        match (&self.this_value, &self.outer) {
            (Some(this), _) => this.clone(),
            (None, Some(outer)) => outer.this_value(),
            (None, None) => Value::Undefined,
        }
    }

    /// The global object at the root of the chain.
    pub fn global_object(&self) -> Option<ObjectRef> {
        match (&self.object, &self.outer) {
            (Some(object), _) => Some(object.clone()),
            (None, Some(outer)) => outer.global_object(),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_shadowing() {
        let global = Environment::global(ObjectRef::ordinary());
        global.declare_var("x", Some(Value::Number(1.0)));
        let block = Environment::block(global.clone());
        block.declare("x", Value::Number(2.0), true);
        assert_eq!(block.lookup("x"), Some(Value::Number(2.0)));
        assert_eq!(global.lookup("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_const_is_immutable() {
        let global = Environment::global(ObjectRef::ordinary());
        let block = Environment::block(global);
        block.declare("k", Value::Null, false);
        assert_eq!(block.assign("k", Value::Number(1.0)), Assignment::Immutable);
        assert_eq!(block.assign("missing", Value::Null), Assignment::Unbound);
    }

    #[test]
    fn test_global_vars_live_on_global_object() {
        let object = ObjectRef::ordinary();
        let global = Environment::global(object.clone());
        let function = Environment::function(global.clone(), Value::Undefined);
        let block = Environment::block(function.clone());
        assert!(Rc::ptr_eq(&block.var_scope(), &function));
        global.declare_var("answer", Some(Value::Number(42.0)));
        assert_eq!(object.get("answer"), Value::Number(42.0));
        assert!(block.this_value().is_undefined());
    }
}
