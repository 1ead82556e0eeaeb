// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in objects and constructors.
//!
//! Constructors and namespaces (`Object`, `Array`, `Math`, `JSON`, the error
//! family, ...) are installed on every global object. Prototype methods are
//! not stored on objects; property reads that miss fall back to
//! [`object_member`], [`string_member`] and friends, which hand out native
//! functions operating on `this`.

mod array;
mod error;
mod function;
mod global;
mod json;
mod math;
mod number;
mod object;
mod string;

use crate::runtime::{Function, NativeFunction, ObjectRef, Throw, Value, native_function};
use std::rc::Rc;

/// Installs the standard globals on `global`.
pub fn install(global: &ObjectRef) {
    global::install(global);
    object::install(global);
    array::install(global);
    string::install(global);
    number::install(global);
    error::install(global);
    math::install(global);
    json::install(global);
}

/// Resolves a built-in member of an object that has no such own or
/// inherited property.
pub(crate) fn object_member(obj: &ObjectRef, key: &str) -> Option<Value> {
    let specific = if obj.is_callable() {
        function::member(obj, key)
    } else if obj.is_array() {
        array::member(key)
    } else if obj.error_kind().is_some() {
        error::member(key)
    } else {
        None
    };
    specific.or_else(|| object::member(key))
}

/// Resolves a member of a string primitive.
pub(crate) fn string_member(s: &str, key: &str) -> Option<Value> {
    if key == "length" {
        return Some(Value::Number(s.chars().count() as f64));
    }
    if let Ok(index) = key.parse::<usize>() {
        return s.chars().nth(index).map(|c| Value::from(c.to_string()));
    }
    string::member(key).or_else(|| object::member(key))
}

/// Resolves a member of a number primitive.
pub(crate) fn number_member(key: &str) -> Option<Value> {
    number::member(key).or_else(|| object::member(key))
}

/// Resolves a member of a boolean primitive.
pub(crate) fn boolean_member(key: &str) -> Option<Value> {
    match key {
        "toString" => Some(method("toString", |this, _| {
            Ok(Value::from(this.to_js_string()))
        })),
        _ => object::member(key),
    }
}

/// Implements `obj instanceof Ctor` for built-in constructors.
pub(crate) fn is_instance_of(obj: &ObjectRef, constructor: &str) -> bool {
    match constructor {
        "Object" => true,
        "Array" => obj.is_array(),
        "Function" => obj.is_callable(),
        "Error" => obj.error_kind().is_some(),
        name => obj.error_kind().is_some_and(|kind| kind.name() == name),
    }
}

/// Creates a native method value.
fn method(
    name: &str,
    call: impl Fn(&Value, &[Value]) -> Result<Value, Throw> + 'static,
) -> Value {
    native_function(name, call)
}

/// Defines a native function as a property of `target` and returns the new
/// function object so statics can be hung off it.
fn define(
    target: &ObjectRef,
    name: &str,
    call: impl Fn(&Value, &[Value]) -> Result<Value, Throw> + 'static,
) -> ObjectRef {
    let obj = ObjectRef::function(Function::Native(Rc::new(NativeFunction {
        name: Rc::from(name),
        call: Box::new(call),
    })));
    target.set(name, Value::Object(obj.clone()));
    obj
}

/// Clamps a relative index the way `slice` does.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_integer();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_instance_of_error_family() {
        let err = ObjectRef::error(ErrorKind::Type, "bad");
        assert!(is_instance_of(&err, "Error"));
        assert!(is_instance_of(&err, "TypeError"));
        assert!(!is_instance_of(&err, "RangeError"));
        assert!(!is_instance_of(&err, "Array"));
    }

    #[test]
    fn test_string_member_length_and_index() {
        assert_eq!(string_member("héllo", "length"), Some(Value::Number(5.0)));
        assert_eq!(string_member("héllo", "1"), Some(Value::from("é")));
        assert_eq!(string_member("abc", "7"), None);
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative_index(&Value::Number(-2.0), 5, 0), 3);
        assert_eq!(relative_index(&Value::Number(9.0), 5, 0), 5);
        assert_eq!(relative_index(&Value::Undefined, 5, 5), 5);
    }
}
