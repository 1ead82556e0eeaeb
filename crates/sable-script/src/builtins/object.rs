// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Object built-in object (ES3 Section 15.2).

use super::{define, method};
use crate::runtime::{ObjectRef, Throw, Value, arg};

pub(super) fn install(global: &ObjectRef) {
    let object = define(global, "Object", object_constructor);
    define(&object, "keys", object_keys);
    define(&object, "create", object_create);
    define(&object, "getPrototypeOf", |_, args| {
        let target = expect_object(&arg(args, 0), "Object.getPrototypeOf")?;
        let prototype = target.borrow().prototype.clone();
        Ok(prototype.map_or(Value::Null, Value::Object))
    });
    define(&object, "defineProperty", |_, args| {
        let target = arg(args, 0);
        let obj = expect_object(&target, "Object.defineProperty")?;
        let descriptor = arg(args, 2);
        if let Value::Object(descriptor) = descriptor {
            obj.set(&arg(args, 1).to_js_string(), descriptor.get("value"));
        }
        Ok(target)
    });
    // Objects are never sealed; freezing is accepted and ignored.
    define(&object, "freeze", |_, args| Ok(arg(args, 0)));
}

/// Members every object responds to.
pub(super) fn member(key: &str) -> Option<Value> {
    let value = match key {
        "hasOwnProperty" => method("hasOwnProperty", |this, args| {
            let key = arg(args, 0).to_js_string();
            Ok(Value::Boolean(match this {
                Value::Object(obj) => obj.has_own(&key),
                Value::String(s) => key == "length" || key.parse::<usize>().is_ok_and(|i| i < s.chars().count()),
                _ => false,
            }))
        }),
        "toString" => method("toString", |this, _| Ok(Value::from(this.to_js_string()))),
        "valueOf" => method("valueOf", |this, _| Ok(this.clone())),
        _ => return None,
    };
    Some(value)
}

// ============================================================================
// Object Constructor (ES3 Section 15.2.1-2)
// ============================================================================

/// Object(value) - Returns `value` if it is an object, otherwise `{}`.
fn object_constructor(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    match arg(args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(ObjectRef::ordinary())),
    }
}

/// Object.keys(obj) - Own enumerable keys in insertion order.
fn object_keys(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let obj = expect_object(&arg(args, 0), "Object.keys")?;
    let keys = obj.keys().into_iter().map(Value::String).collect();
    Ok(Value::Object(ObjectRef::array(keys)))
}

/// Object.create(proto) - A new object inheriting from `proto`.
fn object_create(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let obj = ObjectRef::ordinary();
    match arg(args, 0) {
        Value::Object(prototype) => obj.borrow_mut().prototype = Some(prototype),
        Value::Null => {}
        other => {
            return Err(Throw::type_error(format!(
                "{} is not an object or null",
                other.to_js_string()
            )));
        }
    }
    Ok(Value::Object(obj))
}

fn expect_object(value: &Value, caller: &str) -> Result<ObjectRef, Throw> {
    match value {
        Value::Object(obj) => Ok(obj.clone()),
        other => Err(Throw::type_error(format!(
            "{caller}: {} is not an object",
            other.to_js_string()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_insertion_order() {
        let obj = ObjectRef::ordinary();
        obj.set("b", Value::Number(1.0));
        obj.set("a", Value::Number(2.0));
        let keys = object_keys(&Value::Undefined, &[Value::Object(obj)]).unwrap();
        assert_eq!(keys.to_js_string(), "b,a");
    }

    #[test]
    fn test_create_inherits() {
        let proto = ObjectRef::ordinary();
        proto.set("greeting", Value::from("hi"));
        let child = object_create(&Value::Undefined, &[Value::Object(proto)]).unwrap();
        let child = child.as_object().unwrap();
        assert_eq!(child.get("greeting"), Value::from("hi"));
        assert!(!child.has_own("greeting"));
    }

    #[test]
    fn test_keys_rejects_primitives() {
        assert!(object_keys(&Value::Undefined, &[Value::Number(1.0)]).is_err());
    }
}
