// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Function.prototype members (ES3 Section 15.3.4).

use super::method;
use crate::interpreter::call_function;
use crate::runtime::{ObjectRef, Throw, Value, arg, native_function};

pub(super) fn member(obj: &ObjectRef, key: &str) -> Option<Value> {
    let function = obj.as_function()?;
    let value = match key {
        "name" => Value::from(function.name()),
        "length" => Value::Number(function.arity() as f64),
        "call" => method("call", |this, args| {
            let receiver = arg(args, 0);
            call_function(this, receiver, args.get(1..).unwrap_or_default())
        }),
        "apply" => method("apply", |this, args| {
            let list = match arg(args, 1) {
                Value::Undefined | Value::Null => Vec::new(),
                Value::Object(array) if array.is_array() => array.array_elements().unwrap_or_default(),
                _ => return Err(Throw::type_error("second argument to Function.prototype.apply must be an array")),
            };
            call_function(this, arg(args, 0), &list)
        }),
        "bind" => method("bind", |this, args| {
            let target = this.clone();
            let receiver = arg(args, 0);
            let bound: Vec<Value> = args.get(1..).unwrap_or_default().to_vec();
            Ok(native_function("bound", move |_, rest| {
                let mut all = bound.clone();
                all.extend_from_slice(rest);
                call_function(&target, receiver.clone(), &all)
            }))
        }),
        "toString" => method("toString", |this, _| Ok(Value::from(this.to_js_string()))),
        _ => return None,
    };
    Some(value)
}
