// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Array built-in object (ES3 Section 15.4).
//!
//! Methods that take callbacks work on a snapshot of the elements so the
//! callback is free to mutate the array.

use super::{define, method, relative_index};
use crate::interpreter::{call_function, to_string};
use crate::runtime::{ObjectKind, ObjectRef, Throw, Value, arg, array_length};
use std::cmp::Ordering;

pub(super) fn install(global: &ObjectRef) {
    let array = define(global, "Array", array_constructor);
    define(&array, "isArray", |_, args| {
        Ok(Value::Boolean(
            arg(args, 0).as_object().is_some_and(ObjectRef::is_array),
        ))
    });
}

pub(super) fn member(key: &str) -> Option<Value> {
    let call: fn(&Value, &[Value]) -> Result<Value, Throw> = match key {
        "push" => push,
        "pop" => pop,
        "shift" => shift,
        "unshift" => unshift,
        "slice" => slice,
        "splice" => splice,
        "concat" => concat,
        "join" => join,
        "reverse" => reverse,
        "indexOf" => index_of,
        "forEach" => for_each,
        "map" => map,
        "filter" => filter,
        "some" => some,
        "every" => every,
        "reduce" => reduce,
        "sort" => sort,
        _ => return None,
    };
    Some(method(key, call))
}

// ============================================================================
// Array Constructor (ES3 Section 15.4.1-2)
// ============================================================================

/// Array(...) - A single numeric argument sets the length.
fn array_constructor(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    if let [length @ Value::Number(_)] = args {
        let len = array_length(length)?;
        return Ok(Value::Object(ObjectRef::array(vec![Value::Undefined; len])));
    }
    Ok(Value::Object(ObjectRef::array(args.to_vec())))
}

// ============================================================================
// Array.prototype Methods (ES3 Section 15.4.4)
// ============================================================================

fn this_array(this: &Value) -> Result<ObjectRef, Throw> {
    match this {
        Value::Object(obj) if obj.is_array() => Ok(obj.clone()),
        _ => Err(Throw::type_error("receiver is not an array")),
    }
}

fn elements(this: &Value) -> Result<Vec<Value>, Throw> {
    Ok(this_array(this)?.array_elements().unwrap_or_default())
}

/// Runs `f` against the live element vector.
fn with_elements<T>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> T) -> Result<T, Throw> {
    let obj = this_array(this)?;
    let mut object = obj.borrow_mut();
    match &mut object.kind {
        ObjectKind::Array(elements) => Ok(f(elements)),
        _ => Err(Throw::type_error("receiver is not an array")),
    }
}

fn push(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    with_elements(this, |elements| {
        elements.extend_from_slice(args);
        Value::Number(elements.len() as f64)
    })
}

fn pop(this: &Value, _args: &[Value]) -> Result<Value, Throw> {
    with_elements(this, |elements| elements.pop().unwrap_or_default())
}

fn shift(this: &Value, _args: &[Value]) -> Result<Value, Throw> {
    with_elements(this, |elements| {
        if elements.is_empty() {
            Value::Undefined
        } else {
            elements.remove(0)
        }
    })
}

fn unshift(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    with_elements(this, |elements| {
        elements.splice(0..0, args.iter().cloned());
        Value::Number(elements.len() as f64)
    })
}

/// Array.prototype.slice(start, end) - Copies a section of the array.
fn slice(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let elements = elements(this)?;
    let len = elements.len();
    let start = relative_index(&arg(args, 0), len, 0);
    let end = relative_index(&arg(args, 1), len, len);
    let section = if start < end {
        elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::Object(ObjectRef::array(section)))
}

/// Array.prototype.splice(start, deleteCount, ...items)
fn splice(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let removed = with_elements(this, |elements| {
        let len = elements.len();
        let start = relative_index(&arg(args, 0), len, 0);
        let count = match args.get(1) {
            None => len - start,
            Some(value) => (value.to_integer().max(0.0) as usize).min(len - start),
        };
        let items = args.iter().skip(2).cloned();
        elements.splice(start..start + count, items).collect::<Vec<_>>()
    })?;
    Ok(Value::Object(ObjectRef::array(removed)))
}

/// Array.prototype.concat(...items) - Arrays are spread one level.
fn concat(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut result = elements(this)?;
    for item in args {
        match item.as_object().and_then(ObjectRef::array_elements) {
            Some(inner) => result.extend(inner),
            None => result.push(item.clone()),
        }
    }
    Ok(Value::Object(ObjectRef::array(result)))
}

/// Array.prototype.join(separator) - Joins elements with separator.
fn join(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        value => value.to_js_string(),
    };
    let mut parts = Vec::new();
    for element in elements(this)? {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => to_string(&other)?,
        });
    }
    Ok(Value::from(parts.join(&separator)))
}

fn reverse(this: &Value, _args: &[Value]) -> Result<Value, Throw> {
    with_elements(this, |elements| elements.reverse())?;
    Ok(this.clone())
}

fn index_of(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let needle = arg(args, 0);
    let position = elements(this)?
        .iter()
        .position(|element| element.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
}

// ============================================================================
// Iteration methods (ES5 Section 15.4.4.14-21)
// ============================================================================

fn callback(args: &[Value], name: &str) -> Result<Value, Throw> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(Throw::type_error(format!(
            "{name}: {} is not a function",
            callback.to_js_string()
        )));
    }
    Ok(callback)
}

/// Calls `f(element, index, array)` for each element until `visit` says stop.
fn each(
    this: &Value,
    args: &[Value],
    name: &str,
    mut visit: impl FnMut(&Value, Value) -> bool,
) -> Result<(), Throw> {
    let f = callback(args, name)?;
    let receiver = arg(args, 1);
    for (index, element) in elements(this)?.into_iter().enumerate() {
        let result = call_function(
            &f,
            receiver.clone(),
            &[element.clone(), Value::Number(index as f64), this.clone()],
        )?;
        if !visit(&element, result) {
            break;
        }
    }
    Ok(())
}

fn for_each(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    each(this, args, "forEach", |_, _| true)?;
    Ok(Value::Undefined)
}

fn map(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut mapped = Vec::new();
    each(this, args, "map", |_, result| {
        mapped.push(result);
        true
    })?;
    Ok(Value::Object(ObjectRef::array(mapped)))
}

fn filter(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut kept = Vec::new();
    each(this, args, "filter", |element, result| {
        if result.to_boolean() {
            kept.push(element.clone());
        }
        true
    })?;
    Ok(Value::Object(ObjectRef::array(kept)))
}

fn some(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut found = false;
    each(this, args, "some", |_, result| {
        found = result.to_boolean();
        !found
    })?;
    Ok(Value::Boolean(found))
}

fn every(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut all = true;
    each(this, args, "every", |_, result| {
        all = result.to_boolean();
        all
    })?;
    Ok(Value::Boolean(all))
}

/// Array.prototype.reduce(callback, initial)
fn reduce(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let f = callback(args, "reduce")?;
    let mut elements = elements(this)?.into_iter().enumerate();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match elements.next() {
            Some((_, first)) => first,
            None => return Err(Throw::type_error("reduce of empty array with no initial value")),
        },
    };
    for (index, element) in elements {
        accumulator = call_function(
            &f,
            Value::Undefined,
            &[accumulator, element, Value::Number(index as f64), this.clone()],
        )?;
    }
    Ok(accumulator)
}

/// Array.prototype.sort(compare) - Stable; undefined sorts last.
fn sort(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let compare = arg(args, 0);
    let mut sorted = elements(this)?;
    let mut failure = None;

    sorted.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match (a.is_undefined(), b.is_undefined()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        if compare.is_callable() {
            match call_function(&compare, Value::Undefined, &[a.clone(), b.clone()]) {
                Ok(result) => result
                    .to_number()
                    .partial_cmp(&0.0)
                    .unwrap_or(Ordering::Equal),
                Err(thrown) => {
                    failure = Some(thrown);
                    Ordering::Equal
                }
            }
        } else {
            a.to_js_string().cmp(&b.to_js_string())
        }
    });

    if let Some(thrown) = failure {
        return Err(thrown);
    }
    with_elements(this, |elements| *elements = sorted)?;
    Ok(this.clone())
}
