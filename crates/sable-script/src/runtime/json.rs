// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Conversion between script values and JSON.
//!
//! Used by the `JSON` built-in and by anything that ships values across a
//! thread or process boundary.

use super::object::ObjectRef;
use super::throw::Throw;
use super::value::Value;

/// Converts a value to JSON. Returns `None` for values JSON cannot express
/// (`undefined`, functions), which are dropped from objects and become
/// `null` inside arrays.
pub fn to_json(value: &Value) -> Result<Option<serde_json::Value>, Throw> {
    let mut seen = Vec::new();
    convert(value, &mut seen)
}

/// Like [`to_json`] but never fails: cycles and unrepresentable values
/// become `null`.
pub fn to_json_lossy(value: &Value) -> serde_json::Value {
    to_json(value).ok().flatten().unwrap_or(serde_json::Value::Null)
}

fn convert(value: &Value, seen: &mut Vec<usize>) -> Result<Option<serde_json::Value>, Throw> {
    let json = match value {
        Value::Undefined => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Object(obj) => {
            if obj.is_callable() {
                return Ok(None);
            }
            if seen.contains(&obj.id()) {
                return Err(Throw::type_error("cyclic object value"));
            }
            seen.push(obj.id());
            let json = convert_object(obj, seen);
            seen.pop();
            json?
        }
    };
    Ok(Some(json))
}

fn convert_object(obj: &ObjectRef, seen: &mut Vec<usize>) -> Result<serde_json::Value, Throw> {
    if let Some(elements) = obj.array_elements() {
        let mut items = Vec::with_capacity(elements.len());
        for element in &elements {
            items.push(convert(element, seen)?.unwrap_or(serde_json::Value::Null));
        }
        return Ok(serde_json::Value::Array(items));
    }

    let mut map = serde_json::Map::new();
    for key in obj.keys() {
        if let Some(json) = convert(&obj.get(&key), seen)? {
            map.insert(key.to_string(), json);
        }
    }
    Ok(serde_json::Value::Object(map))
}

fn number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Builds a script value from JSON.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::Object(ObjectRef::array(items.iter().map(from_json).collect()))
        }
        serde_json::Value::Object(map) => {
            let obj = ObjectRef::ordinary();
            for (key, value) in map {
                obj.set(key, from_json(value));
            }
            Value::Object(obj)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_numbers_stay_integers() {
        assert_eq!(to_json(&Value::Number(5.0)).unwrap(), Some(json!(5)));
        assert_eq!(to_json(&Value::Number(0.25)).unwrap(), Some(json!(0.25)));
        assert_eq!(to_json(&Value::Number(f64::NAN)).unwrap(), Some(json!(null)));
    }

    #[test]
    fn test_objects_keep_key_order() {
        let value = from_json(&json!({"b": 1, "a": [true, null, "x"]}));
        let back = to_json(&value).unwrap().unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), r#"{"b":1,"a":[true,null,"x"]}"#);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let obj = ObjectRef::ordinary();
        obj.set("self", Value::Object(obj.clone()));
        assert!(to_json(&Value::Object(obj.clone())).is_err());
        assert_eq!(to_json_lossy(&Value::Object(obj)), json!(null));
    }

    #[test]
    fn test_shared_references_are_not_cycles() {
        let shared = ObjectRef::ordinary();
        let outer = ObjectRef::array(vec![
            Value::Object(shared.clone()),
            Value::Object(shared),
        ]);
        assert_eq!(to_json(&Value::Object(outer)).unwrap(), Some(json!([{}, {}])));
    }
}
