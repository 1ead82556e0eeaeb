// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! JSON built-in object (ES5 Section 15.12).

use crate::error::ErrorKind;
use crate::runtime::json::{from_json, to_json};
use crate::runtime::{ObjectRef, Throw, Value, arg};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

pub(super) fn install(global: &ObjectRef) {
    let json = ObjectRef::ordinary();
    super::define(&json, "stringify", stringify);
    super::define(&json, "parse", parse);
    global.set("JSON", Value::Object(json));
}

/// JSON.stringify(value, replacer, space) - `replacer` is ignored.
fn stringify(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let Some(json) = to_json(&arg(args, 0))? else {
        return Ok(Value::Undefined);
    };

    let indent = match arg(args, 2) {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(Value::from(json.to_string()));
    }

    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| Throw::type_error(e.to_string()))?;
    Ok(Value::from(String::from_utf8_lossy(&out).into_owned()))
}

/// JSON.parse(text) - Reviver functions are not supported.
fn parse(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let text = arg(args, 0).to_js_string();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| from_json(&json))
        .map_err(|e| Throw::error(ErrorKind::Syntax, format!("JSON.parse: {e}")))
}
