// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Global value properties and functions.

use super::define;
use crate::runtime::{ObjectRef, Throw, Value, arg};

pub(super) fn install(global: &ObjectRef) {
    global.set("NaN", Value::Number(f64::NAN));
    global.set("Infinity", Value::Number(f64::INFINITY));
    global.set("undefined", Value::Undefined);

    define(global, "parseInt", parse_int);
    define(global, "parseFloat", parse_float);
    define(global, "isNaN", |_, args| {
        Ok(Value::Boolean(arg(args, 0).to_number().is_nan()))
    });
    define(global, "isFinite", |_, args| {
        Ok(Value::Boolean(arg(args, 0).to_number().is_finite()))
    });
}

// ============================================================================
// Number parsing
// ============================================================================

/// parseInt(string, radix) - Parses the longest integer prefix.
fn parse_int(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let text = arg(args, 0).to_js_string();
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }

    let mut radix = match arg(args, 1) {
        Value::Undefined => 0,
        value => value.to_integer() as u32,
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }

    let mut result: Option<f64> = None;
    for c in s.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        result = Some(result.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    Ok(Value::Number(match result {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }))
}

/// parseFloat(string) - Parses the longest decimal prefix.
fn parse_float(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let text = arg(args, 0).to_js_string();
    let s = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if s.starts_with(prefix) {
            return Ok(Value::Number(f64::INFINITY));
        }
    }
    if s.starts_with("-Infinity") {
        return Ok(Value::Number(f64::NEG_INFINITY));
    }

    // Longest prefix that parses wins.
    let end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    let parsed = (1..=end)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok());
    Ok(Value::Number(parsed.unwrap_or(f64::NAN)))
}
