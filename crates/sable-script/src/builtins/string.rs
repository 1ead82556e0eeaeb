// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String built-in object (ES3 Section 15.5).
//!
//! Positions count Unicode scalar values.

use super::{define, method, relative_index};
use crate::interpreter::{call_function, to_string};
use crate::runtime::{ObjectRef, Throw, Value, arg};

pub(super) fn install(global: &ObjectRef) {
    let string = define(global, "String", |_, args| match args.first() {
        Some(value) => Ok(Value::from(to_string(value)?)),
        None => Ok(Value::from("")),
    });
    define(&string, "fromCharCode", from_char_code);
}

pub(super) fn member(key: &str) -> Option<Value> {
    let call: fn(&Value, &[Value]) -> Result<Value, Throw> = match key {
        "toString" | "valueOf" => |this, _| Ok(this.clone()),
        "charAt" => char_at,
        "charCodeAt" => char_code_at,
        "indexOf" => index_of,
        "lastIndexOf" => last_index_of,
        "slice" => slice,
        "substring" => substring,
        "substr" => substr,
        "split" => split,
        "replace" => replace,
        "concat" => concat,
        "trim" => |this, _| Ok(Value::from(this.to_js_string().trim())),
        "toUpperCase" => |this, _| Ok(Value::from(this.to_js_string().to_uppercase())),
        "toLowerCase" => |this, _| Ok(Value::from(this.to_js_string().to_lowercase())),
        "startsWith" => |this, args| {
            Ok(Value::Boolean(this.to_js_string().starts_with(&*arg(args, 0).to_js_string())))
        },
        "endsWith" => |this, args| {
            Ok(Value::Boolean(this.to_js_string().ends_with(&*arg(args, 0).to_js_string())))
        },
        _ => return None,
    };
    Some(method(key, call))
}

fn chars(this: &Value) -> Vec<char> {
    this.to_js_string().chars().collect()
}

fn collect(chars: &[char]) -> Value {
    Value::from(chars.iter().collect::<String>())
}

/// Character index of `needle` in `haystack` at or after `from`.
fn find(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    (from..haystack.len())
        .find(|&i| haystack[i..].starts_with(needle))
}

// ============================================================================
// String Constructor (ES3 Section 15.5.3)
// ============================================================================

/// String.fromCharCode(...codes) - Returns string from char codes.
fn from_char_code(_this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let s: String = args
        .iter()
        .filter_map(|code| char::from_u32(code.to_number() as u32 & 0xFFFF))
        .collect();
    Ok(Value::from(s))
}

// ============================================================================
// String.prototype Methods (ES3 Section 15.5.4)
// ============================================================================

fn char_at(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let chars = chars(this);
    let pos = arg(args, 0).to_integer();
    if pos < 0.0 || pos as usize >= chars.len() {
        return Ok(Value::from(""));
    }
    Ok(Value::from(chars[pos as usize].to_string()))
}

fn char_code_at(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let chars = chars(this);
    let pos = arg(args, 0).to_integer();
    if pos < 0.0 || pos as usize >= chars.len() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(f64::from(u32::from(chars[pos as usize]))))
}

fn index_of(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let haystack = chars(this);
    let needle = chars(&arg(args, 0));
    let from = arg(args, 1).to_integer().max(0.0) as usize;
    Ok(Value::Number(
        find(&haystack, &needle, from).map_or(-1.0, |i| i as f64),
    ))
}

fn last_index_of(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let haystack = chars(this);
    let needle = chars(&arg(args, 0));
    if needle.len() > haystack.len() {
        return Ok(Value::Number(-1.0));
    }
    let found = (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..].starts_with(&needle));
    Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

/// String.prototype.slice(start, end) - Negative positions count from the end.
fn slice(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let chars = chars(this);
    let start = relative_index(&arg(args, 0), chars.len(), 0);
    let end = relative_index(&arg(args, 1), chars.len(), chars.len());
    Ok(if start < end {
        collect(&chars[start..end])
    } else {
        Value::from("")
    })
}

/// String.prototype.substring(start, end) - Arguments are clamped and swapped.
fn substring(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let chars = chars(this);
    let clamp = |value: Value, default: usize| {
        if value.is_undefined() {
            default
        } else {
            let n = value.to_integer();
            if n.is_nan() || n < 0.0 { 0 } else { (n as usize).min(chars.len()) }
        }
    };
    let a = clamp(arg(args, 0), 0);
    let b = clamp(arg(args, 1), chars.len());
    Ok(collect(&chars[a.min(b)..a.max(b)]))
}

fn substr(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let chars = chars(this);
    let start = relative_index(&arg(args, 0), chars.len(), 0);
    let length = match arg(args, 1) {
        Value::Undefined => chars.len() - start,
        value => (value.to_integer().max(0.0) as usize).min(chars.len() - start),
    };
    Ok(collect(&chars[start..start + length]))
}

/// String.prototype.split(separator, limit)
fn split(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let s = this.to_js_string();
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        value => value.to_number() as usize,
    };
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::from(s)],
        separator => {
            let separator = separator.to_js_string();
            if separator.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::from).collect()
            }
        }
    };
    Ok(Value::Object(ObjectRef::array(
        parts.into_iter().take(limit).collect(),
    )))
}

/// String.prototype.replace(pattern, replacement) - Replaces the first
/// occurrence of a string pattern; `replacement` may be a function.
fn replace(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let s = this.to_js_string();
    let pattern = arg(args, 0).to_js_string();
    let Some(at) = s.find(&pattern) else {
        return Ok(Value::from(s));
    };

    let replacement = arg(args, 1);
    let replacement = if replacement.is_callable() {
        let char_index = s[..at].chars().count();
        let result = call_function(
            &replacement,
            Value::Undefined,
            &[
                Value::from(pattern.as_str()),
                Value::Number(char_index as f64),
                Value::from(s.as_str()),
            ],
        )?;
        to_string(&result)?
    } else {
        replacement.to_js_string().replace("$&", &pattern)
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..at]);
    out.push_str(&replacement);
    out.push_str(&s[at + pattern.len()..]);
    Ok(Value::from(out))
}

fn concat(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let mut s = this.to_js_string();
    for value in args {
        s.push_str(&to_string(value)?);
    }
    Ok(Value::from(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&Value, &[Value]) -> Result<Value, Throw>, this: &str, args: &[Value]) -> Value {
        f(&Value::from(this), args).unwrap()
    }

    #[test]
    fn test_index_of_counts_chars() {
        assert_eq!(call(index_of, "né-é", &[Value::from("é")]), Value::Number(1.0));
        assert_eq!(call(last_index_of, "né-é", &[Value::from("é")]), Value::Number(3.0));
        assert_eq!(call(index_of, "abc", &[Value::from("z")]), Value::Number(-1.0));
    }

    #[test]
    fn test_slicing() {
        assert_eq!(call(slice, "sandbox", &[Value::Number(-3.0)]), Value::from("box"));
        assert_eq!(call(substring, "sandbox", &[Value::Number(4.0), Value::Number(1.0)]), Value::from("and"));
        assert_eq!(call(substr, "sandbox", &[Value::Number(1.0), Value::Number(3.0)]), Value::from("and"));
    }

    #[test]
    fn test_split() {
        let parts = call(split, "a/b/c", &[Value::from("/")]);
        assert_eq!(parts.to_js_string(), "a,b,c");
        let limited = call(split, "a/b/c", &[Value::from("/"), Value::Number(2.0)]);
        assert_eq!(limited.to_js_string(), "a,b");
    }

    #[test]
    fn test_replace_first_occurrence() {
        let out = call(replace, "x-e10s-x", &[Value::from("x"), Value::from("[$&]")]);
        assert_eq!(out, Value::from("[x]-e10s-x"));
    }
}
