// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Number and Boolean built-in objects (ES3 Sections 15.6-15.7).

use super::{define, method};
use crate::runtime::{ObjectRef, Throw, Value, arg, number_to_string};

pub(super) fn install(global: &ObjectRef) {
    let number = define(global, "Number", |_, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    number.set("NaN", Value::Number(f64::NAN));
    number.set("MAX_VALUE", Value::Number(f64::MAX));
    number.set("MIN_VALUE", Value::Number(f64::MIN_POSITIVE));
    number.set("POSITIVE_INFINITY", Value::Number(f64::INFINITY));
    number.set("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));

    define(global, "Boolean", |_, args| {
        Ok(Value::Boolean(arg(args, 0).to_boolean()))
    });
}

pub(super) fn member(key: &str) -> Option<Value> {
    let call: fn(&Value, &[Value]) -> Result<Value, Throw> = match key {
        "toString" => to_string,
        "toFixed" => to_fixed,
        "valueOf" => |this, _| Ok(this.clone()),
        _ => return None,
    };
    Some(method(key, call))
}

/// Number.prototype.toString(radix)
fn to_string(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let n = this.to_number();
    let radix = match arg(args, 0) {
        Value::Undefined => 10,
        value => value.to_integer() as u32,
    };
    if !(2..=36).contains(&radix) {
        return Err(Throw::range_error("radix must be an integer between 2 and 36"));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::from(number_to_string(n)));
    }

    let mut magnitude = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
        if magnitude == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::from(digits.iter().rev().collect::<String>()))
}

/// Number.prototype.toFixed(digits)
fn to_fixed(this: &Value, args: &[Value]) -> Result<Value, Throw> {
    let digits = arg(args, 0).to_integer();
    if !(0.0..=100.0).contains(&digits) {
        return Err(Throw::range_error("precision is out of range"));
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::from(number_to_string(n)));
    }
    Ok(Value::from(format!("{n:.*}", digits as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_radix() {
        let n = Value::Number(255.0);
        assert_eq!(to_string(&n, &[Value::Number(16.0)]).unwrap(), Value::from("ff"));
        assert_eq!(to_string(&Value::Number(-5.0), &[Value::Number(2.0)]).unwrap(), Value::from("-101"));
        assert!(to_string(&n, &[Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(&Value::Number(1.005), &[Value::Number(1.0)]).unwrap(), Value::from("1.0"));
        assert_eq!(to_fixed(&Value::Number(2.0), &[Value::Number(2.0)]).unwrap(), Value::from("2.00"));
    }
}
