// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Math built-in object (ES3 Section 15.8).

use super::define;
use crate::runtime::{ObjectRef, Value, arg};
use std::f64::consts;

pub(super) fn install(global: &ObjectRef) {
    let math = ObjectRef::ordinary();
    math.set("PI", Value::Number(consts::PI));
    math.set("E", Value::Number(consts::E));
    math.set("LN2", Value::Number(consts::LN_2));
    math.set("LN10", Value::Number(consts::LN_10));
    math.set("SQRT2", Value::Number(consts::SQRT_2));

    let unary: [(&str, fn(f64) -> f64); 12] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", round),
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("atan", f64::atan),
        ("trunc", f64::trunc),
    ];
    for (name, f) in unary {
        define(&math, name, move |_, args| {
            Ok(Value::Number(f(arg(args, 0).to_number())))
        });
    }

    define(&math, "pow", |_, args| {
        Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
    });
    define(&math, "atan2", |_, args| {
        Ok(Value::Number(arg(args, 0).to_number().atan2(arg(args, 1).to_number())))
    });
    define(&math, "max", |_, args| {
        Ok(Value::Number(fold(args, f64::NEG_INFINITY, f64::max)))
    });
    define(&math, "min", |_, args| {
        Ok(Value::Number(fold(args, f64::INFINITY, f64::min)))
    });

    global.set("Math", Value::Object(math));
}

/// Rounds half up, as `Math.round(-2.5) === -2`.
fn round(n: f64) -> f64 {
    (n + 0.5).floor()
}

/// Folds the numeric arguments; any NaN argument makes the result NaN.
fn fold(args: &[Value], initial: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut result = initial;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        result = f(result, n);
    }
    result
}
