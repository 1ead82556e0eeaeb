// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error constructors (ES3 Section 15.11).

use super::{define, method};
use crate::error::ErrorKind;
use crate::runtime::{ObjectRef, Value};

const CONSTRUCTORS: [ErrorKind; 5] = [
    ErrorKind::Error,
    ErrorKind::Type,
    ErrorKind::Range,
    ErrorKind::Reference,
    ErrorKind::Syntax,
];

pub(super) fn install(global: &ObjectRef) {
    for kind in CONSTRUCTORS {
        let name = kind.name();
        define(global, name, move |_, args| {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(value) => value.to_js_string(),
            };
            Ok(Value::Object(ObjectRef::error(kind.clone(), &message)))
        });
    }
}

pub(super) fn member(key: &str) -> Option<Value> {
    match key {
        "toString" => Some(method("toString", |this, _| Ok(Value::from(this.to_js_string())))),
        _ => None,
    }
}
