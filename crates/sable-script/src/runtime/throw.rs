// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Exceptions in flight.

use super::object::ObjectRef;
use super::value::Value;
use crate::error::{ErrorKind, HostPayload};
use std::rc::Rc;

/// Where a non-error value was thrown from. Error objects carry their own
/// location in `fileName`/`lineNumber`/`stack`.
#[derive(Debug, Clone)]
pub struct Location {
    /// File name
    pub filename: Rc<str>,
    /// 1-based line
    pub line: u32,
    /// Rendered stack at the throw site
    pub stack: String,
}

/// A thrown value unwinding through the interpreter.
#[derive(Debug, Clone)]
pub struct Throw {
    /// The thrown value
    pub value: Value,
    /// Throw site for values that are not error objects
    pub location: Option<Location>,
}

impl Throw {
    /// Throws an arbitrary value.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            location: None,
        }
    }

    /// Throws a fresh error object of the given class.
    pub fn error(kind: ErrorKind, message: impl AsRef<str>) -> Self {
        Self::new(Value::Object(ObjectRef::error(kind, message.as_ref())))
    }

    /// Throws a fresh error object carrying an embedder payload.
    pub fn with_payload(kind: ErrorKind, message: impl AsRef<str>, payload: HostPayload) -> Self {
        let obj = ObjectRef::error(kind, message.as_ref());
        obj.set_payload(payload);
        Self::new(Value::Object(obj))
    }

    /// Create a new TypeError
    pub fn type_error(message: impl AsRef<str>) -> Self {
        Self::error(ErrorKind::Type, message)
    }

    /// Create a new RangeError
    pub fn range_error(message: impl AsRef<str>) -> Self {
        Self::error(ErrorKind::Range, message)
    }

    /// Create a new ReferenceError
    pub fn reference_error(message: impl AsRef<str>) -> Self {
        Self::error(ErrorKind::Reference, message)
    }
}
