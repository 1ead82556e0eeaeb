// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types surfaced by script evaluation.

use crate::sandbox::Principal;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for script operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// The class of a script error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A plain `Error`
    Error,
    /// Source text could not be parsed
    Syntax,
    /// An operation was applied to a value of the wrong type
    Type,
    /// An unbound name was read
    Reference,
    /// A numeric argument was out of range
    Range,
    /// A guarded capability was touched from a context lacking the privilege
    PermissionDenied {
        /// The capability name
        capability: String,
        /// The principal of the offending context
        principal: Principal,
    },
    /// A non-error value was thrown (`throw "oops"`)
    Thrown,
}

impl ErrorKind {
    /// The constructor name visible to scripts.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Range => "RangeError",
            ErrorKind::PermissionDenied { .. } => "PermissionDeniedError",
            ErrorKind::Thrown => "uncaught exception",
        }
    }

    /// Maps a constructor name back to a kind. Unknown names are plain errors.
    pub fn from_name(name: &str) -> ErrorKind {
        match name {
            "SyntaxError" => ErrorKind::Syntax,
            "TypeError" => ErrorKind::Type,
            "ReferenceError" => ErrorKind::Reference,
            "RangeError" => ErrorKind::Range,
            _ => ErrorKind::Error,
        }
    }
}

/// An opaque value an embedder attaches to an error object so it survives a
/// trip through script code (`catch (e) { throw e; }` keeps it).
#[derive(Clone)]
pub struct HostPayload(Arc<dyn Any + Send + Sync>);

impl HostPayload {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the payload as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostPayload(..)")
    }
}

/// An exception that escaped a script, annotated with where it was raised.
#[derive(Debug, Clone, Error)]
#[error("{filename}:{line}: {}: {message}", .kind.name())]
pub struct ScriptError {
    /// Error class
    pub kind: ErrorKind,
    /// Error message (for thrown non-errors, the value's string form)
    pub message: String,
    /// File the error was raised in
    pub filename: String,
    /// 1-based line the error was raised on
    pub line: u32,
    /// Stack trace, innermost frame first
    pub stack: String,
    /// JSON rendering of the thrown value (`null` when not representable)
    pub value: serde_json::Value,
    payload: Option<HostPayload>,
}

impl ScriptError {
    /// Creates an error with no stack and no thrown value.
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        filename: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            filename: filename.into(),
            line,
            stack: String::new(),
            value: serde_json::Value::Null,
            payload: None,
        }
    }

    /// Create a new SyntaxError
    pub fn syntax(message: impl Into<String>, filename: impl Into<String>, line: u32) -> Self {
        Self::new(ErrorKind::Syntax, message, filename, line)
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Attaches the JSON rendering of the thrown value.
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    /// Attaches an embedder payload.
    pub fn with_payload(mut self, payload: Option<HostPayload>) -> Self {
        self.payload = payload;
        self
    }

    /// The embedder payload carried by the thrown error object, if any.
    pub fn payload(&self) -> Option<&HostPayload> {
        self.payload.as_ref()
    }

    /// Returns true for errors raised by a guarded capability.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.kind, ErrorKind::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = ScriptError::new(ErrorKind::Type, "x is not a function", "main.js", 3);
        assert_eq!(err.to_string(), "main.js:3: TypeError: x is not a function");
    }

    #[test]
    fn test_payload_downcast() {
        let err = ScriptError::syntax("bad", "<string>", 1)
            .with_payload(Some(HostPayload::new(String::from("inner"))));
        let payload = err.payload().unwrap();
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "inner");
        assert!(payload.downcast_ref::<u32>().is_none());
    }
}
