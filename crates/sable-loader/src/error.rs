// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use sable_script::{ErrorKind, HostPayload, ObjectRef, Principal, ScriptError, Throw, Value};
use std::sync::Arc;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving, loading or bridging modules
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// No filesystem could resolve the identifier
    #[error("Module \"{0}\" not found")]
    ModuleNotFound(String),

    /// A guarded capability (or a module needing one) was requested from a
    /// context lacking the privilege
    #[error("permission denied to access '{capability}' from a {principal} context")]
    PermissionDenied {
        /// Capability or adapter name
        capability: String,
        /// Principal of the requesting context
        principal: Principal,
    },

    /// The manifest declares a different adapter than the one that resolves
    #[error("Adapter module URL is {} but expected {declared}", .actual.as_deref().unwrap_or("null"))]
    AdapterMismatch {
        /// Adapter path declared in the manifest
        declared: String,
        /// Adapter path that actually resolved
        actual: Option<String>,
    },

    /// The identifier cannot form a path segment
    #[error("malformed module identifier '{0}'")]
    MalformedIdentifier(String),

    /// Module code threw
    #[error("{0}")]
    Evaluation(#[from] ScriptError),

    /// The remote process failed, or reported an exception
    #[error("remote process error: {message}")]
    RemoteProcess {
        /// Error message
        message: String,
        /// File the error was raised in, if known
        filename: String,
        /// Line the error was raised on
        line: u32,
        /// Stack trace (host frames first for cross-process calls)
        stack: String,
    },

    /// The security policy refused to evaluate or import a module
    #[error("access denied to {action} module: {module}")]
    AccessDenied {
        /// `execute` or `import`
        action: String,
        /// The identifier passed to `require()`
        module: String,
    },

    /// A resolved module could not be read
    #[error("failed to fetch {path}: {source}")]
    Fetch {
        /// Canonical path of the module
        path: String,
        /// Underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(Arc<serde_json::Error>),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    Toml(Arc<toml::de::Error>),

    /// Invalid configuration
    #[error("{0}")]
    Config(String),
}

impl From<std::io::Error> for LoaderError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

impl From<toml::de::Error> for LoaderError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(Arc::new(e))
    }
}

impl LoaderError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// Create a remote process error with no location
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteProcess {
            message: message.into(),
            filename: String::new(),
            line: 0,
            stack: String::new(),
        }
    }

    /// Create a fetch error
    pub fn fetch(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Fetch {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Recovers the loader error behind an uncaught script exception.
    ///
    /// Errors raised by a nested `require()` travel through script code as
    /// error objects carrying the original [`LoaderError`]. Touching a
    /// guarded capability is a permission error; anything else is an
    /// evaluation error.
    pub fn from_script(err: ScriptError) -> Self {
        if let Some(inner) = err.payload().and_then(|p| p.downcast_ref::<LoaderError>()) {
            return inner.clone();
        }
        match err.kind {
            ErrorKind::PermissionDenied {
                capability,
                principal,
            } => Self::PermissionDenied {
                capability,
                principal,
            },
            _ => Self::Evaluation(err),
        }
    }

    /// Converts the error into an exception thrown into script code.
    pub fn into_throw(self) -> Throw {
        let kind = match &self {
            LoaderError::PermissionDenied {
                capability,
                principal,
            } => ErrorKind::PermissionDenied {
                capability: capability.clone(),
                principal: *principal,
            },
            LoaderError::Evaluation(err) => match err.kind {
                ErrorKind::Thrown => ErrorKind::Error,
                ref kind => kind.clone(),
            },
            _ => ErrorKind::Error,
        };
        let message = match &self {
            LoaderError::Evaluation(err) => err.message.clone(),
            other => other.to_string(),
        };

        let obj = ObjectRef::error(kind, &message);
        // Keep the location of the failing module, not the require() site.
        let location = match &self {
            LoaderError::Evaluation(err) => Some((err.filename.clone(), err.line, err.stack.clone())),
            LoaderError::RemoteProcess {
                filename,
                line,
                stack,
                ..
            } if !filename.is_empty() => Some((filename.clone(), *line, stack.clone())),
            _ => None,
        };
        if let Some((filename, line, stack)) = location {
            obj.set("fileName", Value::from(filename));
            obj.set("lineNumber", Value::Number(f64::from(line)));
            obj.set("stack", Value::from(stack));
        }
        obj.set_payload(HostPayload::new(self));
        Throw::new(Value::Object(obj))
    }
}
