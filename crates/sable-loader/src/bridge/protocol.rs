// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bridge wire messages.
//!
//! Every message is an [`Envelope`]. Requests carry a correlation id that
//! the matching reply echoes; events are one-way.
//!
//! ```json
//! {"kind":"request","id":1,"request":{"type":"require","basePath":null,"identifier":"panel"}}
//! {"kind":"reply","id":1,"reply":{"code":"ok","script":{"filename":"…","contents":"…"},"needsMessaging":true}}
//! {"kind":"event","event":{"type":"console","level":"log","args":["hi"]}}
//! ```

use crate::console::ConsoleLevel;
use crate::error::LoaderError;
use crate::fs::SourceFile;
use serde::{Deserialize, Serialize};

/// Correlation id of a request.
pub type RequestId = u64;

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Envelope {
    /// Expects a reply with the same id
    Request {
        /// Correlation id
        id: RequestId,
        /// Payload
        request: Request,
    },
    /// Answers a request
    Reply {
        /// Id of the request being answered
        id: RequestId,
        /// Payload
        reply: Reply,
    },
    /// One-way notification
    Event {
        /// Payload
        event: Event,
    },
}

/// Synchronous requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Remote to host: resolve and vet a module
    Require {
        /// Canonical path of the requiring module
        #[serde(rename = "basePath")]
        base_path: Option<String>,
        /// The identifier passed to `require()`
        identifier: String,
    },
    /// Remote to host: invoke a handler registered by an adapter
    Call {
        /// Handler name
        name: String,
        /// JSON arguments
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
}

/// Replies; the request kind decides which shape is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Answer to [`Request::Require`]
    Require(RequireResponse),
    /// Answer to [`Request::Call`]
    Call(CallOutcome),
}

/// Outcome of a require request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum RequireResponse {
    /// Nothing resolved
    NotFound,
    /// The module needs privileges and has no adapter
    AccessDenied,
    /// Adapter mismatch or registration failure; details are in the host log
    Error,
    /// Evaluate `script` in the remote process
    Ok {
        /// The module, or its adapter
        script: SourceFile,
        /// Whether to expose the `chrome` messaging handle
        #[serde(rename = "needsMessaging")]
        needs_messaging: bool,
    },
}

/// Result of a call handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallOutcome {
    /// The handler returned this value
    ReturnValue(serde_json::Value),
    /// The handler threw
    Exception(ExceptionInfo),
}

/// A serialised exception.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    /// Error message
    pub message: String,
    /// File the exception was raised in
    #[serde(default)]
    pub file_name: String,
    /// Line the exception was raised on
    #[serde(default)]
    pub line_number: u32,
    /// Stack trace, innermost first
    #[serde(default)]
    pub stack: String,
}

impl ExceptionInfo {
    /// Serialises a loader error.
    pub fn from_error(err: &LoaderError) -> Self {
        match err {
            LoaderError::Evaluation(script) => Self {
                message: script.message.clone(),
                file_name: script.filename.clone(),
                line_number: script.line,
                stack: script.stack.clone(),
            },
            LoaderError::RemoteProcess {
                message,
                filename,
                line,
                stack,
            } => Self {
                message: message.clone(),
                file_name: filename.clone(),
                line_number: *line,
                stack: stack.clone(),
            },
            other => Self {
                message: other.to_string(),
                ..Self::default()
            },
        }
    }

    /// Converts into a remote process error.
    pub fn into_error(self) -> LoaderError {
        LoaderError::RemoteProcess {
            message: self.message,
            filename: self.file_name,
            line: self.line_number,
            stack: self.stack,
        }
    }
}

/// One-way notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Host to remote: require `main` and call its `main(options, callbacks)`
    StartMain {
        /// Module identifier
        main: String,
        /// First argument to `main`
        #[serde(default)]
        options: serde_json::Value,
    },
    /// Remote to host: a `console.*` call
    Console {
        /// Console method
        level: ConsoleLevel,
        /// Formatted arguments
        args: Vec<String>,
    },
    /// Remote to host: an uncaught exception
    Exception {
        /// Details
        exception: ExceptionInfo,
    },
    /// Remote to host: `callbacks.quit(status)`
    Quit {
        /// Status passed to quit; `OK` by default
        status: String,
    },
    /// Either direction: a named message for `on()` listeners
    Message {
        /// Message name
        name: String,
        /// JSON arguments
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_wire_format() {
        let request = Envelope::Request {
            id: 7,
            request: Request::Require {
                base_path: None,
                identifier: "panel".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "kind": "request",
                "id": 7,
                "request": { "type": "require", "basePath": null, "identifier": "panel" }
            })
        );

        let ok = RequireResponse::Ok {
            script: SourceFile::new("file:///r/panel-e10s-adapter.js", "exports.x = 1;"),
            needs_messaging: true,
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({
                "code": "ok",
                "script": { "filename": "file:///r/panel-e10s-adapter.js", "contents": "exports.x = 1;" },
                "needsMessaging": true
            })
        );
        assert_eq!(
            serde_json::to_value(RequireResponse::AccessDenied).unwrap(),
            json!({ "code": "access-denied" })
        );
    }

    #[test]
    fn test_untagged_replies_decode_by_shape() {
        let reply: Reply = serde_json::from_value(json!({ "code": "not-found" })).unwrap();
        assert_eq!(reply, Reply::Require(RequireResponse::NotFound));

        let reply: Reply = serde_json::from_value(json!({ "returnValue": [1, 2] })).unwrap();
        assert_eq!(reply, Reply::Call(CallOutcome::ReturnValue(json!([1, 2]))));

        let reply: Reply = serde_json::from_value(json!({
            "exception": { "message": "boom", "fileName": "a.js", "lineNumber": 3, "stack": "f()@a.js:3\n" }
        }))
        .unwrap();
        assert!(matches!(reply, Reply::Call(CallOutcome::Exception(ref e)) if e.line_number == 3));
    }

    #[test]
    fn test_events() {
        let event: Event = serde_json::from_value(json!({ "type": "quit", "status": "OK" })).unwrap();
        assert_eq!(event, Event::Quit { status: "OK".into() });

        let event: Event = serde_json::from_value(json!({ "type": "startMain", "main": "main" })).unwrap();
        assert_eq!(
            event,
            Event::StartMain {
                main: "main".into(),
                options: serde_json::Value::Null
            }
        );
    }
}
