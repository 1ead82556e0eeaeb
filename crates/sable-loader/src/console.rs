// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `console` global

use sable_script::interpreter::to_string;
use sable_script::{ObjectRef, Throw, Value, native_function};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::str::FromStr;

/// Console method, also used as the level of forwarded console events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// console.log
    Log,
    /// console.debug
    Debug,
    /// console.info
    Info,
    /// console.warn
    Warn,
    /// console.error
    Error,
    /// console.exception
    Exception,
}

impl ConsoleLevel {
    /// Every level, in method order.
    pub const ALL: [ConsoleLevel; 6] = [
        ConsoleLevel::Log,
        ConsoleLevel::Debug,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Exception,
    ];

    /// Method name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Exception => "exception",
        }
    }

    /// Logs `message` through `tracing` at the matching level.
    pub fn trace(self, message: &str) {
        match self {
            ConsoleLevel::Debug => tracing::debug!(target: "sable::console", "{message}"),
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "sable::console", "{message}")
            }
            ConsoleLevel::Warn => tracing::warn!(target: "sable::console", "{message}"),
            ConsoleLevel::Error | ConsoleLevel::Exception => {
                tracing::error!(target: "sable::console", "{message}")
            }
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsoleLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown console level '{s}'"))
    }
}

/// Receives formatted console calls.
pub type ConsoleSink = Rc<dyn Fn(ConsoleLevel, Vec<String>)>;

/// Creates a console object whose methods format their arguments and hand
/// them to `sink`.
pub fn create(sink: impl Fn(ConsoleLevel, Vec<String>) + 'static) -> Value {
    let sink: ConsoleSink = Rc::new(sink);
    let console = ObjectRef::ordinary();
    for level in ConsoleLevel::ALL {
        let sink = sink.clone();
        console.set(
            level.as_str(),
            native_function(level.as_str(), move |_, args| {
                sink(level, format_args(level, args)?);
                Ok(Value::Undefined)
            }),
        );
    }
    Value::Object(console)
}

/// A console printing `level: message` lines with [`print_line`].
pub fn plain_text() -> Value {
    create(|level, args| print_line(level, &args))
}

/// Prints one console call as `level: message`; log, debug and info go to
/// stdout and the rest to stderr.
pub fn print_line(level: ConsoleLevel, args: &[String]) {
    let prefix = match level {
        ConsoleLevel::Log => "info",
        other => other.as_str(),
    };
    let line = format!("{prefix}: {}", args.join(" "));
    let written = match level {
        ConsoleLevel::Log | ConsoleLevel::Debug | ConsoleLevel::Info => {
            writeln!(std::io::stdout(), "{line}")
        }
        _ => writeln!(std::io::stderr(), "{line}"),
    };
    if let Err(e) = written {
        tracing::debug!(error = %e, "console write failed");
    }
}

/// Formats console arguments. `console.exception(e)` renders the error's
/// message followed by its stack.
pub fn format_args(level: ConsoleLevel, args: &[Value]) -> Result<Vec<String>, Throw> {
    args.iter()
        .map(|arg| match (level, arg) {
            (ConsoleLevel::Exception, Value::Object(obj)) if obj.error_kind().is_some() => {
                let message = to_string(arg)?;
                match obj.get("stack") {
                    Value::String(stack) if !stack.is_empty() => Ok(format!("{message}\n{stack}")),
                    _ => Ok(message),
                }
            }
            _ => to_string(arg),
        })
        .collect()
}
