// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # sable-script
//!
//! The script engine behind sable's module sandboxes.
//!
//! ## Overview
//!
//! This crate provides a small, principal-aware execution environment:
//! - Lexer and recursive descent parser for a CommonJS-friendly dialect
//! - Tree-walking interpreter with closures, exceptions and `new`
//! - Built-in objects (`Object`, `Array`, `JSON`, `Math`, the error family)
//! - Sandboxes whose privileged capabilities are guarded by principal
//!
//! ## Quick Start
//!
//! ```rust
//! use sable_script::sandbox::{ContextOptions, DefaultSandboxFactory, SandboxFactory};
//! use sable_script::Value;
//!
//! let factory = DefaultSandboxFactory::default();
//! let context = factory.create_context(ContextOptions::default());
//! let result = context.evaluate("var xs = [1, 2]; xs.push(3); xs.join('+')", None).unwrap();
//! assert_eq!(result, Value::from("1+2+3"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod sandbox;

// Re-exports for convenience
pub use error::{ErrorKind, HostPayload, Result, ScriptError};
pub use interpreter::{call_function, construct};
pub use runtime::{ObjectRef, Throw, Value, native_function};
pub use sandbox::{ContextOptions, DefaultSandboxFactory, ExecutionContext, Principal, SandboxFactory};
