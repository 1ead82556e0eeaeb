// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parser for the module dialect.
//!
//! A recursive descent parser producing the [`crate::ast`] tree. Semicolons
//! are inserted at line breaks the way browsers do for sloppy scripts.

#[allow(clippy::module_inception)]
mod parser;

pub use parser::{MAX_NESTING_DEPTH, Parser};

use crate::ast::Program;
use crate::error::ScriptError;

/// Parses `source`, attributing any syntax error to `filename`.
pub fn parse(source: &str, filename: &str) -> Result<Program, ScriptError> {
    Parser::with_filename(source, filename).parse_program()
}
