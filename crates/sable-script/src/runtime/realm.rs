// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-context state shared by every closure created in a context, and the
//! call stack shared by every context created by one factory.

use super::environment::Environment;
use super::object::ObjectRef;
use super::throw::{Location, Throw};
use super::value::Value;
use crate::sandbox::Principal;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::rc::Rc;

/// Deepest call nesting before `too much recursion` is thrown.
pub const MAX_CALL_DEPTH: usize = 200;

/// The state of one execution context.
pub struct Realm {
    /// The context's principal; fixed at creation
    pub principal: Principal,
    /// Default file name for code evaluated in the context
    pub filename: Rc<str>,
    /// Outermost scope
    pub global: Rc<Environment>,
    /// Object backing the outermost scope (`this` at top level)
    pub global_object: ObjectRef,
    /// Capability names that are off limits to this context
    pub guarded: FxHashSet<Rc<str>>,
    /// Call stack, shared across contexts so traces span module boundaries
    pub call_stack: Rc<CallStack>,
}

impl Realm {
    /// Returns true if `name` is a capability this context may not touch.
    pub fn is_guarded(&self, name: &str) -> bool {
        self.guarded.contains(name)
    }
}

#[derive(Debug, Clone)]
struct Frame {
    function: Rc<str>,
    filename: Rc<str>,
    line: u32,
}

/// The stack of active script frames.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: RefCell<Vec<Frame>>,
}

impl CallStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a frame.
    pub fn push(&self, function: Rc<str>, filename: Rc<str>, line: u32) -> Result<(), Throw> {
        let mut frames = self.frames.borrow_mut();
        if frames.len() >= MAX_CALL_DEPTH {
            return Err(Throw::error(crate::ErrorKind::Range, "too much recursion"));
        }
        frames.push(Frame {
            function,
            filename,
            line,
        });
        Ok(())
    }

    /// Leaves the innermost frame.
    pub fn pop(&self) {
        self.frames.borrow_mut().pop();
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Records the line the innermost frame is executing.
    pub fn set_line(&self, line: u32) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.line = line;
        }
    }

    /// File and line of the innermost frame.
    pub fn location(&self) -> Option<(Rc<str>, u32)> {
        self.frames
            .borrow()
            .last()
            .map(|frame| (frame.filename.clone(), frame.line))
    }

    /// Renders the stack innermost first, one `name()@file:line` per line.
    pub fn render(&self) -> String {
        self.frames
            .borrow()
            .iter()
            .rev()
            .map(|frame| format!("{}()@{}:{}\n", frame.function, frame.filename, frame.line))
            .collect()
    }

    /// Fills in `fileName`, `lineNumber` and `stack` on an error object that
    /// does not have them yet.
    pub fn stamp(&self, value: &Value) {
        let Value::Object(obj) = value else {
            return;
        };
        if obj.error_kind().is_none() || obj.has_own("fileName") {
            return;
        }
        if let Some((filename, line)) = self.location() {
            obj.set("fileName", Value::String(filename));
            obj.set("lineNumber", Value::Number(f64::from(line)));
            obj.set("stack", Value::from(self.render()));
        }
    }

    /// Records the throw site of an exception.
    pub fn locate(&self, throw: &mut Throw) {
        self.stamp(&throw.value);
        if throw.location.is_none() {
            if let Some((filename, line)) = self.location() {
                throw.location = Some(Location {
                    filename,
                    line,
                    stack: self.render(),
                });
            }
        }
    }
}
