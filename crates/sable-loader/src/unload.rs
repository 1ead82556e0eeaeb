// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Teardown callbacks run when a loader unloads.

use std::cell::RefCell;
use std::fmt;

type Callback = Box<dyn FnOnce(&str)>;

/// Callbacks run last-in-first-out with the unload reason.
#[derive(Default)]
pub struct UnloadRegistry {
    callbacks: RefCell<Vec<Callback>>,
}

impl UnloadRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback.
    pub fn when(&self, callback: impl FnOnce(&str) + 'static) {
        self.callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Runs every callback, newest first, and empties the registry.
    /// Callbacks registered while running are run too.
    pub fn run(&self, reason: &str) {
        tracing::debug!(%reason, pending = self.len(), "running unload callbacks");
        loop {
            let next = self.callbacks.borrow_mut().pop();
            match next {
                Some(callback) => callback(reason),
                None => break,
            }
        }
    }

    /// Number of pending callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.borrow().is_empty()
    }
}

impl fmt::Debug for UnloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnloadRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_lifo_order() {
        let registry = UnloadRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = log.clone();
            registry.when(move |reason| log.borrow_mut().push(format!("{name}:{reason}")));
        }
        assert_eq!(registry.len(), 3);

        registry.run("shutdown");
        assert_eq!(
            *log.borrow(),
            ["third:shutdown", "second:shutdown", "first:shutdown"]
        );
        assert!(registry.is_empty());

        registry.run("again");
        assert_eq!(log.borrow().len(), 3);
    }
}
