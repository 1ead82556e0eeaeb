// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `require()` function handed to module code

use super::loader::LoaderInner;
use crate::error::LoaderError;
use sable_script::runtime::arg;
use sable_script::{Throw, Value, native_function};
use std::rc::{Rc, Weak};

/// Builds `require` (and `require.resolve`) for code running at `base`.
///
/// The functions hold the loader weakly: module contexts are owned by the
/// loader, so a strong handle would keep it alive forever.
pub(crate) fn make_require(loader: &Rc<LoaderInner>, base: Option<String>) -> Value {
    let weak = Rc::downgrade(loader);
    let require_base = base.clone();
    let require = native_function("require", move |_, args| {
        let loader = upgrade(&weak)?;
        let identifier = identifier_arg(args, "require")?;
        loader
            .require(require_base.as_deref(), &identifier)
            .map_err(LoaderError::into_throw)
    });

    let weak = Rc::downgrade(loader);
    let resolve = native_function("resolve", move |_, args| {
        let loader = upgrade(&weak)?;
        let identifier = identifier_arg(args, "require.resolve")?;
        match loader.fs().resolve_module(base.as_deref(), &identifier) {
            Ok(Some(path)) => Ok(Value::from(path)),
            Ok(None) => Err(LoaderError::module_not_found(identifier).into_throw()),
            Err(e) => Err(e.into_throw()),
        }
    });

    if let Some(obj) = require.as_object() {
        obj.set("resolve", resolve);
    }
    require
}

fn upgrade(weak: &Weak<LoaderInner>) -> Result<Rc<LoaderInner>, Throw> {
    weak.upgrade()
        .ok_or_else(|| Throw::error(sable_script::ErrorKind::Error, "module loader is gone"))
}

fn identifier_arg(args: &[Value], function: &str) -> Result<String, Throw> {
    match arg(args, 0) {
        Value::String(identifier) => Ok(identifier.to_string()),
        other => Err(Throw::type_error(format!(
            "{function}() expects a module name, got {}",
            other.type_of()
        ))),
    }
}
