// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime data structures: values, objects, scopes, functions and the
//! per-context realm.

mod environment;
mod function;
pub mod json;
mod object;
mod realm;
mod throw;
mod value;

pub use environment::{Assignment, Environment};
pub use function::{Function, NativeFn, NativeFunction, ScriptFunction, arg, native_function};
pub use object::{MAX_ARRAY_LENGTH, MAX_DENSE_LENGTH, Object, ObjectKind, ObjectRef, array_length};
pub use realm::{CallStack, MAX_CALL_DEPTH, Realm};
pub use throw::{Location, Throw};
pub use value::{Value, number_to_string};
