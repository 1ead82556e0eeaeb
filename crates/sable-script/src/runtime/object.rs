// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Heap objects: plain objects, arrays, functions and errors.

use super::function::Function;
use super::throw::Throw;
use super::value::Value;
use crate::error::{ErrorKind, HostPayload};
use rustc_hash::FxHashMap;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Largest length an array may report.
pub const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;

/// Largest number of elements an array stores densely. Indices past it are
/// kept as ordinary properties and lengths past it are refused.
pub const MAX_DENSE_LENGTH: usize = 1 << 20;

/// Converts a requested array length, refusing what cannot be stored.
pub fn array_length(value: &Value) -> Result<usize, Throw> {
    let len = value.to_number();
    if !(0.0..=MAX_ARRAY_LENGTH).contains(&len) || len.fract() != 0.0 {
        return Err(Throw::range_error("Invalid array length"));
    }
    if len > MAX_DENSE_LENGTH as f64 {
        return Err(Throw::range_error(format!(
            "array length {len} exceeds the limit of {MAX_DENSE_LENGTH}"
        )));
    }
    Ok(len as usize)
}

/// What an object is, beyond its property bag.
pub enum ObjectKind {
    /// `{}`
    Ordinary,
    /// `[]`; elements live here rather than in the property bag
    Array(Vec<Value>),
    /// Anything callable
    Function(Function),
    /// An instance of one of the error constructors
    Error(ErrorKind),
}

/// An object's state.
pub struct Object {
    properties: FxHashMap<Rc<str>, Value>,
    order: Vec<Rc<str>>,
    /// Prototype used for inherited property lookups
    pub prototype: Option<ObjectRef>,
    /// Object class
    pub kind: ObjectKind,
    /// Embedder data carried along with the object (error objects only)
    pub payload: Option<HostPayload>,
}

/// A shared, mutable reference to an object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Allocates a new object of the given kind.
    pub fn new(kind: ObjectKind) -> Self {
        Self(Rc::new(RefCell::new(Object {
            properties: FxHashMap::default(),
            order: Vec::new(),
            prototype: None,
            kind,
            payload: None,
        })))
    }

    /// Allocates `{}`.
    pub fn ordinary() -> Self {
        Self::new(ObjectKind::Ordinary)
    }

    /// Allocates an array holding `elements`.
    pub fn array(elements: Vec<Value>) -> Self {
        Self::new(ObjectKind::Array(elements))
    }

    /// Allocates an error object with `name` and `message` set.
    pub fn error(kind: ErrorKind, message: &str) -> Self {
        let obj = Self::new(ObjectKind::Error(kind.clone()));
        obj.set("name", Value::from(kind.name()));
        obj.set("message", Value::from(message));
        obj
    }

    /// Wraps a function in an object.
    pub fn function(function: Function) -> Self {
        Self::new(ObjectKind::Function(function))
    }

    /// Returns true if both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for the lifetime of the object.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Borrows the object state.
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Mutably borrows the object state.
    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Returns true for functions.
    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    /// Returns true for arrays.
    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    /// The error class, for error objects.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.borrow().kind {
            ObjectKind::Error(kind) => Some(kind.clone()),
            _ => None,
        }
    }

    /// The callable behind a function object.
    pub fn as_function(&self) -> Option<Function> {
        match &self.borrow().kind {
            ObjectKind::Function(function) => Some(function.clone()),
            _ => None,
        }
    }

    /// A copy of the elements of an array.
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.borrow().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    /// Looks a property up on the object and its prototype chain.
    pub fn get(&self, key: &str) -> Value {
        if let Some(value) = self.get_own(key) {
            return value;
        }
        let prototype = self.borrow().prototype.clone();
        match prototype {
            Some(proto) => proto.get(key),
            None => Value::Undefined,
        }
    }

    /// Looks up an own property.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        let object = self.borrow();
        if let ObjectKind::Array(elements) = &object.kind {
            if key == "length" {
                return Some(Value::Number(elements.len() as f64));
            }
            if let Some(value) = array_index(key).and_then(|index| elements.get(index)) {
                return Some(value.clone());
            }
        }
        object.properties.get(key).cloned()
    }

    /// Sets an own property. Invalid array lengths are ignored; script
    /// writes go through [`ObjectRef::try_set`].
    pub fn set(&self, key: &str, value: Value) {
        if let Err(thrown) = self.try_set(key, value) {
            tracing::debug!(key, "dropped array write: {}", thrown.value.to_js_string());
        }
    }

    /// Sets an own property, throwing a RangeError for a bad array length.
    pub fn try_set(&self, key: &str, value: Value) -> Result<(), Throw> {
        let mut guard = self.borrow_mut();
        let object = &mut *guard;
        if let ObjectKind::Array(elements) = &mut object.kind {
            if key == "length" {
                let len = array_length(&value)?;
                elements.resize(len, Value::Undefined);
                let order = &mut object.order;
                let properties = &mut object.properties;
                order.retain(|k| match array_index(k) {
                    Some(index) if index >= len => {
                        properties.remove(k);
                        false
                    }
                    _ => true,
                });
                return Ok(());
            }
            if let Some(index) = array_index(key).filter(|&index| index < MAX_DENSE_LENGTH) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return Ok(());
            }
        }
        match object.properties.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                let key: Rc<str> = Rc::from(key);
                object.order.push(key.clone());
                object.properties.insert(key, value);
            }
        }
        Ok(())
    }

    /// Returns true if the object has the property itself.
    pub fn has_own(&self, key: &str) -> bool {
        let object = self.borrow();
        if let ObjectKind::Array(elements) = &object.kind {
            if key == "length" {
                return true;
            }
            if array_index(key).is_some_and(|index| index < elements.len()) {
                return true;
            }
        }
        object.properties.contains_key(key)
    }

    /// Returns true if the object or its prototype chain has the property.
    pub fn has_property(&self, key: &str) -> bool {
        if self.has_own(key) {
            return true;
        }
        let prototype = self.borrow().prototype.clone();
        prototype.is_some_and(|proto| proto.has_property(key))
    }

    /// Removes an own property. Array elements become holes (`undefined`).
    pub fn delete(&self, key: &str) -> bool {
        let mut object = self.borrow_mut();
        if let ObjectKind::Array(elements) = &mut object.kind {
            if let Some(slot) = array_index(key).and_then(|index| elements.get_mut(index)) {
                *slot = Value::Undefined;
                return true;
            }
        }
        if object.properties.remove(key).is_some() {
            object.order.retain(|k| &**k != key);
        }
        true
    }

    /// Enumerable own keys in insertion order (array indices first).
    pub fn keys(&self) -> Vec<Rc<str>> {
        let object = self.borrow();
        let mut keys: Vec<Rc<str>> = match &object.kind {
            ObjectKind::Array(elements) => (0..elements.len())
                .map(|i| Rc::from(i.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        keys.extend(object.order.iter().cloned());
        keys
    }

    /// Attaches an embedder payload.
    pub fn set_payload(&self, payload: HostPayload) {
        self.borrow_mut().payload = Some(payload);
    }

    /// The embedder payload, if any.
    pub fn payload(&self) -> Option<HostPayload> {
        self.borrow().payload.clone()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectRef({:#x})", self.id())
    }
}

/// Parses a canonical array index ("0", "17"; not "01" or "-1").
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_order_is_insertion_order() {
        let obj = ObjectRef::ordinary();
        obj.set("b", Value::Number(1.0));
        obj.set("a", Value::Number(2.0));
        obj.set("b", Value::Number(3.0));
        let keys: Vec<String> = obj.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(obj.get("b"), Value::Number(3.0));
    }

    #[test]
    fn test_array_length_and_indices() {
        let array = ObjectRef::array(vec![Value::Number(1.0)]);
        array.set("3", Value::Number(4.0));
        assert_eq!(array.get("length"), Value::Number(4.0));
        assert!(array.get("1").is_undefined());
        array.set("length", Value::Number(1.0));
        assert_eq!(array.array_elements().unwrap().len(), 1);
        assert!(!array.has_own("01"));
    }

    #[test]
    fn test_array_lengths_are_bounded() {
        let array = ObjectRef::array(Vec::new());
        assert!(array.try_set("length", Value::Number(1e300)).is_err());
        assert!(array.try_set("length", Value::Number(-1.0)).is_err());
        assert!(array.try_set("length", Value::Number(1.5)).is_err());
        assert!(array.try_set("length", Value::Number(MAX_DENSE_LENGTH as f64 + 1.0)).is_err());
        assert_eq!(array.get("length"), Value::Number(0.0));

        array.set("4294967294", Value::Number(1.0));
        assert_eq!(array.get("length"), Value::Number(0.0));
        assert_eq!(array.get("4294967294"), Value::Number(1.0));
        assert!(array.has_own("4294967294"));
        array.set("length", Value::Number(2.0));
        assert!(!array.has_own("4294967294"));
    }

    #[test]
    fn test_prototype_lookup() {
        let proto = ObjectRef::ordinary();
        proto.set("greet", Value::from("hi"));
        let obj = ObjectRef::ordinary();
        obj.borrow_mut().prototype = Some(proto);
        assert_eq!(obj.get("greet"), Value::from("hi"));
        assert!(obj.has_property("greet"));
        assert!(!obj.has_own("greet"));
    }

    #[test]
    fn test_delete() {
        let obj = ObjectRef::ordinary();
        obj.set("x", Value::Null);
        assert!(obj.delete("x"));
        assert!(!obj.has_own("x"));
        assert!(obj.keys().is_empty());
    }
}
