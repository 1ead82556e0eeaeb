// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression evaluation.

use super::{Exec, Interpreter, to_string};
use crate::ast::{
    AssignmentOperator, BinaryOperator, Expression, LogicalOperator, MemberProperty,
    UnaryOperator, UpdateOperator,
};
use crate::builtins;
use crate::error::ErrorKind;
use crate::runtime::{Assignment, Environment, Function, ObjectRef, Value};
use std::rc::Rc;

impl Interpreter {
    /// Evaluates an expression.
    pub(crate) fn evaluate(&self, expr: &Expression, env: &Rc<Environment>) -> Exec<Value> {
        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::Identifier(name) => self.lookup_identifier(name, env),
            Expression::This => Ok(env.this_value()),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element, env)?);
                }
                Ok(Value::Object(ObjectRef::array(values)))
            }
            Expression::Object(properties) => {
                let obj = ObjectRef::ordinary();
                for (key, value) in properties {
                    obj.set(key, self.evaluate(value, env)?);
                }
                Ok(Value::Object(obj))
            }
            Expression::Function(literal) => Ok(self.make_closure(literal, env)),
            Expression::Unary { operator, argument } => self.evaluate_unary(*operator, argument, env),
            Expression::Update {
                operator,
                prefix,
                argument,
            } => {
                let old = self.evaluate(argument, env)?.to_number();
                let new = match operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.assign_to(argument, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                self.binary(*operator, &left, &right)
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                match (operator, left.to_boolean()) {
                    (LogicalOperator::And, false) | (LogicalOperator::Or, true) => Ok(left),
                    _ => self.evaluate(right, env),
                }
            }
            Expression::Assignment {
                operator,
                target,
                value,
            } => self.evaluate_assignment(*operator, target, value, env),
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, env)?.to_boolean() {
                    self.evaluate(consequent, env)
                } else {
                    self.evaluate(alternate, env)
                }
            }
            Expression::Member { object, property } => {
                let base = self.evaluate(object, env)?;
                let key = self.property_key(property, env)?;
                self.get_property(&base, &key, object)
            }
            Expression::Call { callee, arguments } => self.evaluate_call(callee, arguments, env),
            Expression::New { callee, arguments } => {
                let constructor = self.evaluate(callee, env)?;
                let args = self.evaluate_arguments(arguments, env)?;
                if !constructor.is_callable() {
                    return Err(self.error(
                        ErrorKind::Type,
                        format!("{} is not a constructor", callee.describe()),
                    ));
                }
                match super::construct(&constructor, &args) {
                    Ok(value) => {
                        self.realm.call_stack.stamp(&value);
                        Ok(value)
                    }
                    Err(mut thrown) => {
                        self.realm.call_stack.locate(&mut thrown);
                        Err(thrown)
                    }
                }
            }
            Expression::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.evaluate(expr, env)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup_identifier(&self, name: &str, env: &Rc<Environment>) -> Exec<Value> {
        match env.lookup(name) {
            Some(value) => Ok(value),
            None if self.realm.is_guarded(name) => Err(self.permission_denied(name)),
            None => Err(self.error(ErrorKind::Reference, format!("{name} is not defined"))),
        }
    }

    /// Assigns to a name, creating a global for unbound names.
    pub(crate) fn assign_identifier(&self, name: &str, value: Value, env: &Rc<Environment>) -> Exec<()> {
        match env.assign(name, value.clone()) {
            Assignment::Assigned => Ok(()),
            Assignment::Immutable => Err(self.error(
                ErrorKind::Type,
                format!("invalid assignment to const '{name}'"),
            )),
            Assignment::Unbound if self.realm.is_guarded(name) => Err(self.permission_denied(name)),
            Assignment::Unbound => {
                self.realm.global_object.set(name, value);
                Ok(())
            }
        }
    }

    fn assign_to(&self, target: &Expression, value: Value, env: &Rc<Environment>) -> Exec<()> {
        match target {
            Expression::Identifier(name) => self.assign_identifier(name, value, env),
            Expression::Member { object, property } => {
                let base = self.evaluate(object, env)?;
                let key = self.property_key(property, env)?;
                self.set_property(&base, &key, value, object)
            }
            _ => Err(self.error(ErrorKind::Reference, "invalid assignment target")),
        }
    }

    fn evaluate_assignment(
        &self,
        operator: AssignmentOperator,
        target: &Expression,
        value: &Expression,
        env: &Rc<Environment>,
    ) -> Exec<Value> {
        match target {
            Expression::Identifier(name) => {
                let value = match operator.binary() {
                    Some(op) => {
                        let current = self.lookup_identifier(name, env)?;
                        let rhs = self.evaluate(value, env)?;
                        self.binary(op, &current, &rhs)?
                    }
                    None => self.evaluate(value, env)?,
                };
                self.assign_identifier(name, value.clone(), env)?;
                Ok(value)
            }
            Expression::Member { object, property } => {
                let base = self.evaluate(object, env)?;
                let key = self.property_key(property, env)?;
                let value = match operator.binary() {
                    Some(op) => {
                        let current = self.get_property(&base, &key, object)?;
                        let rhs = self.evaluate(value, env)?;
                        self.binary(op, &current, &rhs)?
                    }
                    None => self.evaluate(value, env)?,
                };
                self.set_property(&base, &key, value.clone(), object)?;
                Ok(value)
            }
            _ => Err(self.error(ErrorKind::Reference, "invalid assignment target")),
        }
    }

    fn property_key(&self, property: &MemberProperty, env: &Rc<Environment>) -> Exec<Rc<str>> {
        match property {
            MemberProperty::Named(name) => Ok(Rc::from(name.as_str())),
            MemberProperty::Computed(expr) => {
                let key = self.evaluate(expr, env)?;
                match key {
                    Value::String(s) => Ok(s),
                    other => Ok(Rc::from(to_string(&other)?)),
                }
            }
        }
    }

    /// Reads `base[key]`. `source` names the base in error messages.
    fn get_property(&self, base: &Value, key: &str, source: &Expression) -> Exec<Value> {
        match base {
            Value::Undefined | Value::Null => Err(self.error(
                ErrorKind::Type,
                format!("{} is {}", source.describe(), base.to_js_string()),
            )),
            Value::Object(obj) => {
                if obj.has_property(key) {
                    return Ok(obj.get(key));
                }
                if obj.ptr_eq(&self.realm.global_object) && self.realm.is_guarded(key) {
                    return Err(self.permission_denied(key));
                }
                Ok(builtins::object_member(obj, key).unwrap_or_default())
            }
            Value::String(s) => Ok(builtins::string_member(s, key).unwrap_or_default()),
            Value::Number(_) => Ok(builtins::number_member(key).unwrap_or_default()),
            Value::Boolean(_) => Ok(builtins::boolean_member(key).unwrap_or_default()),
        }
    }

    fn set_property(&self, base: &Value, key: &str, value: Value, source: &Expression) -> Exec<()> {
        match base {
            Value::Undefined | Value::Null => Err(self.error(
                ErrorKind::Type,
                format!("{} is {}", source.describe(), base.to_js_string()),
            )),
            Value::Object(obj) => obj.try_set(key, value).map_err(|mut thrown| {
                self.realm.call_stack.locate(&mut thrown);
                thrown
            }),
            // Writes to primitives are dropped.
            _ => Ok(()),
        }
    }

    fn evaluate_arguments(&self, arguments: &[Expression], env: &Rc<Environment>) -> Exec<Vec<Value>> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument, env)?);
        }
        Ok(args)
    }

    fn evaluate_call(&self, callee: &Expression, arguments: &[Expression], env: &Rc<Environment>) -> Exec<Value> {
        let (function, this) = match callee {
            Expression::Member { object, property } => {
                let base = self.evaluate(object, env)?;
                let key = self.property_key(property, env)?;
                let function = self.get_property(&base, &key, object)?;
                (function, base)
            }
            other => (self.evaluate(other, env)?, Value::Undefined),
        };
        let args = self.evaluate_arguments(arguments, env)?;

        let Some(function) = function.as_object().and_then(ObjectRef::as_function) else {
            return Err(self.error(
                ErrorKind::Type,
                format!("{} is not a function", callee.describe()),
            ));
        };
        self.invoke(&function, this, &args)
    }

    fn evaluate_unary(&self, operator: UnaryOperator, argument: &Expression, env: &Rc<Environment>) -> Exec<Value> {
        match operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(name) = argument {
                    return match env.lookup(name) {
                        Some(value) => Ok(Value::from(value.type_of())),
                        None if self.realm.is_guarded(name) => Err(self.permission_denied(name)),
                        None => Ok(Value::from("undefined")),
                    };
                }
                Ok(Value::from(self.evaluate(argument, env)?.type_of()))
            }
            UnaryOperator::Delete => match argument {
                Expression::Member { object, property } => {
                    let base = self.evaluate(object, env)?;
                    let key = self.property_key(property, env)?;
                    match base {
                        Value::Object(obj) => Ok(Value::Boolean(obj.delete(&key))),
                        Value::Undefined | Value::Null => Err(self.error(
                            ErrorKind::Type,
                            format!("{} is {}", object.describe(), base.to_js_string()),
                        )),
                        _ => Ok(Value::Boolean(true)),
                    }
                }
                _ => Ok(Value::Boolean(false)),
            },
            UnaryOperator::Not => Ok(Value::Boolean(!self.evaluate(argument, env)?.to_boolean())),
            UnaryOperator::Minus => Ok(Value::Number(-self.evaluate(argument, env)?.to_number())),
            UnaryOperator::Plus => Ok(Value::Number(self.evaluate(argument, env)?.to_number())),
            UnaryOperator::Void => {
                self.evaluate(argument, env)?;
                Ok(Value::Undefined)
            }
        }
    }

    pub(crate) fn binary(&self, operator: BinaryOperator, left: &Value, right: &Value) -> Exec<Value> {
        let value = match operator {
            BinaryOperator::Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut joined = left.to_js_string();
                    joined.push_str(&right.to_js_string());
                    Value::from(joined)
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOperator::Sub => Value::Number(left.to_number() - right.to_number()),
            BinaryOperator::Mul => Value::Number(left.to_number() * right.to_number()),
            BinaryOperator::Div => Value::Number(left.to_number() / right.to_number()),
            BinaryOperator::Mod => Value::Number(left.to_number() % right.to_number()),
            BinaryOperator::Equal => Value::Boolean(left.loose_equals(right)),
            BinaryOperator::NotEqual => Value::Boolean(!left.loose_equals(right)),
            BinaryOperator::StrictEqual => Value::Boolean(left.strict_equals(right)),
            BinaryOperator::StrictNotEqual => Value::Boolean(!left.strict_equals(right)),
            BinaryOperator::LessThan => Value::Boolean(compare(left, right, |o| o.is_lt())),
            BinaryOperator::GreaterThan => Value::Boolean(compare(left, right, |o| o.is_gt())),
            BinaryOperator::LessThanEqual => Value::Boolean(compare(left, right, |o| o.is_le())),
            BinaryOperator::GreaterThanEqual => Value::Boolean(compare(left, right, |o| o.is_ge())),
            BinaryOperator::In => {
                let Value::Object(obj) = right else {
                    return Err(self.error(
                        ErrorKind::Type,
                        format!("invalid 'in' operand {}", right.to_js_string()),
                    ));
                };
                Value::Boolean(obj.has_property(&left.to_js_string()))
            }
            BinaryOperator::Instanceof => Value::Boolean(self.instance_of(left, right)?),
        };
        Ok(value)
    }

    fn to_primitive(&self, value: &Value) -> Exec<Value> {
        match value {
            Value::Object(_) => Ok(Value::from(to_string(value)?)),
            other => Ok(other.clone()),
        }
    }

    fn instance_of(&self, value: &Value, constructor: &Value) -> Exec<bool> {
        let Some(function) = constructor.as_object().and_then(ObjectRef::as_function) else {
            return Err(self.error(ErrorKind::Type, "invalid 'instanceof' operand"));
        };
        let Value::Object(obj) = value else {
            return Ok(false);
        };

        match function {
            Function::Native(native) => Ok(builtins::is_instance_of(obj, &native.name)),
            Function::Script(_) => {
                let Some(ctor) = constructor.as_object() else {
                    return Ok(false);
                };
                let Value::Object(prototype) = ctor.get("prototype") else {
                    return Ok(false);
                };
                let mut current = obj.borrow().prototype.clone();
                while let Some(proto) = current {
                    if proto.ptr_eq(&prototype) {
                        return Ok(true);
                    }
                    current = proto.borrow().prototype.clone();
                }
                Ok(false)
            }
        }
    }
}

fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return accept(a.cmp(b));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .is_some_and(accept)
}
