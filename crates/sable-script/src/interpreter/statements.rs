// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement execution.

use super::{Completion, Exec, Interpreter};
use crate::ast::{ForInTarget, Statement, StatementKind, VariableDeclaration, VariableKind};
use crate::runtime::{Environment, Throw, Value};
use std::rc::Rc;

impl Interpreter {
    /// Hoists `var` names and top-level function declarations of a body into
    /// its variable scope.
    pub(crate) fn hoist_declarations(&self, body: &[Statement], var_env: &Rc<Environment>) {
        for stmt in body {
            if let StatementKind::FunctionDeclaration(literal) = &stmt.kind {
                if let Some(name) = &literal.name {
                    let closure = self.make_closure(literal, var_env);
                    var_env.declare_var(name, Some(closure));
                }
            } else {
                hoist_vars(stmt, var_env);
            }
        }
    }

    pub(crate) fn execute_statements(
        &self,
        body: &[Statement],
        env: &Rc<Environment>,
        completion: &mut Value,
    ) -> Exec<Completion> {
        for stmt in body {
            match self.execute(stmt, env, completion)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn execute(&self, stmt: &Statement, env: &Rc<Environment>, completion: &mut Value) -> Exec<Completion> {
        self.realm.call_stack.set_line(stmt.line);

        match &stmt.kind {
            StatementKind::VariableDeclaration(declaration) => {
                self.declare_variables(declaration, env)?;
                Ok(Completion::Normal)
            }
            StatementKind::FunctionDeclaration(literal) => {
                // Declarations directly in a function or program body were
                // hoisted; nested ones bind when reached.
                if !Rc::ptr_eq(env, &env.var_scope()) {
                    if let Some(name) = &literal.name {
                        env.declare(name, self.make_closure(literal, env), true);
                    }
                }
                Ok(Completion::Normal)
            }
            StatementKind::Expression(expr) => {
                *completion = self.evaluate(expr, env)?;
                Ok(Completion::Normal)
            }
            StatementKind::Block(body) => {
                let block = Environment::block(env.clone());
                self.execute_statements(body, &block, completion)
            }
            StatementKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, env)?.to_boolean() {
                    self.execute(consequent, env, completion)
                } else if let Some(alternate) = alternate {
                    self.execute(alternate, env, completion)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StatementKind::While { test, body } => {
                while self.evaluate(test, env)?.to_boolean() {
                    match self.execute(body, env, completion)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            StatementKind::DoWhile { body, test } => {
                loop {
                    match self.execute(body, env, completion)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.evaluate(test, env)?.to_boolean() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            StatementKind::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_env = Environment::block(env.clone());
                if let Some(init) = init {
                    self.execute(init, &loop_env, &mut Value::Undefined)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.evaluate(test, &loop_env)?.to_boolean() {
                            break;
                        }
                    }
                    match self.execute(body, &loop_env, completion)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.evaluate(update, &loop_env)?;
                    }
                }
                Ok(Completion::Normal)
            }
            StatementKind::ForIn {
                target,
                object,
                body,
            } => {
                let object = self.evaluate(object, env)?;
                let keys: Vec<Value> = match &object {
                    Value::Object(obj) => obj.keys().into_iter().map(Value::String).collect(),
                    Value::String(s) => (0..s.chars().count())
                        .map(|i| Value::from(i.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };

                for key in keys {
                    let iteration_env = Environment::block(env.clone());
                    match target {
                        ForInTarget::Declaration(VariableKind::Var, name) => {
                            env.var_scope().declare_var(name, Some(key));
                        }
                        ForInTarget::Declaration(kind, name) => {
                            iteration_env.declare(name, key, *kind == VariableKind::Let);
                        }
                        ForInTarget::Identifier(name) => self.assign_identifier(name, key, env)?,
                    }
                    match self.execute(body, &iteration_env, completion)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            StatementKind::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StatementKind::Break => Ok(Completion::Break),
            StatementKind::Continue => Ok(Completion::Continue),
            StatementKind::Throw(argument) => {
                let value = self.evaluate(argument, env)?;
                let mut thrown = Throw::new(value);
                self.realm.call_stack.locate(&mut thrown);
                Err(thrown)
            }
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let block_env = Environment::block(env.clone());
                let mut result = self.execute_statements(block, &block_env, completion);

                if let Some(handler) = handler {
                    if let Err(thrown) = result {
                        let catch_env = Environment::block(env.clone());
                        catch_env.declare(&handler.param, thrown.value, true);
                        result = self.execute_statements(&handler.body, &catch_env, completion);
                    }
                }

                if let Some(finalizer) = finalizer {
                    let finally_env = Environment::block(env.clone());
                    match self.execute_statements(finalizer, &finally_env, completion)? {
                        Completion::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }

                result
            }
            StatementKind::Empty => Ok(Completion::Normal),
        }
    }

    fn declare_variables(&self, declaration: &VariableDeclaration, env: &Rc<Environment>) -> Exec<()> {
        for declarator in &declaration.declarations {
            match declaration.kind {
                VariableKind::Var => {
                    if let Some(init) = &declarator.init {
                        let value = self.evaluate(init, env)?;
                        self.assign_identifier(&declarator.name, value, env)?;
                    }
                }
                kind => {
                    let value = match &declarator.init {
                        Some(init) => self.evaluate(init, env)?,
                        None => Value::Undefined,
                    };
                    env.declare(&declarator.name, value, kind == VariableKind::Let);
                }
            }
        }
        Ok(())
    }
}

/// Declares every `var` reachable from `stmt` without entering nested
/// functions.
fn hoist_vars(stmt: &Statement, var_env: &Rc<Environment>) {
    match &stmt.kind {
        StatementKind::VariableDeclaration(declaration) if declaration.kind == VariableKind::Var => {
            for declarator in &declaration.declarations {
                var_env.declare_var(&declarator.name, None);
            }
        }
        StatementKind::Block(body) => body.iter().for_each(|s| hoist_vars(s, var_env)),
        StatementKind::If {
            consequent,
            alternate,
            ..
        } => {
            hoist_vars(consequent, var_env);
            if let Some(alternate) = alternate {
                hoist_vars(alternate, var_env);
            }
        }
        StatementKind::While { body, .. } | StatementKind::DoWhile { body, .. } => {
            hoist_vars(body, var_env)
        }
        StatementKind::For { init, body, .. } => {
            if let Some(init) = init {
                hoist_vars(init, var_env);
            }
            hoist_vars(body, var_env);
        }
        StatementKind::ForIn { target, body, .. } => {
            if let ForInTarget::Declaration(VariableKind::Var, name) = target {
                var_env.declare_var(name, None);
            }
            hoist_vars(body, var_env);
        }
        StatementKind::Try {
            block,
            handler,
            finalizer,
        } => {
            block.iter().for_each(|s| hoist_vars(s, var_env));
            if let Some(handler) = handler {
                handler.body.iter().for_each(|s| hoist_vars(s, var_env));
            }
            if let Some(finalizer) = finalizer {
                finalizer.iter().for_each(|s| hoist_vars(s, var_env));
            }
        }
        _ => {}
    }
}
