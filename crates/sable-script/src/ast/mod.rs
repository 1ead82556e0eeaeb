// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree definitions for the module dialect.
//!
//! Statements remember the line they start on so runtime errors can be
//! annotated with a location.

use std::rc::Rc;

/// A complete program (a module body or a top-level script).
#[derive(Debug, Clone)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
}

/// A statement together with its source line.
#[derive(Debug, Clone)]
pub struct Statement {
    /// What the statement does
    pub kind: StatementKind,
    /// 1-based source line
    pub line: u32,
}

/// Statement forms.
#[derive(Debug, Clone)]
pub enum StatementKind {
    /// `var`, `let` or `const`
    VariableDeclaration(VariableDeclaration),
    /// `function name(...) { ... }`
    FunctionDeclaration(Rc<FunctionLiteral>),
    /// An expression evaluated for its value or side effects
    Expression(Expression),
    /// `{ ... }`
    Block(Vec<Statement>),
    /// `if (test) consequent else alternate`
    If {
        /// Condition
        test: Expression,
        /// Taken when the condition is truthy
        consequent: Box<Statement>,
        /// Taken otherwise
        alternate: Option<Box<Statement>>,
    },
    /// `while (test) body`
    While {
        /// Loop condition
        test: Expression,
        /// Loop body
        body: Box<Statement>,
    },
    /// `do body while (test)`
    DoWhile {
        /// Loop body
        body: Box<Statement>,
        /// Loop condition
        test: Expression,
    },
    /// `for (init; test; update) body`
    For {
        /// Initializer: a declaration or an expression statement
        init: Option<Box<Statement>>,
        /// Loop condition
        test: Option<Expression>,
        /// Per-iteration update
        update: Option<Expression>,
        /// Loop body
        body: Box<Statement>,
    },
    /// `for (target in object) body`
    ForIn {
        /// Binding that receives each key
        target: ForInTarget,
        /// Object whose keys are enumerated
        object: Expression,
        /// Loop body
        body: Box<Statement>,
    },
    /// `return expr`
    Return(Option<Expression>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `throw expr`
    Throw(Expression),
    /// `try { } catch (e) { } finally { }`
    Try {
        /// Protected block
        block: Vec<Statement>,
        /// Optional catch clause
        handler: Option<CatchClause>,
        /// Optional finally block
        finalizer: Option<Vec<Statement>>,
    },
    /// `;`
    Empty,
}

/// Declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Function scoped, hoisted
    Var,
    /// Block scoped
    Let,
    /// Block scoped, immutable
    Const,
}

/// `var a = 1, b;`
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    /// The declaration keyword
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single `name = init` inside a declaration.
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    /// Bound name
    pub name: String,
    /// Optional initializer
    pub init: Option<Expression>,
}

/// The left-hand side of a `for-in` loop.
#[derive(Debug, Clone)]
pub enum ForInTarget {
    /// `for (var k in o)`
    Declaration(VariableKind, String),
    /// `for (k in o)`
    Identifier(String),
}

/// `catch (param) { body }`
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Name bound to the thrown value
    pub param: String,
    /// Handler body
    pub body: Vec<Statement>,
}

/// A function declaration or expression. Shared between every closure
/// created from it.
#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    /// Function name, if any
    pub name: Option<String>,
    /// Parameter names
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Line of the `function` keyword
    pub line: u32,
}

/// Expression forms.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(Rc<str>),
    /// `true` / `false`
    Boolean(bool),
    /// `null`
    Null,
    /// A name reference
    Identifier(String),
    /// `this`
    This,
    /// `[a, b]`
    Array(Vec<Expression>),
    /// `{ key: value }`
    Object(Vec<(String, Expression)>),
    /// `function (...) { ... }`
    Function(Rc<FunctionLiteral>),
    /// Prefix unary operator
    Unary {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        argument: Box<Expression>,
    },
    /// `++x`, `x--`
    Update {
        /// Increment or decrement
        operator: UpdateOperator,
        /// Prefix or postfix form
        prefix: bool,
        /// Target
        argument: Box<Expression>,
    },
    /// Arithmetic, comparison and relational operators
    Binary {
        /// Operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// `&&` and `||`
    Logical {
        /// Operator
        operator: LogicalOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand, evaluated lazily
        right: Box<Expression>,
    },
    /// `target op= value`
    Assignment {
        /// Operator
        operator: AssignmentOperator,
        /// An identifier or member expression
        target: Box<Expression>,
        /// Assigned value
        value: Box<Expression>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        /// Condition
        test: Box<Expression>,
        /// Value when truthy
        consequent: Box<Expression>,
        /// Value when falsy
        alternate: Box<Expression>,
    },
    /// `object.name` or `object[expr]`
    Member {
        /// Object expression
        object: Box<Expression>,
        /// Accessed property
        property: MemberProperty,
    },
    /// `callee(args)`
    Call {
        /// Function expression
        callee: Box<Expression>,
        /// Arguments
        arguments: Vec<Expression>,
    },
    /// `new callee(args)`
    New {
        /// Constructor expression
        callee: Box<Expression>,
        /// Arguments
        arguments: Vec<Expression>,
    },
    /// `a, b`
    Sequence(Vec<Expression>),
}

impl Expression {
    /// A short rendering of the expression for "x is not a function" style
    /// messages.
    pub fn describe(&self) -> String {
        match self {
            Expression::Identifier(name) => name.clone(),
            Expression::This => "this".to_string(),
            Expression::Member { object, property } => match property {
                MemberProperty::Named(name) => format!("{}.{}", object.describe(), name),
                MemberProperty::Computed(_) => format!("{}[...]", object.describe()),
            },
            Expression::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Expression::String(s) => format!("\"{s}\""),
            Expression::Number(n) => n.to_string(),
            Expression::Null => "null".to_string(),
            _ => "expression".to_string(),
        }
    }
}

/// The property part of a member expression.
#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// `.name`
    Named(String),
    /// `[expr]`
    Computed(Box<Expression>),
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `!`
    Not,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `typeof`
    Typeof,
    /// `void`
    Void,
    /// `delete`
    Delete,
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictEqual,
    /// `!==`
    StrictNotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessThanEqual,
    /// `>=`
    GreaterThanEqual,
    /// `in`
    In,
    /// `instanceof`
    Instanceof,
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
    /// `%=`
    ModAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Sub),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Mul),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Div),
            AssignmentOperator::ModAssign => Some(BinaryOperator::Mod),
        }
    }
}
