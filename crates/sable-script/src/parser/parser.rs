// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The main parser implementation.

use crate::ast::*;
use crate::error::ScriptError;
use crate::lexer::{Scanner, Token, TokenKind};
use std::rc::Rc;

type ParseResult<T> = Result<T, ScriptError>;

/// Deepest statement and expression nesting a source may use.
pub const MAX_NESTING_DEPTH: usize = 256;

/// A recursive descent parser for the module dialect.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    filename: String,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self::with_filename(source, "<string>")
    }

    /// Creates a parser whose errors name `filename`.
    pub fn with_filename(source: &'a str, filename: impl Into<String>) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::eof(),
            filename: filename.into(),
            depth: 0,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        let line = self.current.line;
        let kind = match &self.current.kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let declaration = self.parse_variable_declaration()?;
                self.consume_semicolon()?;
                StatementKind::VariableDeclaration(declaration)
            }
            TokenKind::Function => {
                self.advance();
                let literal = self.parse_function_rest(true)?;
                StatementKind::FunctionDeclaration(Rc::new(literal))
            }
            TokenKind::If => self.parse_if_statement()?,
            TokenKind::While => self.parse_while_statement()?,
            TokenKind::Do => self.parse_do_while_statement()?,
            TokenKind::For => self.parse_for_statement()?,
            TokenKind::Return => self.parse_return_statement()?,
            TokenKind::Break => {
                self.advance();
                self.consume_semicolon()?;
                StatementKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_semicolon()?;
                StatementKind::Continue
            }
            TokenKind::Throw => {
                self.advance();
                if self.current.newline_before {
                    return Err(self.error("line break is not allowed after 'throw'"));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                StatementKind::Throw(argument)
            }
            TokenKind::Try => self.parse_try_statement()?,
            TokenKind::LeftBrace => StatementKind::Block(self.parse_block_body()?),
            TokenKind::Semicolon => {
                self.advance();
                StatementKind::Empty
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                StatementKind::Expression(expression)
            }
        };
        Ok(Statement { kind, line })
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<VariableDeclaration> {
        let kind = match &self.current.kind {
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => VariableKind::Var,
        };
        self.advance();

        let mut declarations = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                if kind == VariableKind::Const {
                    return Err(self.error(format!("missing = in const declaration of '{name}'")));
                }
                None
            };
            declarations.push(VariableDeclarator { name, init });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(VariableDeclaration { kind, declarations })
    }

    /// Parses everything after the `function` keyword.
    fn parse_function_rest(&mut self, require_name: bool) -> ParseResult<FunctionLiteral> {
        let line = self.previous.line;
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ if require_name => return Err(self.error("function statement requires a name")),
            _ => None,
        };

        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_block_body()?;

        Ok(FunctionLiteral {
            name,
            params,
            body,
            line,
        })
    }

    fn parse_if_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StatementKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_while_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(StatementKind::While { test, body })
    }

    fn parse_do_while_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'do'
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        // `do ... while (x)` may be followed directly by the next statement.
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        Ok(StatementKind::DoWhile { body, test })
    }

    fn parse_for_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        if let Some(target) = self.parse_for_in_target()? {
            self.expect(&TokenKind::In)?;
            let object = self.parse_expression()?;
            self.expect(&TokenKind::RightParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(StatementKind::ForIn {
                target,
                object,
                body,
            });
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            let line = self.current.line;
            let kind = if matches!(
                self.current.kind,
                TokenKind::Var | TokenKind::Let | TokenKind::Const
            ) {
                StatementKind::VariableDeclaration(self.parse_variable_declaration()?)
            } else {
                StatementKind::Expression(self.parse_expression()?)
            };
            Some(Box::new(Statement { kind, line }))
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(StatementKind::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Detects `for (var k in` / `for (k in` and consumes the target.
    fn parse_for_in_target(&mut self) -> ParseResult<Option<ForInTarget>> {
        let mut lookahead = self.scanner.clone();
        let after_first = lookahead.next_token();

        let kind = match &self.current.kind {
            TokenKind::Var => Some(VariableKind::Var),
            TokenKind::Let => Some(VariableKind::Let),
            TokenKind::Const => Some(VariableKind::Const),
            TokenKind::Identifier(_) => None,
            _ => return Ok(None),
        };

        match kind {
            Some(kind) => {
                let TokenKind::Identifier(name) = &after_first.kind else {
                    return Ok(None);
                };
                if lookahead.next_token().kind != TokenKind::In {
                    return Ok(None);
                }
                let name = name.clone();
                self.advance();
                self.advance();
                Ok(Some(ForInTarget::Declaration(kind, name)))
            }
            None => {
                if after_first.kind != TokenKind::In {
                    return Ok(None);
                }
                let name = self.expect_identifier()?;
                Ok(Some(ForInTarget::Identifier(name)))
            }
        }
    }

    fn parse_return_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'return'

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
            || self.current.newline_before
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(StatementKind::Return(argument))
    }

    fn parse_try_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance(); // consume 'try'
        let block = self.parse_block_body()?;

        let handler = if self.check(&TokenKind::Catch) {
            self.advance();
            self.expect(&TokenKind::LeftParen)?;
            let param = self.expect_identifier()?;
            self.expect(&TokenKind::RightParen)?;
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.check(&TokenKind::Finally) {
            self.advance();
            Some(self.parse_block_body()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("missing catch or finally after try"));
        }

        Ok(StatementKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_block_body(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(body)
    }

    /// Parses a full expression, including the comma operator.
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence(expressions))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> ParseResult<Expression> {
        let target = self.parse_conditional()?;

        let operator = match self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::AddAssign,
            TokenKind::MinusEqual => AssignmentOperator::SubAssign,
            TokenKind::StarEqual => AssignmentOperator::MulAssign,
            TokenKind::SlashEqual => AssignmentOperator::DivAssign,
            TokenKind::PercentEqual => AssignmentOperator::ModAssign,
            _ => return Ok(target),
        };

        if !matches!(target, Expression::Identifier(_) | Expression::Member { .. }) {
            return Err(self.error("invalid assignment left-hand side"));
        }

        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expression::Assignment {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// Parse conditional (ternary) expression: test ? consequent : alternate
    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_assignment()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_assignment()?;

            return Ok(Expression::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expression::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_binary(0)?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_binary(0)?;
            left = Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Precedence climbing over the left-associative binary operators.
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        while let Some((precedence, operator)) = binary_operator(&self.current.kind) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expression::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.current.kind {
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Typeof => UnaryOperator::Typeof,
            TokenKind::Void => UnaryOperator::Void,
            TokenKind::Delete => UnaryOperator::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = if self.check(&TokenKind::PlusPlus) {
                    UpdateOperator::Increment
                } else {
                    UpdateOperator::Decrement
                };
                self.advance();
                let argument = self.parse_unary()?;
                self.check_update_target(&argument)?;
                return Ok(Expression::Update {
                    operator,
                    prefix: true,
                    argument: Box::new(argument),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let argument = self.parse_unary()?;
        Ok(Expression::Unary {
            operator,
            argument: Box::new(argument),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_call()?;

        let operator = match self.current.kind {
            TokenKind::PlusPlus if !self.current.newline_before => UpdateOperator::Increment,
            TokenKind::MinusMinus if !self.current.newline_before => UpdateOperator::Decrement,
            _ => return Ok(expr),
        };
        self.check_update_target(&expr)?;
        self.advance();
        Ok(Expression::Update {
            operator,
            prefix: false,
            argument: Box::new(expr),
        })
    }

    fn check_update_target(&self, target: &Expression) -> ParseResult<()> {
        if matches!(target, Expression::Identifier(_) | Expression::Member { .. }) {
            Ok(())
        } else {
            Err(self.error("invalid increment/decrement operand"))
        }
    }

    fn parse_call(&mut self) -> ParseResult<Expression> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };

        loop {
            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let arguments = self.parse_arguments()?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else if let Some(member) = self.parse_member_suffix(&mut expr)? {
                expr = member;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parses `.name` or `[expr]` following `object`, if present.
    fn parse_member_suffix(&mut self, object: &mut Expression) -> ParseResult<Option<Expression>> {
        let property = if self.check(&TokenKind::Dot) {
            self.advance();
            MemberProperty::Named(self.expect_property_name()?)
        } else if self.check(&TokenKind::LeftBracket) {
            self.advance();
            let property = self.parse_expression()?;
            self.expect(&TokenKind::RightBracket)?;
            MemberProperty::Computed(Box::new(property))
        } else {
            return Ok(None);
        };

        let object = std::mem::replace(object, Expression::Null);
        Ok(Some(Expression::Member {
            object: Box::new(object),
            property,
        }))
    }

    fn parse_new_expression(&mut self) -> ParseResult<Expression> {
        self.advance(); // consume 'new'

        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        while let Some(member) = self.parse_member_suffix(&mut callee)? {
            callee = member;
        }

        let arguments = if self.check(&TokenKind::LeftParen) {
            self.advance();
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    /// Parses call arguments after the opening parenthesis.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RightParen)?;

        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let expr = match &self.current.kind {
            TokenKind::Number(n) => Expression::Number(*n),
            TokenKind::String(s) => Expression::String(Rc::from(s.as_str())),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::Null => Expression::Null,
            TokenKind::This => Expression::This,
            TokenKind::Identifier(name) => Expression::Identifier(name.clone()),
            TokenKind::Function => {
                self.advance();
                let literal = self.parse_function_rest(false)?;
                return Ok(Expression::Function(Rc::new(literal)));
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftBrace => return self.parse_object_literal(),
            other => return Err(self.error(format!("unexpected {}", other.describe()))),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.advance(); // consume '['
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RightBracket) {
            elements.push(self.parse_assignment()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightBracket)?;

        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        self.advance(); // consume '{'
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let key = match &self.current.kind {
                TokenKind::String(s) => {
                    let key = s.clone();
                    self.advance();
                    key
                }
                TokenKind::Number(n) => {
                    let key = crate::runtime::number_to_string(*n);
                    self.advance();
                    key
                }
                _ => self.expect_property_name()?,
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_assignment()?;
            properties.push((key, value));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Object(properties))
    }

    // Helper methods

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("too much recursion"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} but found {}",
                kind.describe(),
                self.current.kind.describe()
            )))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(format!(
                "expected identifier but found {}",
                self.current.kind.describe()
            )))
        }
    }

    /// Identifiers and reserved words are both valid after `.` and as
    /// object literal keys.
    fn expect_property_name(&mut self) -> ParseResult<String> {
        if let Some(text) = self.current.kind.keyword_text() {
            self.advance();
            return Ok(text.to_string());
        }
        self.expect_identifier()
    }

    /// Automatic semicolon insertion: a statement may end at `;`, before
    /// `}`, at end of input, or at a line break.
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.check(&TokenKind::RightBrace) || self.is_at_end() || self.current.newline_before {
            return Ok(());
        }
        Err(self.error("missing ; before statement"))
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(message, self.filename.clone(), self.current.line)
    }
}

/// Binding power and AST operator for a binary operator token.
fn binary_operator(kind: &TokenKind) -> Option<(u8, BinaryOperator)> {
    let entry = match kind {
        TokenKind::EqualEqual => (1, BinaryOperator::Equal),
        TokenKind::NotEqual => (1, BinaryOperator::NotEqual),
        TokenKind::StrictEqual => (1, BinaryOperator::StrictEqual),
        TokenKind::StrictNotEqual => (1, BinaryOperator::StrictNotEqual),
        TokenKind::LessThan => (2, BinaryOperator::LessThan),
        TokenKind::GreaterThan => (2, BinaryOperator::GreaterThan),
        TokenKind::LessThanEqual => (2, BinaryOperator::LessThanEqual),
        TokenKind::GreaterThanEqual => (2, BinaryOperator::GreaterThanEqual),
        TokenKind::In => (2, BinaryOperator::In),
        TokenKind::Instanceof => (2, BinaryOperator::Instanceof),
        TokenKind::Plus => (3, BinaryOperator::Add),
        TokenKind::Minus => (3, BinaryOperator::Sub),
        TokenKind::Star => (4, BinaryOperator::Mul),
        TokenKind::Slash => (4, BinaryOperator::Div),
        TokenKind::Percent => (4, BinaryOperator::Mod),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    fn parse_err(src: &str) -> ScriptError {
        let mut parser = Parser::with_filename(src, "test.js");
        parser.parse_program().unwrap_err()
    }

    #[test]
    fn test_parse_variable_declaration() {
        let program = parse_ok("var x = 42, y;");
        assert_eq!(program.body.len(), 1);
        let StatementKind::VariableDeclaration(decl) = &program.body[0].kind else {
            panic!("expected a declaration");
        };
        assert_eq!(decl.kind, VariableKind::Var);
        assert_eq!(decl.declarations.len(), 2);
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("1 + 2 * 3;");
        let StatementKind::Expression(Expression::Binary { operator, right, .. }) =
            &program.body[0].kind
        else {
            panic!("expected a binary expression");
        };
        assert_eq!(*operator, BinaryOperator::Add);
        assert!(matches!(
            **right,
            Expression::Binary {
                operator: BinaryOperator::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_semicolon_insertion_at_newlines() {
        let program = parse_ok("var a = 1\nvar b = 2\na = b\n");
        assert_eq!(program.body.len(), 3);
        assert_eq!(program.body[2].line, 3);
    }

    #[test]
    fn test_return_ends_at_line_break() {
        let program = parse_ok("function f() {\n  return\n  42\n}");
        let StatementKind::FunctionDeclaration(f) = &program.body[0].kind else {
            panic!("expected a function");
        };
        assert!(matches!(f.body[0].kind, StatementKind::Return(None)));
        assert_eq!(f.body.len(), 2);
    }

    #[test]
    fn test_missing_semicolon_is_an_error() {
        let err = parse_err("var a = 1 var b = 2");
        assert_eq!(err.message, "missing ; before statement");
        assert_eq!(err.filename, "test.js");
    }

    #[test]
    fn test_for_in_and_for() {
        let program = parse_ok("for (var k in o) {} for (k in o) {} for (var i = 0; i < 3; i++) {}");
        assert!(matches!(
            program.body[0].kind,
            StatementKind::ForIn {
                target: ForInTarget::Declaration(VariableKind::Var, _),
                ..
            }
        ));
        assert!(matches!(
            program.body[1].kind,
            StatementKind::ForIn {
                target: ForInTarget::Identifier(_),
                ..
            }
        ));
        assert!(matches!(program.body[2].kind, StatementKind::For { .. }));
    }

    #[test]
    fn test_keyword_property_names() {
        let program = parse_ok("exports.delete = function () {}; var o = { new: 1, 'a b': 2 };");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_new_with_member_callee() {
        let program = parse_ok("new a.B(1).c;");
        let StatementKind::Expression(Expression::Member { object, .. }) = &program.body[0].kind
        else {
            panic!("expected member access");
        };
        assert!(matches!(**object, Expression::New { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("1 = 2;");
        assert_eq!(err.message, "invalid assignment left-hand side");
    }

    #[test]
    fn test_try_requires_handler() {
        let err = parse_err("try { }");
        assert_eq!(err.message, "missing catch or finally after try");
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse_err("var a;\nvar b;\nvar = 3;");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_nesting_limit() {
        // Debug builds need more than the default test thread stack.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let shallow = format!("{}1{};", "(".repeat(50), ")".repeat(50));
                assert!(Parser::new(&shallow).parse_program().is_ok());

                let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
                let err = parse_err(&deep);
                assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
                assert_eq!(err.message, "too much recursion");

                let blocks = format!("{}{}", "{".repeat(MAX_NESTING_DEPTH + 1), "}".repeat(MAX_NESTING_DEPTH + 1));
                assert_eq!(parse_err(&blocks).message, "too much recursion");
                assert_eq!(parse_err(&"-".repeat(100_000)).message, "too much recursion");
            })
            .unwrap();
        handle.join().unwrap();
    }
}
