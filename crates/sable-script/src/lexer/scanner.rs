// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};
use unicode_xid::UnicodeXID;

/// A scanner that tokenizes script source code.
///
/// Cloning a scanner is cheap and is how the parser looks more than one
/// token ahead.
#[derive(Clone)]
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        let newline_before = self.skip_whitespace_and_comments();

        let start = self.current_pos;
        let line = self.line;

        let Some((_, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), line, newline_before);
        };

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,

            '.' => match self.peek() {
                Some(digit) if digit.is_ascii_digit() => self.scan_number('.'),
                _ => TokenKind::Dot,
            },
            '+' => self.scan_doubled('+', TokenKind::PlusPlus, TokenKind::PlusEqual, TokenKind::Plus),
            '-' => self.scan_doubled(
                '-',
                TokenKind::MinusMinus,
                TokenKind::MinusEqual,
                TokenKind::Minus,
            ),
            '*' => self.scan_assign_op(TokenKind::StarEqual, TokenKind::Star),
            '/' => self.scan_assign_op(TokenKind::SlashEqual, TokenKind::Slash),
            '%' => self.scan_assign_op(TokenKind::PercentEqual, TokenKind::Percent),
            '<' => self.scan_assign_op(TokenKind::LessThanEqual, TokenKind::LessThan),
            '>' => self.scan_assign_op(TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            '=' => self.scan_equality(TokenKind::StrictEqual, TokenKind::EqualEqual, TokenKind::Equal),
            '!' => self.scan_equality(TokenKind::StrictNotEqual, TokenKind::NotEqual, TokenKind::Bang),
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::AmpersandAmpersand
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::PipePipe
            }

            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(ch),
            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => TokenKind::Invalid(ch),
        };

        Token::new(kind, Span::new(start, self.current_pos), line, newline_before)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    /// Skips trivia, reporting whether a line terminator was crossed.
    fn skip_whitespace_and_comments(&mut self) -> bool {
        let mut newline = false;
        loop {
            match self.peek() {
                Some('\n' | '\r' | '\u{2028}' | '\u{2029}') => {
                    newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() || ch == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' || ch == '\r' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        while let Some((_, ch)) = self.advance() {
                            if ch == '\n' {
                                newline = true;
                            }
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        newline
    }

    fn scan_doubled(
        &mut self,
        ch: char,
        doubled: TokenKind,
        assign: TokenKind,
        single: TokenKind,
    ) -> TokenKind {
        match self.peek() {
            Some(next) if next == ch => {
                self.advance();
                doubled
            }
            Some('=') => {
                self.advance();
                assign
            }
            _ => single,
        }
    }

    fn scan_assign_op(&mut self, assign: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            assign
        } else {
            single
        }
    }

    fn scan_equality(&mut self, strict: TokenKind, loose: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() != Some('=') {
            return single;
        }
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            strict
        } else {
            loose
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some((_, '\n')) => return TokenKind::UnterminatedString,
                Some((_, ch)) if ch == quote => break,
                Some((_, '\\')) => {
                    let Some((_, escaped)) = self.advance() else {
                        return TokenKind::UnterminatedString;
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        '0' => value.push('\0'),
                        'x' => match self.scan_hex_escape(2) {
                            Some(ch) => value.push(ch),
                            None => return TokenKind::Invalid('x'),
                        },
                        'u' => match self.scan_hex_escape(4) {
                            Some(ch) => value.push(ch),
                            None => return TokenKind::Invalid('u'),
                        },
                        // Line continuation
                        '\n' => {}
                        other => value.push(other),
                    }
                }
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        // Lone surrogates cannot be represented in a Rust string.
        Some(char::from_u32(code).unwrap_or('\u{fffd}'))
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_hexdigit() {
                    break;
                }
                digits.push(ch);
                self.advance();
            }
            return match u64::from_str_radix(&digits, 16) {
                Ok(n) => TokenKind::Number(n as f64),
                Err(_) => TokenKind::Invalid('x'),
            };
        }

        let mut value = String::from(first);
        let mut seen_dot = first == '.';

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            value.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                value.push(sign);
                self.advance();
            }
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_digit() {
                    break;
                }
                value.push(ch);
                self.advance();
            }
        }

        match value.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(first),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::keyword(&name).unwrap_or(TokenKind::Identifier(name))
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '$' || UnicodeXID::is_xid_continue(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_scan_operators() {
        assert_eq!(
            kinds("a === b !== c += 1"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::StrictEqual,
                TokenKind::Identifier("b".into()),
                TokenKind::StrictNotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::PlusEqual,
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_scan_string_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "\x41B\n""#),
            vec![
                TokenKind::String("a'b".into()),
                TokenKind::String("AB\n".into()),
            ]
        );
    }

    #[test]
    fn test_scan_numbers() {
        assert_eq!(
            kinds("42 3.5 .5 0x1F 1e3"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.5),
                TokenKind::Number(0.5),
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("var $x = typeof _y"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("$x".into()),
                TokenKind::Equal,
                TokenKind::Typeof,
                TokenKind::Identifier("_y".into()),
            ]
        );
    }

    #[test]
    fn test_line_tracking_and_newline_flag() {
        let mut scanner = Scanner::new("a\n/* two\nlines */ b // tail\nc");
        let a = scanner.next_token();
        let b = scanner.next_token();
        let c = scanner.next_token();
        assert_eq!((a.line, a.newline_before), (1, false));
        assert_eq!((b.line, b.newline_before), (3, true));
        assert_eq!((c.line, c.newline_before), (4, true));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(kinds("'abc"), vec![TokenKind::UnterminatedString]);
    }
}
