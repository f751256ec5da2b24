//! Lexer and recursive-descent parser for condition expressions and update
//! value templates.
//!
//! Attribute names are written bare (or single-quoted when they collide with
//! a keyword) and values are always `?` placeholders bound by position. A `$`
//! path segment takes its name from the argument in the same position, so
//! `?` and `$` draw from one argument list in the order they appear.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::attribute::AttributeValue;

use super::ast::{
    ArithmeticOp, AttributePath, CompareOp, ConditionExpr, FunctionName, LogicalOp, Operand,
    ValueExpr,
};

/// Errors produced while parsing an expression or binding its arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("Unterminated quoted name")]
    UnterminatedQuote,
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Expression has {placeholders} placeholders but {args} arguments were given")]
    ArgumentCount { placeholders: usize, args: usize },
    #[error("Argument {index} names an attribute and must be a string")]
    NameArgument { index: usize },
    #[error("Empty expression")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Placeholder,
    NamePlaceholder,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Dot,
    Comma,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Between,
    In,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Placeholder => write!(f, "'?'"),
            Self::NamePlaceholder => write!(f, "'$'"),
            Self::Eq => write!(f, "'='"),
            Self::Ne => write!(f, "'<>'"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
            Self::Between => write!(f, "BETWEEN"),
            Self::In => write!(f, "IN"),
            Self::Eof => write!(f, "end of expression"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }

        let Some(c) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '?' => Token::Placeholder,
            '$' => Token::NamePlaceholder,
            '=' => Token::Eq,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '<' => match self.chars.peek() {
                Some('>') => {
                    self.chars.next();
                    Token::Ne
                }
                Some('=') => {
                    self.chars.next();
                    Token::Le
                }
                _ => Token::Lt,
            },
            '>' => {
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '\'' => {
                let mut name = String::new();
                loop {
                    match self.chars.next() {
                        Some('\'') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(ExpressionError::UnterminatedQuote),
                    }
                }
                Token::Identifier(name)
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&ch) = self.chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        word.push(ch);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                keyword(&word).unwrap_or(Token::Identifier(word))
            }
            other => return Err(ExpressionError::UnexpectedCharacter(other)),
        };
        Ok(token)
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Some(Token::And),
        "OR" => Some(Token::Or),
        "NOT" => Some(Token::Not),
        "BETWEEN" => Some(Token::Between),
        "IN" => Some(Token::In),
        _ => None,
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    args: &'a [AttributeValue],
    next_arg: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &str, args: &'a [AttributeValue]) -> Result<Self, ExpressionError> {
        let tokens = Lexer::new(input).tokenize()?;
        if tokens.first() == Some(&Token::Eof) {
            return Err(ExpressionError::Empty);
        }
        let placeholders = tokens
            .iter()
            .filter(|token| matches!(token, Token::Placeholder | Token::NamePlaceholder))
            .count();
        if placeholders != args.len() {
            return Err(ExpressionError::ArgumentCount {
                placeholders,
                args: args.len(),
            });
        }
        Ok(Self {
            tokens,
            pos: 0,
            args,
            next_arg: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        let found = self.advance();
        if &found == expected {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
            })
        }
    }

    fn expect_end(&mut self) -> Result<(), ExpressionError> {
        self.expect(&Token::Eof)
    }

    fn unexpected<T>(&mut self, expected: &str) -> Result<T, ExpressionError> {
        let found = self.advance();
        Err(ExpressionError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    // ---- conditions -------------------------------------------------------

    fn parse_or(&mut self) -> Result<ConditionExpr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = ConditionExpr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ConditionExpr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = ConditionExpr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<ConditionExpr, ExpressionError> {
        if self.peek() == &Token::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(ConditionExpr::Not(Box::new(inner)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<ConditionExpr, ExpressionError> {
        if self.peek() == &Token::LParen {
            self.advance();
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        if let (Token::Identifier(name), Token::LParen) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            return self.parse_function(&name);
        }

        let left = self.parse_operand()?;
        match self.peek().clone() {
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge => {
                let op = match self.advance() {
                    Token::Eq => CompareOp::Eq,
                    Token::Ne => CompareOp::Ne,
                    Token::Lt => CompareOp::Lt,
                    Token::Le => CompareOp::Le,
                    Token::Gt => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                let right = self.parse_operand()?;
                Ok(ConditionExpr::Compare { left, op, right })
            }
            Token::Between => {
                self.advance();
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                Ok(ConditionExpr::Between {
                    value: left,
                    low,
                    high,
                })
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut list = vec![self.parse_operand()?];
                while self.peek() == &Token::Comma {
                    self.advance();
                    list.push(self.parse_operand()?);
                }
                self.expect(&Token::RParen)?;
                Ok(ConditionExpr::In { value: left, list })
            }
            _ => self.unexpected("comparison operator, BETWEEN or IN"),
        }
    }

    fn parse_function(&mut self, name: &str) -> Result<ConditionExpr, ExpressionError> {
        let function = FunctionName::from_name(name)
            .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
        self.advance();
        self.expect(&Token::LParen)?;

        let mut args = vec![Operand::Path(self.parse_path()?)];
        while args.len() < function.arity() {
            self.expect(&Token::Comma)?;
            args.push(self.parse_operand()?);
        }
        self.expect(&Token::RParen)?;

        Ok(ConditionExpr::Function {
            name: function,
            args,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::Placeholder => {
                self.advance();
                let index = self.next_arg;
                self.next_arg += 1;
                Ok(Operand::Value(index))
            }
            Token::Identifier(_) | Token::NamePlaceholder => Ok(Operand::Path(self.parse_path()?)),
            _ => self.unexpected("attribute name or '?'"),
        }
    }

    fn parse_path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut segments = Vec::new();
        loop {
            match self.advance() {
                Token::Identifier(name) => segments.push(name),
                Token::NamePlaceholder => segments.push(self.bind_name()?),
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        expected: "attribute name".to_string(),
                        found: other.to_string(),
                    })
                }
            }
            if self.peek() != &Token::Dot {
                return Ok(AttributePath::new(segments));
            }
            self.advance();
        }
    }

    fn bind_name(&mut self) -> Result<String, ExpressionError> {
        let index = self.next_arg;
        self.next_arg += 1;
        match self.args.get(index) {
            Some(AttributeValue::S(name)) => Ok(name.clone()),
            _ => Err(ExpressionError::NameArgument { index }),
        }
    }

    // ---- update values ----------------------------------------------------

    fn parse_value(&mut self) -> Result<ValueExpr, ExpressionError> {
        let mut left = self.parse_value_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithmeticOp::Add,
                Token::Minus => ArithmeticOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_value_term()?;
            left = ValueExpr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_value_term(&mut self) -> Result<ValueExpr, ExpressionError> {
        if let (Token::Identifier(name), Token::LParen) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.advance();
            self.advance();
            let expr = match name.as_str() {
                "if_not_exists" => {
                    let path = self.parse_path()?;
                    self.expect(&Token::Comma)?;
                    let default = self.parse_value()?;
                    ValueExpr::IfNotExists {
                        path,
                        default: Box::new(default),
                    }
                }
                "list_append" => {
                    let first = self.parse_value()?;
                    self.expect(&Token::Comma)?;
                    let second = self.parse_value()?;
                    ValueExpr::ListAppend(Box::new(first), Box::new(second))
                }
                _ => return Err(ExpressionError::UnknownFunction(name)),
            };
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }
        Ok(ValueExpr::Operand(self.parse_operand()?))
    }
}

/// Parses a condition expression, binding `args` to its placeholders.
pub fn parse_condition(
    input: &str,
    args: &[AttributeValue],
) -> Result<ConditionExpr, ExpressionError> {
    let mut parser = Parser::new(input, args)?;
    let expr = parser.parse_or()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses an update value template, binding `args` to its placeholders.
pub fn parse_value(input: &str, args: &[AttributeValue]) -> Result<ValueExpr, ExpressionError> {
    let mut parser = Parser::new(input, args)?;
    let expr = parser.parse_value()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses one or more comma-separated `path = value-template` assignments.
///
/// Placeholder positions run across the whole input, so every assignment
/// indexes into the same `args`.
pub fn parse_assignments(
    input: &str,
    args: &[AttributeValue],
) -> Result<Vec<(AttributePath, ValueExpr)>, ExpressionError> {
    let mut parser = Parser::new(input, args)?;
    let mut assignments = Vec::new();
    loop {
        let path = parser.parse_path()?;
        parser.expect(&Token::Eq)?;
        assignments.push((path, parser.parse_value()?));
        if parser.peek() != &Token::Comma {
            break;
        }
        parser.advance();
    }
    parser.expect_end()?;
    Ok(assignments)
}
