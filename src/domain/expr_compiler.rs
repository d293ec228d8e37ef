//! Shunting-yard compiler: whitespace tokens → classified tokens → RPN.
//!
//! Classification order for each lexeme:
//! 1. number (ASCII digits, at most one `.`)
//! 2. column present in the bound frame
//! 3. trailing `)`: `name.shift(n)` lag reference, otherwise `name(args)` call
//! 4. operator symbol
//! 5. `(` / `)`
//! 6. variable bound in the store
//! 7. anything else is an unknown token
//!
//! A lone `)` is grouping; it is checked before rule 3 so it never reads as a call.

use crate::domain::error::{CompileError, CompileErrorKind};
use crate::domain::expr::{CompiledExpr, IndicatorCall, Node, Operator};
use crate::domain::frame::Frame;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::token::{Lexeme, tokenize};
use crate::domain::variables::VariableStore;
use std::sync::Arc;

/// A lexeme after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    ColumnRef(String),
    FunctionCall(IndicatorCall),
    LagRef {
        name: String,
        periods: i64,
        expr: Arc<CompiledExpr>,
    },
    VariableRef {
        name: String,
        expr: Arc<CompiledExpr>,
    },
    Operator(Operator),
    LParen,
    RParen,
}

enum Pending {
    Op(Operator),
    LParen(usize),
}

pub struct Compiler<'a> {
    frame: &'a Frame,
    indicators: &'a IndicatorRegistry,
    variables: &'a VariableStore,
}

impl<'a> Compiler<'a> {
    pub fn new(
        frame: &'a Frame,
        indicators: &'a IndicatorRegistry,
        variables: &'a VariableStore,
    ) -> Self {
        Self {
            frame,
            indicators,
            variables,
        }
    }

    pub fn compile(&self, source: &str) -> Result<CompiledExpr, CompileError> {
        let lexemes = tokenize(source);
        if lexemes.is_empty() {
            return Err(CompileError::new(CompileErrorKind::EmptyExpression, 0));
        }

        let mut output: Vec<Node> = Vec::with_capacity(lexemes.len());
        let mut stack: Vec<Pending> = Vec::new();

        for lexeme in &lexemes {
            match self.classify(lexeme)? {
                Token::Number(v) => output.push(Node::Literal(v)),
                Token::ColumnRef(name) => output.push(Node::Column(name)),
                Token::FunctionCall(call) => output.push(Node::Indicator(call)),
                Token::LagRef {
                    name,
                    periods,
                    expr,
                } => output.push(Node::Lag {
                    name,
                    periods,
                    expr,
                }),
                Token::VariableRef { name, expr } => output.push(Node::Variable { name, expr }),
                Token::Operator(op) => {
                    while let Some(Pending::Op(top)) = stack.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        output.push(Node::Operator(*top));
                        stack.pop();
                    }
                    stack.push(Pending::Op(op));
                }
                Token::LParen => stack.push(Pending::LParen(lexeme.position)),
                Token::RParen => loop {
                    match stack.pop() {
                        Some(Pending::Op(op)) => output.push(Node::Operator(op)),
                        Some(Pending::LParen(_)) => break,
                        None => {
                            return Err(CompileError::new(
                                CompileErrorKind::MismatchedParentheses,
                                lexeme.position,
                            ));
                        }
                    }
                },
            }
        }

        while let Some(pending) = stack.pop() {
            match pending {
                Pending::Op(op) => output.push(Node::Operator(op)),
                Pending::LParen(position) => {
                    return Err(CompileError::new(
                        CompileErrorKind::MismatchedParentheses,
                        position,
                    ));
                }
            }
        }

        Ok(CompiledExpr::new(source, output))
    }

    pub fn classify(&self, lexeme: &Lexeme<'_>) -> Result<Token, CompileError> {
        let text = lexeme.text;
        let fail = |kind: CompileErrorKind| CompileError::new(kind, lexeme.position);

        if let Some(value) = parse_number(text) {
            return Ok(Token::Number(value));
        }
        if self.frame.has_column(text) {
            return Ok(Token::ColumnRef(text.to_string()));
        }
        if text == ")" {
            return Ok(Token::RParen);
        }
        if text.ends_with(')') {
            if text.contains('.') && text.contains("shift") {
                return self.lag_ref(text).map_err(fail);
            }
            return self.function_call(text).map_err(fail);
        }
        if let Some(op) = Operator::from_symbol(text) {
            return Ok(Token::Operator(op));
        }
        if text == "(" {
            return Ok(Token::LParen);
        }
        if let Some(expr) = self.variables.get(text) {
            return Ok(Token::VariableRef {
                name: text.to_string(),
                expr,
            });
        }
        Err(fail(CompileErrorKind::UnknownToken(text.to_string())))
    }

    fn lag_ref(&self, text: &str) -> Result<Token, CompileErrorKind> {
        let (name, periods) = text
            .split_once('.')
            .and_then(|(name, rest)| {
                let inner = rest.strip_prefix("shift(")?.strip_suffix(')')?;
                Some((name, inner.parse::<i64>().ok()?))
            })
            .ok_or_else(|| CompileErrorKind::InvalidShift(text.to_string()))?;

        let expr = self
            .variables
            .get(name)
            .ok_or_else(|| CompileErrorKind::UnknownVariable(name.to_string()))?;

        Ok(Token::LagRef {
            name: name.to_string(),
            periods,
            expr,
        })
    }

    fn function_call(&self, text: &str) -> Result<Token, CompileErrorKind> {
        let (name, rest) = text
            .split_once('(')
            .ok_or_else(|| CompileErrorKind::MalformedCall(text.to_string()))?;
        if name.is_empty() {
            return Err(CompileErrorKind::MalformedCall(text.to_string()));
        }
        if !self.indicators.contains(name) {
            return Err(CompileErrorKind::UnknownIndicator(name.to_string()));
        }

        let inner = &rest[..rest.len() - 1];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(|arg| {
                    arg.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| CompileErrorKind::InvalidArgument {
                            function: name.to_string(),
                            argument: arg.to_string(),
                        })
                })
                .collect::<Result<Vec<f64>, _>>()?
        };

        Ok(Token::FunctionCall(IndicatorCall {
            name: name.to_string(),
            args,
        }))
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let mut digits = 0;
    let mut dots = 0;
    for ch in text.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return None,
        }
    }
    if digits == 0 || dots > 1 {
        return None;
    }
    text.parse().ok()
}
