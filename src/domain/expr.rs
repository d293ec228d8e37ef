//! Compiled expression data structures.
//!
//! - `Operator`: binary operators with their precedence
//! - `Node`: one element of a postfix (RPN) sequence
//! - `CompiledExpr`: an immutable RPN sequence plus the text it came from

use crate::domain::error::EvalError;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "AND" => Operator::And,
            "OR" => Operator::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }

    /// Higher binds tighter. All operators are left-associative.
    pub fn precedence(self) -> i8 {
        match self {
            Operator::Mul | Operator::Div => 2,
            Operator::Add | Operator::Sub => 1,
            Operator::Gt
            | Operator::Ge
            | Operator::Lt
            | Operator::Le
            | Operator::Eq
            | Operator::Ne => 0,
            Operator::And | Operator::Or => -1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorCall {
    pub name: String,
    pub args: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(f64),
    Column(String),
    Indicator(IndicatorCall),
    /// Captures the variable's sub-expression as bound when referenced.
    Variable {
        name: String,
        expr: Arc<CompiledExpr>,
    },
    Lag {
        name: String,
        periods: i64,
        expr: Arc<CompiledExpr>,
    },
    Operator(Operator),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(v) => write!(f, "{}", v),
            Node::Column(name) => f.write_str(name),
            Node::Indicator(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", call.name, args.join(","))
            }
            Node::Variable { name, .. } => f.write_str(name),
            Node::Lag { name, periods, .. } => write!(f, "{}.shift({})", name, periods),
            Node::Operator(op) => write!(f, "{}", op),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    rpn: Vec<Node>,
}

impl CompiledExpr {
    pub fn new(source: impl Into<String>, rpn: Vec<Node>) -> Self {
        Self {
            source: source.into(),
            rpn,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rpn(&self) -> &[Node] {
        &self.rpn
    }

    /// Check that the sequence reduces to exactly one value without touching data.
    pub fn check_arity(&self) -> Result<(), EvalError> {
        let mut depth = 0usize;
        for node in &self.rpn {
            match node {
                Node::Operator(_) => {
                    if depth < 2 {
                        return Err(EvalError::InvalidExpression { values: depth });
                    }
                    depth -= 1;
                }
                _ => depth += 1,
            }
        }
        if depth != 1 {
            return Err(EvalError::InvalidExpression { values: depth });
        }
        Ok(())
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.rpn.iter().map(|n| n.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}
