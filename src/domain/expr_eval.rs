//! Vectorized RPN evaluator bound to one frame.
//!
//! An `Evaluator` is built per evaluation context with the frame, the injected
//! indicator registry, and its own variable store. `evaluate` recompiles the
//! source text on every call. Variable series are memoized for the evaluator's
//! lifetime, since the frame they reduce over never changes.

use crate::domain::error::{EvalError, ExprError};
use crate::domain::expr::{CompiledExpr, IndicatorCall, Node, Operator};
use crate::domain::expr_compiler::Compiler;
use crate::domain::frame::Frame;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::series::Series;
use crate::domain::variables::VariableStore;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Absolute tolerance for `==` / `!=` on numbers.
pub const EPSILON: f64 = 1e-9;

pub struct Evaluator<'a> {
    frame: &'a Frame,
    indicators: &'a IndicatorRegistry,
    variables: VariableStore,
    /// Keyed by the sub-expression's address; the stored `Arc` pins it.
    memo: RefCell<HashMap<usize, (Arc<CompiledExpr>, Series)>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(frame: &'a Frame, indicators: &'a IndicatorRegistry) -> Self {
        Self {
            frame,
            indicators,
            variables: VariableStore::new(),
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn frame(&self) -> &Frame {
        self.frame
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn compile(&self, source: &str) -> Result<CompiledExpr, ExprError> {
        let compiler = Compiler::new(self.frame, self.indicators, &self.variables);
        Ok(compiler.compile(source)?)
    }

    /// Compile `source` and reduce it against the bound frame.
    pub fn evaluate(&self, source: &str) -> Result<Series, ExprError> {
        let compiled = self.compile(source)?;
        Ok(self.evaluate_compiled(&compiled)?)
    }

    /// Like `evaluate`, but the result must be a boolean mask.
    pub fn evaluate_condition(&self, source: &str) -> Result<Series, ExprError> {
        let result = self.evaluate(source)?;
        if result.as_bools().is_none() {
            return Err(EvalError::NotBoolean {
                found: result.type_name(),
            }
            .into());
        }
        Ok(result)
    }

    /// Compile `source` and bind it under `name` without evaluating it.
    pub fn define_variable(&mut self, name: &str, source: &str) -> Result<(), ExprError> {
        let compiled = self.compile(source)?;
        compiled.check_arity()?;
        self.variables.define(name, compiled);
        Ok(())
    }

    pub fn evaluate_compiled(&self, expr: &CompiledExpr) -> Result<Series, EvalError> {
        let mut stack: Vec<Series> = Vec::new();

        for node in expr.rpn() {
            match node {
                Node::Operator(op) => {
                    if stack.len() < 2 {
                        return Err(EvalError::InvalidExpression {
                            values: stack.len(),
                        });
                    }
                    let right = stack.pop().ok_or(EvalError::InvalidExpression { values: 0 })?;
                    let left = stack.pop().ok_or(EvalError::InvalidExpression { values: 1 })?;
                    stack.push(apply(*op, left, right)?);
                }
                operand => stack.push(self.operand(operand)?),
            }
        }

        if stack.len() != 1 {
            return Err(EvalError::InvalidExpression {
                values: stack.len(),
            });
        }
        stack.pop().ok_or(EvalError::InvalidExpression { values: 0 })
    }

    fn operand(&self, node: &Node) -> Result<Series, EvalError> {
        let rows = self.frame.len();
        let series = match node {
            Node::Literal(v) => Series::broadcast(*v, rows),
            Node::Column(name) => self
                .frame
                .column(name)
                .map(Series::numbers)
                .ok_or_else(|| EvalError::UnboundColumn { name: name.clone() })?,
            Node::Indicator(call) => self.indicator(call)?,
            Node::Variable { expr, .. } => self.variable_series(expr)?,
            Node::Lag { periods, expr, .. } => self.variable_series(expr)?.shift(*periods),
            Node::Operator(_) => return Err(EvalError::InvalidExpression { values: 0 }),
        };

        if series.len() != rows {
            return Err(EvalError::LengthMismatch {
                expected: rows,
                actual: series.len(),
            });
        }
        Ok(series)
    }

    fn variable_series(&self, expr: &Arc<CompiledExpr>) -> Result<Series, EvalError> {
        let key = Arc::as_ptr(expr) as usize;
        if let Some((_, series)) = self.memo.borrow().get(&key) {
            return Ok(series.clone());
        }
        let series = self.evaluate_compiled(expr)?;
        self.memo
            .borrow_mut()
            .insert(key, (Arc::clone(expr), series.clone()));
        Ok(series)
    }

    fn indicator(&self, call: &IndicatorCall) -> Result<Series, EvalError> {
        let transform = self
            .indicators
            .get(&call.name)
            .ok_or_else(|| EvalError::Indicator {
                name: call.name.clone(),
                reason: "not registered".to_string(),
            })?;
        let values = transform
            .compute(self.frame, &call.args)
            .map_err(|e| EvalError::Indicator {
                name: call.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(Series::Number(values))
    }
}

fn apply(op: Operator, left: Series, right: Series) -> Result<Series, EvalError> {
    if left.len() != right.len() {
        return Err(EvalError::LengthMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }

    let mismatch = |left: &Series, right: &Series| EvalError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match (&left, &right) {
        (Series::Number(l), Series::Number(r)) => Ok(match op {
            Operator::Add => Series::Number(zip_with(l, r, |a, b| a + b)),
            Operator::Sub => Series::Number(zip_with(l, r, |a, b| a - b)),
            Operator::Mul => Series::Number(zip_with(l, r, |a, b| a * b)),
            Operator::Div => Series::Number(zip_with(l, r, |a, b| a / b)),
            Operator::Gt => Series::Bool(zip_with(l, r, |a, b| a > b)),
            Operator::Ge => Series::Bool(zip_with(l, r, |a, b| a >= b)),
            Operator::Lt => Series::Bool(zip_with(l, r, |a, b| a < b)),
            Operator::Le => Series::Bool(zip_with(l, r, |a, b| a <= b)),
            Operator::Eq => Series::Bool(zip_with(l, r, |a, b| (a - b).abs() <= EPSILON)),
            Operator::Ne => Series::Bool(zip_with(l, r, |a, b| (a - b).abs() > EPSILON)),
            Operator::And | Operator::Or => return Err(mismatch(&left, &right)),
        }),
        (Series::Bool(l), Series::Bool(r)) => Ok(match op {
            Operator::And => Series::Bool(kleene(l, r, false)),
            Operator::Or => Series::Bool(kleene(l, r, true)),
            Operator::Eq => Series::Bool(zip_with(l, r, |a, b| a == b)),
            Operator::Ne => Series::Bool(zip_with(l, r, |a, b| a != b)),
            _ => return Err(mismatch(&left, &right)),
        }),
        _ => Err(mismatch(&left, &right)),
    }
}

fn zip_with<T: Copy, U>(l: &[Option<T>], r: &[Option<T>], f: impl Fn(T, T) -> U) -> Vec<Option<U>> {
    l.iter()
        .zip(r)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(f(*a, *b)),
            _ => None,
        })
        .collect()
}

/// Three-valued AND (`dominant = false`) or OR (`dominant = true`).
fn kleene(l: &[Option<bool>], r: &[Option<bool>], dominant: bool) -> Vec<Option<bool>> {
    l.iter()
        .zip(r)
        .map(|(a, b)| match (a, b) {
            (Some(x), _) | (_, Some(x)) if *x == dominant => Some(dominant),
            (Some(_), Some(_)) => Some(!dominant),
            _ => None,
        })
        .collect()
}
