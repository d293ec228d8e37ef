//! Domain error types.

use std::fmt;

/// What went wrong while compiling an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    MismatchedParentheses,
    UnknownToken(String),
    UnknownIndicator(String),
    InvalidArgument { function: String, argument: String },
    MalformedCall(String),
    UnknownVariable(String),
    InvalidShift(String),
    EmptyExpression,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::MismatchedParentheses => write!(f, "mismatched parentheses"),
            CompileErrorKind::UnknownToken(t) => write!(f, "unknown token: {}", t),
            CompileErrorKind::UnknownIndicator(name) => {
                write!(f, "unknown indicator function: {}", name)
            }
            CompileErrorKind::InvalidArgument { function, argument } => {
                write!(f, "invalid argument '{}' for {}", argument, function)
            }
            CompileErrorKind::MalformedCall(t) => write!(f, "malformed call: {}", t),
            CompileErrorKind::UnknownVariable(name) => {
                write!(f, "unknown variable for shift: {}", name)
            }
            CompileErrorKind::InvalidShift(t) => write!(f, "invalid shift period in {}", t),
            CompileErrorKind::EmptyExpression => write!(f, "empty expression"),
        }
    }
}

/// A compile error with the byte offset of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("compile error at position {position}: {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub position: usize,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, position: usize) -> Self {
        Self { kind, position }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("invalid expression: reduced to {values} values instead of one")]
    InvalidExpression { values: usize },

    #[error("operator {op} cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("column {name} is not bound in this frame")]
    UnboundColumn { name: String },

    #[error("column length mismatch: expected {expected} rows, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("indicator {name} failed: {reason}")]
    Indicator { name: String, reason: String },

    #[error("condition must evaluate to a boolean column, got {found}")]
    NotBoolean { found: &'static str },
}

/// Either stage of turning expression text into a column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl ExprError {
    /// Render with a caret for compile errors, plain message otherwise.
    pub fn display_with_context(&self, input: &str) -> String {
        match self {
            ExprError::Compile(e) => e.display_with_context(input),
            ExprError::Eval(e) => format!("{input}\n{e}"),
        }
    }
}

/// Top-level error type for samscan.
#[derive(Debug, thiserror::Error)]
pub enum SamscanError {
    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("data source error for {ticker}: {reason}")]
    DataSource { ticker: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid expression in {context}: {source}")]
    Expression {
        context: String,
        #[source]
        source: ExprError,
    },

    #[error("no watchlist stored for strategy {strategy_id}; run the first scan first")]
    WatchlistMissing { strategy_id: i64 },

    #[error("empty ticker universe")]
    EmptyUniverse,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SamscanError {
    pub fn expression(context: impl Into<String>, source: impl Into<ExprError>) -> Self {
        SamscanError::Expression {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Process exit status reported by the CLI for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            SamscanError::Io(_) => 1,
            SamscanError::ConfigParse { .. }
            | SamscanError::ConfigMissing { .. }
            | SamscanError::ConfigInvalid { .. } => 2,
            SamscanError::Storage { .. } => 3,
            SamscanError::Expression { .. } => 4,
            SamscanError::DataSource { .. }
            | SamscanError::WatchlistMissing { .. }
            | SamscanError::EmptyUniverse => 5,
        }
    }
}

impl From<&SamscanError> for std::process::ExitCode {
    fn from(err: &SamscanError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
