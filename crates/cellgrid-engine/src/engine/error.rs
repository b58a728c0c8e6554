//! Error types for formula parsing and evaluation.

use thiserror::Error;

use super::position::Position;

/// Errors raised while turning cell input into an expression tree.
///
/// A parse error rejects the whole edit: the cell keeps its previous content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} takes {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Unexpected {found} at offset {offset}")]
    UnexpectedToken { offset: usize, found: String },

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("Unknown function code: {0}")]
    UnknownFunctionCode(i8),
}

/// Errors raised while evaluating an expression.
///
/// These never leave the evaluator: they collapse to `Value::Undefined`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    #[error("Operand type mismatch")]
    TypeMismatch,

    #[error("Division by zero")]
    DivideByZero,

    #[error("Range used as a value")]
    RangeAsValue,

    #[error("Expected a range argument")]
    ExpectedRange,
}

/// Evaluation stopped at cells whose values are not available yet.
///
/// `cells` lists them in the order they were read; compute them and
/// evaluate again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Evaluation is waiting on {} cell(s)", .cells.len())]
pub struct Blocked {
    pub cells: Vec<Position>,
}
