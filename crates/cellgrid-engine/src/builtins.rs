//! Named spreadsheet functions and the range folds behind them.
//!
//! Conventions:
//! - Formula-facing names are lowercase and matched case-insensitively.
//! - If you add a named function, add a `FunctionKind` variant, list it in
//!   `FUNCTION_BUILTINS`, and handle it in `Evaluator::apply`.

use crate::engine::{FunctionKind, Value};

pub struct FunctionBuiltin {
    pub name: &'static str,
    pub kind: FunctionKind,
}

pub const FUNCTION_BUILTINS: &[FunctionBuiltin] = &[
    FunctionBuiltin {
        name: "sum",
        kind: FunctionKind::Sum,
    },
    FunctionBuiltin {
        name: "count",
        kind: FunctionKind::Count,
    },
    FunctionBuiltin {
        name: "min",
        kind: FunctionKind::Min,
    },
    FunctionBuiltin {
        name: "max",
        kind: FunctionKind::Max,
    },
    FunctionBuiltin {
        name: "countval",
        kind: FunctionKind::CountEqual,
    },
    FunctionBuiltin {
        name: "if",
        kind: FunctionKind::If,
    },
];

/// Resolve a formula function name (case-insensitive).
pub fn lookup_function(name: &str) -> Option<FunctionKind> {
    FUNCTION_BUILTINS
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(name))
        .map(|b| b.kind)
}

/// Formula-facing name of a function; operators yield their symbol.
pub fn function_name(kind: FunctionKind) -> &'static str {
    FUNCTION_BUILTINS
        .iter()
        .find(|b| b.kind == kind)
        .map(|b| b.name)
        .or_else(|| kind.operator_symbol())
        .unwrap_or("?")
}

/// Fold the numeric values, skipping everything else.
/// Yields `Undefined` when no value is numeric.
pub(crate) fn fold_numbers<I, F>(values: I, init: f64, fold: F) -> Value
where
    I: IntoIterator<Item = Value>,
    F: Fn(f64, f64) -> f64,
{
    let mut acc = init;
    let mut seen = false;
    for value in values {
        if let Value::Number(n) = value {
            acc = fold(acc, n);
            seen = true;
        }
    }
    if seen { Value::Number(acc) } else { Value::Undefined }
}

/// Number of values that are not `Undefined`.
pub(crate) fn count_defined<I: IntoIterator<Item = Value>>(values: I) -> Value {
    let count = values.into_iter().filter(|v| !v.is_undefined()).count();
    Value::Number(count as f64)
}

/// Number of values equal to `needle`.
pub(crate) fn count_equal<I: IntoIterator<Item = Value>>(needle: &Value, values: I) -> Value {
    let count = values.into_iter().filter(|v| v == needle).count();
    Value::Number(count as f64)
}
