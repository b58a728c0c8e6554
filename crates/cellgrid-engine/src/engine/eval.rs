//! Expression evaluation.
//!
//! The evaluator walks an [`Expr`] with an explicit task stack and asks a
//! [`CellResolver`] for the values of referenced cells. Every failure inside
//! the walk (type mismatch, division by zero, a range used as a scalar) is an
//! [`EvalError`] that collapses to [`Value::Undefined`] at the node where it
//! happened.
//!
//! A resolver may answer `None` for a cell it has not computed yet. The walk
//! then stops with [`Blocked`], listing the cells to compute before retrying.

use serde::{Deserialize, Serialize};

use super::cell_ref::CellRange;
use super::error::{Blocked, EvalError};
use super::expr::{Call, Expr, FunctionKind};
use super::format::number_to_text;
use super::position::Position;
use super::value::Value;
use crate::builtins::{count_defined, count_equal, fold_numbers};

/// Supplies cell values to the evaluator. This is the only way evaluation
/// reaches back into the sheet.
pub trait CellResolver {
    /// Value of the cell at `pos`, or `None` if it is not available yet.
    fn resolve(&mut self, pos: Position) -> Option<Value>;
}

/// Evaluation settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Fractional digits used when `+` turns a number into text.
    pub text_precision: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions { text_precision: 6 }
    }
}

enum Task<'e> {
    /// Push the value of an expression.
    Eval(&'e Expr),
    /// Pop the evaluated operands of a call and push its result.
    Apply(&'e Call),
    /// Pop the condition of an `if` and evaluate the chosen branch.
    Branch(&'e Call),
}

enum Halt {
    Failed(EvalError),
    Blocked(Vec<Position>),
}

impl From<EvalError> for Halt {
    fn from(err: EvalError) -> Self {
        Halt::Failed(err)
    }
}

/// Walks expressions against a resolver.
pub struct Evaluator<'r, R: CellResolver + ?Sized> {
    resolver: &'r mut R,
    options: EvalOptions,
}

impl<'r, R: CellResolver + ?Sized> Evaluator<'r, R> {
    pub fn new(resolver: &'r mut R, options: EvalOptions) -> Self {
        Evaluator { resolver, options }
    }

    /// Evaluate `expr`. Internal errors become `Undefined`; the only failure
    /// is a read the resolver could not answer yet.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Blocked> {
        let mut tasks = vec![Task::Eval(expr)];
        let mut values: Vec<Value> = Vec::new();

        while let Some(task) = tasks.pop() {
            let step = match task {
                Task::Eval(expr) => match expr {
                    Expr::Empty => Ok(Value::Undefined),
                    Expr::Number(n) => Ok(Value::Number(*n)),
                    Expr::Text(s) => Ok(Value::Text(s.clone())),
                    Expr::Reference(r) => self.lookup(r.pos),
                    Expr::Range(_) => Err(Halt::Failed(EvalError::RangeAsValue)),
                    Expr::Call(call) => {
                        schedule(call, &mut tasks);
                        continue;
                    }
                },
                Task::Branch(call) => {
                    let args = call.args();
                    match values.pop().unwrap_or_default() {
                        Value::Number(cond) if cond != 0.0 => tasks.push(Task::Eval(&args[1])),
                        Value::Number(_) => tasks.push(Task::Eval(&args[2])),
                        _ => values.push(degrade(EvalError::TypeMismatch)),
                    }
                    continue;
                }
                Task::Apply(call) => {
                    let operands = values.split_off(values.len().saturating_sub(operand_count(call.kind())));
                    self.apply(call, operands)
                }
            };

            match step {
                Ok(value) => values.push(value),
                Err(Halt::Failed(err)) => values.push(degrade(err)),
                Err(Halt::Blocked(cells)) => return Err(Blocked { cells }),
            }
        }
        Ok(values.pop().unwrap_or_default())
    }

    fn lookup(&mut self, pos: Position) -> Result<Value, Halt> {
        self.resolver.resolve(pos).ok_or_else(|| Halt::Blocked(vec![pos]))
    }

    /// Result of a call whose value operands have been evaluated.
    fn apply(&mut self, call: &Call, operands: Vec<Value>) -> Result<Value, Halt> {
        let args = call.args();
        let mut operands = operands.into_iter();
        let mut next = || operands.next().unwrap_or_default();

        match call.kind() {
            FunctionKind::Sum => {
                let values = self.range_values(&args[0])?;
                Ok(fold_numbers(values, 0.0, |acc, n| acc + n))
            }
            FunctionKind::Min => {
                let values = self.range_values(&args[0])?;
                Ok(fold_numbers(values, f64::INFINITY, f64::min))
            }
            FunctionKind::Max => {
                let values = self.range_values(&args[0])?;
                Ok(fold_numbers(values, f64::NEG_INFINITY, f64::max))
            }
            FunctionKind::Count => {
                let values = self.range_values(&args[0])?;
                Ok(count_defined(values))
            }
            FunctionKind::CountEqual => {
                let needle = next();
                let values = self.range_values(&args[1])?;
                Ok(count_equal(&needle, values))
            }
            // Scheduled through `Task::Branch`.
            FunctionKind::If => Err(EvalError::TypeMismatch.into()),
            FunctionKind::Neg => match next() {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(EvalError::TypeMismatch.into()),
            },
            FunctionKind::Add => Ok(add(next(), next(), self.options.text_precision)),
            FunctionKind::Sub => numeric(next(), next(), |a, b| Ok(a - b)),
            FunctionKind::Mul => numeric(next(), next(), |a, b| Ok(a * b)),
            FunctionKind::Pow => numeric(next(), next(), |a, b| Ok(a.powf(b))),
            FunctionKind::Div => numeric(next(), next(), |a, b| {
                if b.abs() == 0.0 {
                    Err(EvalError::DivideByZero)
                } else {
                    Ok(a / b)
                }
            }),
            kind @ (FunctionKind::Lt
            | FunctionKind::Le
            | FunctionKind::Gt
            | FunctionKind::Ge
            | FunctionKind::Ne
            | FunctionKind::Eq) => compare(kind, next(), next()),
        }
    }

    /// Values of every cell in a range argument.
    ///
    /// Cells the resolver cannot answer yet are all reported together, in
    /// reading order.
    fn range_values(&mut self, arg: &Expr) -> Result<Vec<Value>, Halt> {
        let Expr::Range(range) = arg else {
            return Err(EvalError::ExpectedRange.into());
        };
        self.collect_range(range)
    }

    fn collect_range(&mut self, range: &CellRange) -> Result<Vec<Value>, Halt> {
        let mut values = Vec::new();
        let mut pending = Vec::new();
        for pos in range.positions() {
            match self.resolver.resolve(pos) {
                Some(value) => values.push(value),
                None => pending.push(pos),
            }
        }
        if pending.is_empty() {
            Ok(values)
        } else {
            Err(Halt::Blocked(pending))
        }
    }
}

/// Queue the evaluation of a call: operands first (leftmost on top), then
/// the call itself.
fn schedule<'e>(call: &'e Call, tasks: &mut Vec<Task<'e>>) {
    let args = call.args();
    match call.kind() {
        FunctionKind::If => {
            tasks.push(Task::Branch(call));
            tasks.push(Task::Eval(&args[0]));
        }
        kind => {
            tasks.push(Task::Apply(call));
            let count = operand_count(kind);
            tasks.extend(args[..count].iter().rev().map(Task::Eval));
        }
    }
}

/// Leading arguments evaluated to values before a call is applied. Range
/// arguments are read by the call itself.
fn operand_count(kind: FunctionKind) -> usize {
    match kind {
        FunctionKind::Sum | FunctionKind::Count | FunctionKind::Min | FunctionKind::Max => 0,
        FunctionKind::CountEqual => 1,
        kind => kind.arity(),
    }
}

fn degrade(err: EvalError) -> Value {
    tracing::trace!(error = %err, "evaluation degraded to undefined");
    Value::Undefined
}

/// Both operands must be numbers; anything else yields `Undefined`.
fn numeric<F>(a: Value, b: Value, op: F) -> Result<Value, Halt>
where
    F: FnOnce(f64, f64) -> Result<f64, EvalError>,
{
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(a, b)?)),
        (Value::Undefined, _) | (_, Value::Undefined) => Ok(Value::Undefined),
        _ => Err(EvalError::TypeMismatch.into()),
    }
}

/// Numeric addition, or concatenation when either side is text.
fn add(a: Value, b: Value, precision: usize) -> Value {
    let as_text = |value: Value| match value {
        Value::Text(s) => Some(s),
        Value::Number(n) => Some(number_to_text(n, precision)),
        Value::Undefined => None,
    };

    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
        (a @ Value::Text(_), b) | (a, b @ Value::Text(_)) => match (as_text(a), as_text(b)) {
            (Some(a), Some(b)) => Value::Text(a + &b),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Compare two numbers or two texts; the result is `1` or `0`.
fn compare(kind: FunctionKind, a: Value, b: Value) -> Result<Value, Halt> {
    let holds = match (&a, &b) {
        (Value::Number(a), Value::Number(b)) => compare_with(kind, a, b),
        (Value::Text(a), Value::Text(b)) => compare_with(kind, a, b),
        _ => return Err(EvalError::TypeMismatch.into()),
    };
    Ok(Value::Number(if holds { 1.0 } else { 0.0 }))
}

fn compare_with<T: PartialOrd + ?Sized>(kind: FunctionKind, a: &T, b: &T) -> bool {
    match kind {
        FunctionKind::Lt => a < b,
        FunctionKind::Le => a <= b,
        FunctionKind::Gt => a > b,
        FunctionKind::Ge => a >= b,
        FunctionKind::Ne => a != b,
        _ => a == b,
    }
}

/// Evaluate `expr` against `resolver` with the given options.
pub fn evaluate<R: CellResolver + ?Sized>(
    expr: &Expr,
    resolver: &mut R,
    options: EvalOptions,
) -> Result<Value, Blocked> {
    Evaluator::new(resolver, options).evaluate(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MAX_DEPTH, parse_expr};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapResolver {
        cells: HashMap<Position, Value>,
        reads: Vec<Position>,
    }

    impl MapResolver {
        fn with(mut self, cell: &str, value: impl Into<Value>) -> Self {
            self.cells.insert(cell.parse().unwrap(), value.into());
            self
        }
    }

    impl CellResolver for MapResolver {
        fn resolve(&mut self, pos: Position) -> Option<Value> {
            self.reads.push(pos);
            Some(self.cells.get(&pos).cloned().unwrap_or_default())
        }
    }

    /// Answers only the cells it holds; every other read is pending.
    struct Partial(HashMap<Position, Value>);

    impl CellResolver for Partial {
        fn resolve(&mut self, pos: Position) -> Option<Value> {
            self.0.get(&pos).cloned()
        }
    }

    fn pos(text: &str) -> Position {
        text.parse().unwrap()
    }

    fn eval_with(resolver: &mut MapResolver, formula: &str) -> Value {
        let expr = parse_expr(formula).unwrap();
        evaluate(&expr, resolver, EvalOptions::default()).unwrap()
    }

    fn eval(formula: &str) -> Value {
        eval_with(&mut MapResolver::default(), formula)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("=1+2*3"), Value::Number(7.0));
        assert_eq!(eval("=2^10"), Value::Number(1024.0));
        assert_eq!(eval("=-3-4"), Value::Number(-7.0));
        assert_eq!(eval("=7/2"), Value::Number(3.5));
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        assert_eq!(eval("=1/0"), Value::Undefined);
        assert_eq!(eval("=1/(0-0)"), Value::Undefined);
    }

    #[test]
    fn test_undefined_operands() {
        assert_eq!(eval("=A1+1"), Value::Undefined);
        assert_eq!(eval("=A1*2"), Value::Undefined);
        assert_eq!(eval("=-A1"), Value::Undefined);
        assert_eq!(eval("=\"a\"+A1"), Value::Undefined);
    }

    #[test]
    fn test_text_arithmetic_is_undefined() {
        assert_eq!(eval("=\"a\"*2"), Value::Undefined);
        assert_eq!(eval("=\"a\"-\"b\""), Value::Undefined);
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(eval("=\"a\"+5"), Value::from("a5.000000"));
        assert_eq!(eval("=5+\"a\""), Value::from("5.000000a"));
        assert_eq!(eval("=\"ab\"+\"cd\""), Value::from("abcd"));

        let expr = parse_expr("=\"x\"+1.5").unwrap();
        let options = EvalOptions { text_precision: 2 };
        assert_eq!(
            evaluate(&expr, &mut MapResolver::default(), options).unwrap(),
            Value::from("x1.50")
        );
    }

    #[test]
    fn test_comparisons() {
        let mut cells = MapResolver::default()
            .with("A1", 10.0)
            .with("A2", 10.0)
            .with("A3", 11.0);
        assert_eq!(eval_with(&mut cells, "=A1 < A2"), Value::Number(0.0));
        assert_eq!(eval_with(&mut cells, "=A1 <= A2"), Value::Number(1.0));
        assert_eq!(eval_with(&mut cells, "=A1 = A2"), Value::Number(1.0));
        assert_eq!(eval_with(&mut cells, "=A1 <> A3"), Value::Number(1.0));
        assert_eq!(eval_with(&mut cells, "=A1 >= A3"), Value::Number(0.0));
        assert_eq!(eval_with(&mut cells, "=A3 > A1"), Value::Number(1.0));
    }

    #[test]
    fn test_text_comparison_and_mismatch() {
        assert_eq!(eval("=\"abc\" < \"abd\""), Value::Number(1.0));
        assert_eq!(eval("=\"b\" > \"abc\""), Value::Number(1.0));
        assert_eq!(eval("=\"a\" = 1"), Value::Undefined);
        assert_eq!(eval("=A1 = A1"), Value::Undefined);
    }

    #[test]
    fn test_aggregates() {
        let mut cells = MapResolver::default()
            .with("A1", 3.0)
            .with("A2", "text")
            .with("A3", -2.0)
            .with("B1", 10.0);
        assert_eq!(eval_with(&mut cells, "=sum(A1:B3)"), Value::Number(11.0));
        assert_eq!(eval_with(&mut cells, "=min(A1:B3)"), Value::Number(-2.0));
        assert_eq!(eval_with(&mut cells, "=max(A1:B3)"), Value::Number(10.0));
        assert_eq!(eval_with(&mut cells, "=count(A1:B3)"), Value::Number(4.0));
    }

    #[test]
    fn test_aggregates_over_non_numeric_ranges() {
        let mut cells = MapResolver::default().with("A1", "x").with("A2", "y");
        assert_eq!(eval_with(&mut cells, "=sum(A1:A3)"), Value::Undefined);
        assert_eq!(eval_with(&mut cells, "=min(A1:A3)"), Value::Undefined);
        assert_eq!(eval_with(&mut cells, "=max(A1:A3)"), Value::Undefined);
        assert_eq!(eval_with(&mut cells, "=count(C1:C3)"), Value::Number(0.0));
        // Text is a value, so it is counted.
        assert_eq!(eval_with(&mut cells, "=count(A1:A3)"), Value::Number(2.0));
    }

    #[test]
    fn test_countval() {
        let mut cells = MapResolver::default()
            .with("A1", 1.0)
            .with("A2", "1")
            .with("A3", 1.0);
        assert_eq!(eval_with(&mut cells, "=countval(1, A1:A4)"), Value::Number(2.0));
        assert_eq!(eval_with(&mut cells, "=countval(\"1\", A1:A4)"), Value::Number(1.0));
        assert_eq!(eval_with(&mut cells, "=countval(A9, A1:A4)"), Value::Number(1.0));
    }

    #[test]
    fn test_if_short_circuits() {
        let mut cells = MapResolver::default();
        assert_eq!(eval_with(&mut cells, "=if(1, B1, C1)"), Value::Undefined);
        assert_eq!(cells.reads, vec![pos("B1")]);

        assert_eq!(eval("=if(0, 1, 2)"), Value::Number(2.0));
        assert_eq!(eval("=if(\"yes\", 1, 2)"), Value::Undefined);
        assert_eq!(eval("=if(A1, 1, 2)"), Value::Undefined);
    }

    #[test]
    fn test_range_misuse() {
        assert_eq!(eval("=A1:B2"), Value::Undefined);
        assert_eq!(eval("=A1:B2+1"), Value::Undefined);
        assert_eq!(eval("=sum(A1)"), Value::Undefined);
    }

    #[test]
    fn test_nan_comparisons_are_false() {
        let mut cells = MapResolver::default().with("A1", f64::NAN);
        assert_eq!(eval_with(&mut cells, "=A1 = A1"), Value::Number(0.0));
        assert_eq!(eval_with(&mut cells, "=A1 < 1"), Value::Number(0.0));
        assert_eq!(eval_with(&mut cells, "=A1 <> A1"), Value::Number(1.0));
    }

    #[test]
    fn test_evaluation_order_is_left_to_right() {
        let mut cells = MapResolver::default();
        eval_with(&mut cells, "=A1*(B1-C1)+countval(D1, E1:E2)");
        let expected: Vec<Position> = ["A1", "B1", "C1", "D1", "E1", "E2"].into_iter().map(pos).collect();
        assert_eq!(cells.reads, expected);
    }

    #[test]
    fn test_blocked_read_stops_evaluation() {
        let mut partial = Partial(HashMap::from([(pos("A1"), Value::Number(1.0))]));
        let expr = parse_expr("=A1+B1+C1").unwrap();
        let blocked = evaluate(&expr, &mut partial, EvalOptions::default()).unwrap_err();
        assert_eq!(blocked.cells, vec![pos("B1")]);

        partial.0.insert(pos("B1"), Value::Number(2.0));
        partial.0.insert(pos("C1"), Value::Number(3.0));
        assert_eq!(
            evaluate(&expr, &mut partial, EvalOptions::default()),
            Ok(Value::Number(6.0))
        );
    }

    #[test]
    fn test_blocked_range_reports_every_pending_cell() {
        let mut partial = Partial(HashMap::from([(pos("A2"), Value::Number(1.0))]));
        let expr = parse_expr("=sum(A1:A4)").unwrap();
        let blocked = evaluate(&expr, &mut partial, EvalOptions::default()).unwrap_err();
        assert_eq!(blocked.cells, vec![pos("A1"), pos("A3"), pos("A4")]);
    }

    #[test]
    fn test_untaken_branch_never_blocks() {
        let mut partial = Partial(HashMap::new());
        let expr = parse_expr("=if(0, B1, 7)").unwrap();
        assert_eq!(
            evaluate(&expr, &mut partial, EvalOptions::default()),
            Ok(Value::Number(7.0))
        );
    }

    #[test]
    fn test_tree_at_depth_limit_evaluates() {
        let formula = format!("=1{}", "+1".repeat(MAX_DEPTH - 1));
        let expr = parse_expr(&formula).unwrap();
        assert_eq!(expr.depth(), MAX_DEPTH);
        assert_eq!(eval(&formula), Value::Number(MAX_DEPTH as f64));

        let nested = format!("={}1{}", "if(1, ".repeat(100), ", 0)".repeat(100));
        assert_eq!(eval(&nested), Value::Number(1.0));
    }
}
