//! Postfix construction of expression trees.
//!
//! The formula parser (and the binary decoder) drive an [`ExprBuilder`]:
//! operands are pushed, and each operator pops its fixed arity and pushes a
//! single call node. [`StackBuilder`] is the tree-building implementation.

use super::cell_ref::{CellRange, CellRef};
use super::error::ParseError;
use super::expr::{Call, Expr, FunctionKind};

/// Stack-machine interface a formula parser calls back into.
pub trait ExprBuilder {
    fn push_number(&mut self, value: f64);

    fn push_text(&mut self, text: String);

    /// Push a reference given as text (`A1`, `$B$2`).
    fn push_reference(&mut self, text: &str) -> Result<(), ParseError>;

    /// Push a range given as text (`A1:B10`).
    fn push_range(&mut self, text: &str) -> Result<(), ParseError>;

    /// Pop `kind.arity()` operands and push one call node.
    fn push_call(&mut self, kind: FunctionKind) -> Result<(), ParseError>;

    /// Push a named function call (`sum`, `countval`, `if`, ...).
    fn push_function_call(&mut self, name: &str, arg_count: usize) -> Result<(), ParseError> {
        let kind = crate::builtins::lookup_function(name)
            .ok_or_else(|| ParseError::UnknownFunction(name.to_string()))?;
        if kind.arity() != arg_count {
            return Err(ParseError::ArityMismatch {
                function: name.to_string(),
                expected: kind.arity(),
                found: arg_count,
            });
        }
        self.push_call(kind)
    }

    fn op_add(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Add)
    }

    fn op_sub(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Sub)
    }

    fn op_mul(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Mul)
    }

    fn op_div(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Div)
    }

    fn op_pow(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Pow)
    }

    fn op_neg(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Neg)
    }

    fn op_eq(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Eq)
    }

    fn op_ne(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Ne)
    }

    fn op_lt(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Lt)
    }

    fn op_le(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Le)
    }

    fn op_gt(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Gt)
    }

    fn op_ge(&mut self) -> Result<(), ParseError> {
        self.push_call(FunctionKind::Ge)
    }
}

/// Deepest expression tree a [`StackBuilder`] will produce.
pub const MAX_DEPTH: usize = 1024;

/// Builds an [`Expr`] on an operand stack.
///
/// Each operand carries the depth of its subtree so that over-deep trees are
/// rejected while they are built rather than walked afterwards.
#[derive(Debug, Default)]
pub struct StackBuilder {
    stack: Vec<(Expr, usize)>,
}

impl StackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_empty(&mut self) {
        self.push_leaf(Expr::Empty);
    }

    /// Push an already-parsed reference (used when decoding).
    pub fn push_cell_ref(&mut self, cell_ref: CellRef) {
        self.push_leaf(Expr::Reference(cell_ref));
    }

    /// Push an already-parsed range (used when decoding).
    pub fn push_cell_range(&mut self, range: CellRange) {
        self.push_leaf(Expr::Range(range));
    }

    fn push_leaf(&mut self, expr: Expr) {
        self.stack.push((expr, 1));
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Take the finished tree. Exactly one operand must remain.
    pub fn finish(mut self) -> Result<Expr, ParseError> {
        match (self.stack.pop(), self.stack.is_empty()) {
            (Some((expr, _)), true) => Ok(expr),
            (None, _) => Err(ParseError::MalformedExpression(
                "no value on the stack".to_string(),
            )),
            (Some(_), false) => Err(ParseError::MalformedExpression(format!(
                "{} values left on the stack",
                self.stack.len() + 1
            ))),
        }
    }
}

impl ExprBuilder for StackBuilder {
    fn push_number(&mut self, value: f64) {
        self.push_leaf(Expr::Number(value));
    }

    fn push_text(&mut self, text: String) {
        self.push_leaf(Expr::Text(text));
    }

    fn push_reference(&mut self, text: &str) -> Result<(), ParseError> {
        self.push_leaf(Expr::Reference(text.parse()?));
        Ok(())
    }

    fn push_range(&mut self, text: &str) -> Result<(), ParseError> {
        self.push_leaf(Expr::Range(text.parse()?));
        Ok(())
    }

    fn push_call(&mut self, kind: FunctionKind) -> Result<(), ParseError> {
        let arity = kind.arity();
        if self.stack.len() < arity {
            return Err(ParseError::MalformedExpression(format!(
                "{kind:?} needs {arity} operand(s), stack has {}",
                self.stack.len()
            )));
        }
        let operands = self.stack.split_off(self.stack.len() - arity);
        let depth = 1 + operands.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        let args = operands.into_iter().map(|(expr, _)| expr).collect();
        self.stack.push((Expr::Call(Call::new(kind, args)?), depth));
        Ok(())
    }
}
