use std::sync::Arc;

use super::error::ParseError;
use super::expr::Expr;
use super::format::number_literal;
use super::parser::{parse_expr, parse_number_literal};
use super::value::Value;

/// One occupied grid slot: its expression plus a cached value.
///
/// A dirty cell's cached value is stale and must be recomputed before use.
/// The expression is shared so that evaluation can hold it while the owning
/// map is borrowed mutably.
#[derive(Clone, Debug)]
pub struct Cell {
    expr: Arc<Expr>,
    value: Value,
    dirty: bool,
}

impl Cell {
    /// A new cell starts dirty.
    pub fn new(expr: Expr) -> Cell {
        Cell {
            expr: Arc::new(expr),
            value: Value::Undefined,
            dirty: true,
        }
    }

    /// Parse user input into a cell.
    pub fn from_input(input: &str) -> Result<Cell, ParseError> {
        parse_expr(input).map(Cell::new)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn shared_expr(&self) -> Arc<Expr> {
        Arc::clone(&self.expr)
    }

    /// Cached value; stale while the cell is dirty.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Cache a freshly computed value and mark the cell clean.
    pub fn store(&mut self, value: Value) {
        self.value = value;
        self.dirty = false;
    }

    /// Shift relative references by `(dx, dy)`. Returns true (and marks the
    /// cell dirty) if anything moved.
    pub fn apply_relative_offset(&mut self, dx: i32, dy: i32) -> bool {
        if dx == 0 && dy == 0 {
            return false;
        }
        let moved = Arc::make_mut(&mut self.expr).apply_relative_offset(dx, dy);
        if moved {
            self.dirty = true;
        }
        moved
    }

    /// Input text that parses back to an equivalent expression.
    pub fn to_input_string(&self) -> String {
        match self.expr.as_ref() {
            Expr::Empty => String::new(),
            Expr::Number(n) => number_literal(*n).unwrap_or_else(|| format!("={}", self.expr)),
            Expr::Text(s) if s.starts_with('=') || parse_number_literal(s).is_some() => {
                format!("={}", self.expr)
            }
            Expr::Text(s) => s.clone(),
            expr => format!("={expr}"),
        }
    }
}
