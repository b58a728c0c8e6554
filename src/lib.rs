//! cellgrid - Spreadsheet evaluation engine.
//!
//! Cells hold numbers, text or `=` formulas. Formulas are parsed into
//! expression trees, dependencies between cells are tracked as edges, and
//! values are recomputed lazily when something they read has changed.
//!
//! ```
//! use cellgrid::{Position, Spreadsheet, Value};
//!
//! let mut sheet = Spreadsheet::new();
//! let a1: Position = "A1".parse().unwrap();
//! let b1: Position = "B1".parse().unwrap();
//! sheet.set_cell(a1, "20").unwrap();
//! sheet.set_cell(b1, "=A1/4").unwrap();
//! assert_eq!(sheet.get_value(b1), Value::Number(5.0));
//! ```

pub use cellgrid_core::{DependencyGraph, Result, SheetConfig, SheetError, Spreadsheet, config, storage};
pub use cellgrid_engine::engine;
pub use cellgrid_engine::engine::{
    CellRange, CellRef, EvalOptions, Expr, FunctionKind, ParseError, Position, Value, parse_expr,
};
