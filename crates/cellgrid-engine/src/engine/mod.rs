//! Spreadsheet engine API.
//!
//! This module provides the formula side of the spreadsheet:
//!
//! - [`Position`], [`CellRef`], [`CellRange`] - Coordinates and A1 notation
//! - [`Expr`], [`Call`], [`FunctionKind`] - Expression trees
//! - [`ExprBuilder`], [`StackBuilder`] - Postfix tree construction
//! - [`parse_input`], [`parse_expr`] - Cell input and formula parsing
//! - [`Evaluator`], [`CellResolver`], [`Blocked`] - Evaluation against a value source
//! - [`Cell`], [`Value`] - Stored cells and computed values
//! - [`format_number`] - Format values for display

mod builder;
mod cell;
mod cell_ref;
mod error;
mod eval;
mod expr;
mod format;
mod parser;
mod position;
mod value;

pub use builder::{ExprBuilder, MAX_DEPTH, StackBuilder};
pub use cell::Cell;
pub use cell_ref::{CellRange, CellRef};
pub use error::{Blocked, EvalError, ParseError};
pub use eval::{CellResolver, EvalOptions, Evaluator, evaluate};
pub use expr::{Call, Expr, FunctionKind};
pub use format::{format_number, number_literal, number_to_text};
pub use parser::{MAX_NESTING, parse_expr, parse_formula, parse_input, parse_number_literal};
pub use position::Position;
pub use value::Value;
