//! Spreadsheet state and logic.

mod deps;
mod eval;
mod io;
mod ops;
mod state;

pub use deps::DependencyGraph;
pub use state::Spreadsheet;
