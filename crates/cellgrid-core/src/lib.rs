//! cellgrid-core - Spreadsheet model, recalculation and storage.

pub mod config;
pub mod error;
pub mod sheet;
pub mod storage;

pub use config::SheetConfig;
pub use error::{Result, SheetError};
pub use sheet::{DependencyGraph, Spreadsheet};

pub use cellgrid_engine::engine::{Position, Value};
