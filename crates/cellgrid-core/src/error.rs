//! Error types for cellgrid core.

use thiserror::Error;

use cellgrid_engine::engine::{ParseError, Position};

/// Errors returned by spreadsheet operations.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Formula covers {cells} cells, limit is {limit}")]
    RangeTooLarge { cells: u64, limit: u64 },

    #[error("Copying into {cell} would reference {reference}, outside the grid")]
    ReferenceOffGrid { cell: Position, reference: Position },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("Corrupt spreadsheet data: {0}")]
    Corrupt(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Text in {0} contains NUL and cannot be saved")]
    Unencodable(Position),
}

pub type Result<T> = std::result::Result<T, SheetError>;
