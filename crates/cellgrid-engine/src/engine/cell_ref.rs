//! Cell references and rectangular ranges.
//!
//! A [`CellRef`] is a [`Position`] plus independent absolute flags for each
//! axis (`$A1`, `A$1`, `$A$1`). Copying a formula shifts only the relative
//! axes. A [`CellRange`] is two references joined by `:`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::ParseError;
use super::position::Position;

fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<col_abs>\$)?(?<letters>[A-Za-z]+)(?<row_abs>\$)?(?<digits>[0-9]+)$")
            .expect("cell reference regex must compile")
    })
}

/// A reference to a cell, with per-axis absolute flags.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellRef {
    pub pos: Position,
    pub col_abs: bool,
    pub row_abs: bool,
}

impl CellRef {
    /// A fully relative reference.
    pub fn new(pos: Position) -> CellRef {
        CellRef {
            pos,
            col_abs: false,
            row_abs: false,
        }
    }

    pub fn with_flags(pos: Position, col_abs: bool, row_abs: bool) -> CellRef {
        CellRef {
            pos,
            col_abs,
            row_abs,
        }
    }

    /// Shift the relative axes by `(dx, dy)`; absolute axes stay pinned.
    /// Returns whether the referenced position changed.
    pub fn apply_relative_offset(&mut self, dx: i32, dy: i32) -> bool {
        let before = self.pos;
        if !self.col_abs {
            self.pos.col = self.pos.col.saturating_add(dx);
        }
        if !self.row_abs {
            self.pos.row = self.pos.row.saturating_add(dy);
        }
        self.pos != before
    }
}

impl From<Position> for CellRef {
    fn from(pos: Position) -> Self {
        CellRef::new(pos)
    }
}

impl FromStr for CellRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidReference(s.to_string());
        let caps = cell_ref_re().captures(s).ok_or_else(invalid)?;
        let col = Position::letters_to_col(&caps["letters"]).ok_or_else(invalid)?;
        let row = caps["digits"].parse::<i32>().map_err(|_| invalid())?;

        Ok(CellRef {
            pos: Position::new(col, row),
            col_abs: caps.name("col_abs").is_some(),
            row_abs: caps.name("row_abs").is_some(),
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col_marker = if self.col_abs { "$" } else { "" };
        let row_marker = if self.row_abs { "$" } else { "" };
        match Position::col_to_letters(self.pos.col) {
            Some(letters) => write!(f, "{col_marker}{letters}{row_marker}{}", self.pos.row),
            None => write!(f, "{}", self.pos),
        }
    }
}

/// A rectangular block of cells between two corner references (inclusive).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> CellRange {
        CellRange { start, end }
    }

    /// Iterate every covered position, row by row, both corners inclusive.
    ///
    /// A range whose start lies after its end on either axis covers nothing.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let (first_col, last_col) = (self.start.pos.col, self.end.pos.col);
        let (first_row, last_row) = (self.start.pos.row, self.end.pos.row);
        (first_row..=last_row)
            .flat_map(move |row| (first_col..=last_col).map(move |col| Position::new(col, row)))
    }

    /// Number of covered positions.
    pub fn cell_count(&self) -> u64 {
        let cols = i64::from(self.end.pos.col) - i64::from(self.start.pos.col) + 1;
        let rows = i64::from(self.end.pos.row) - i64::from(self.start.pos.row) + 1;
        if cols <= 0 || rows <= 0 {
            return 0;
        }
        (cols as u64).saturating_mul(rows as u64)
    }

    pub fn contains(&self, pos: Position) -> bool {
        (self.start.pos.col..=self.end.pos.col).contains(&pos.col)
            && (self.start.pos.row..=self.end.pos.row).contains(&pos.row)
    }

    /// Shift both corners independently. Returns whether either corner moved.
    pub fn apply_relative_offset(&mut self, dx: i32, dy: i32) -> bool {
        let start_moved = self.start.apply_relative_offset(dx, dy);
        let end_moved = self.end.apply_relative_offset(dx, dy);
        start_moved || end_moved
    }
}

impl FromStr for CellRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidRange(s.to_string());
        let (start, end) = s.split_once(':').ok_or_else(invalid)?;
        let start = start.parse::<CellRef>().map_err(|_| invalid())?;
        let end = end.parse::<CellRef>().map_err(|_| invalid())?;
        Ok(CellRange::new(start, end))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
