//! Cell coordinates and their A1 text form.
//!
//! Columns are 1-based and spelled with letters (`A` = 1, `Z` = 26,
//! `AA` = 27). Rows are taken verbatim from the digits, so `D0` is row 0.
//!
//! # Examples
//!
//! ```ignore
//! let pos: Position = "BC27".parse().unwrap();
//! assert_eq!(pos.col, 55);
//! assert_eq!(pos.row, 27);
//! assert_eq!(pos.to_string(), "BC27");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::cell_ref::CellRef;
use super::error::ParseError;

/// A (column, row) coordinate. Ordered by column, then row.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Position {
    pub col: i32,
    pub row: i32,
}

impl Position {
    /// Smallest position in the total order; used as a lower bound for range scans.
    pub const MIN: Position = Position {
        col: i32::MIN,
        row: i32::MIN,
    };

    pub const fn new(col: i32, row: i32) -> Position {
        Position { col, row }
    }

    /// Build a position from wide coordinates, or `None` if either axis
    /// does not fit in an `i32`.
    pub fn checked(col: i64, row: i64) -> Option<Position> {
        Some(Position::new(
            i32::try_from(col).ok()?,
            i32::try_from(row).ok()?,
        ))
    }

    /// Whether the position has an A1 text form: column 1 or more, row 0
    /// or more.
    pub fn is_addressable(self) -> bool {
        self.col >= 1 && self.row >= 0
    }

    /// Offset `(dx, dy)` that moves `self` onto `other`.
    pub fn offset_to(self, other: Position) -> (i32, i32) {
        (
            other.col.saturating_sub(self.col),
            other.row.saturating_sub(self.row),
        )
    }

    /// Shift by `(dx, dy)`, saturating at the `i32` bounds.
    pub fn offset(self, dx: i32, dy: i32) -> Position {
        Position::new(self.col.saturating_add(dx), self.row.saturating_add(dy))
    }

    /// Convert a column number to letters (1 -> A, 26 -> Z, 27 -> AA).
    /// Returns `None` for columns below 1, which have no letter form.
    pub fn col_to_letters(col: i32) -> Option<String> {
        if col < 1 {
            return None;
        }
        let mut result = Vec::new();
        let mut n = col as u32;
        while n > 0 {
            n -= 1;
            result.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        result.reverse();
        String::from_utf8(result).ok()
    }

    /// Convert column letters to a column number (case-insensitive).
    /// Returns `None` on empty input, non-letters, or overflow.
    pub fn letters_to_col(letters: &str) -> Option<i32> {
        if letters.is_empty() {
            return None;
        }
        let mut col: i32 = 0;
        for c in letters.bytes() {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            let digit = (c.to_ascii_uppercase() - b'A') as i32 + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        Some(col)
    }
}

impl FromStr for Position {
    type Err = ParseError;

    /// Parse a bare coordinate such as `A1`. `$` markers are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cell_ref: CellRef = s.parse()?;
        if cell_ref.col_abs || cell_ref.row_abs {
            return Err(ParseError::InvalidReference(s.to_string()));
        }
        Ok(cell_ref.pos)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Position::col_to_letters(self.col) {
            Some(letters) => write!(f, "{}{}", letters, self.row),
            None => write!(f, "R{}C{}", self.row, self.col),
        }
    }
}
