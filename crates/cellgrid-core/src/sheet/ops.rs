use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::Spreadsheet;
use crate::error::{Result, SheetError};
use cellgrid_engine::engine::{Cell, Expr, Position};

/// A `width x height` block anchored at its top-left position.
#[derive(Clone, Copy, Debug)]
struct Rect {
    col: i64,
    row: i64,
    width: i64,
    height: i64,
}

impl Rect {
    fn new(origin: Position, width: u32, height: u32) -> Self {
        Rect {
            col: i64::from(origin.col),
            row: i64::from(origin.row),
            width: i64::from(width),
            height: i64::from(height),
        }
    }

    fn contains(&self, pos: Position) -> bool {
        let dc = i64::from(pos.col) - self.col;
        let dr = i64::from(pos.row) - self.row;
        (0..self.width).contains(&dc) && (0..self.height).contains(&dr)
    }
}

fn shifted(pos: Position, dc: i64, dr: i64) -> Option<Position> {
    Position::checked(i64::from(pos.col) + dc, i64::from(pos.row) + dr)
}

impl Spreadsheet {
    /// Set a cell from input text (`=` formula, number or text).
    ///
    /// On error the spreadsheet is left unchanged.
    pub fn set_cell(&mut self, pos: Position, input: &str) -> Result<()> {
        let cell = Cell::from_input(input)?;
        self.check_range_budget(cell.expr())?;
        self.install(pos, cell);
        Ok(())
    }

    /// Remove the cell at `pos`. Returns whether there was one.
    pub fn clear_cell(&mut self, pos: Position) -> bool {
        let Some(old) = self.cells.remove(&pos) else {
            return false;
        };
        self.graph.unlink(pos, old.expr());
        debug!(%pos, "cleared cell");
        self.invalidate(pos);
        true
    }

    /// Copy `src` to `dst`, shifting relative references by the distance
    /// between them. Copying an empty position clears `dst`.
    ///
    /// A copy whose shifted references would leave the grid (column before
    /// `A` or row below 0) is rejected and nothing changes.
    pub fn copy_cell(&mut self, src: Position, dst: Position) -> Result<()> {
        if src == dst {
            return Ok(());
        }
        let Some(mut cell) = self.cells.get(&src).cloned() else {
            self.clear_cell(dst);
            return Ok(());
        };
        let (dx, dy) = src.offset_to(dst);
        let moved = cell.apply_relative_offset(dx, dy);
        trace!(%src, %dst, moved, "copying cell");
        self.check_copy(dst, &cell)?;
        self.install(dst, cell);
        Ok(())
    }

    /// Copy the `width x height` block at `src` onto the block at `dst`.
    ///
    /// Every source cell is read before any destination is written, so
    /// overlapping blocks copy as if from a snapshot. Destination positions
    /// whose source is empty are cleared. Positions that would fall outside
    /// the coordinate range are skipped. If any copied formula would exceed
    /// the range limit or reference a cell off the grid nothing is changed.
    pub fn copy_rect(&mut self, dst: Position, src: Position, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || src == dst {
            return Ok(());
        }
        let src_rect = Rect::new(src, width, height);
        let dst_rect = Rect::new(dst, width, height);
        let dc = i64::from(dst.col) - i64::from(src.col);
        let dr = i64::from(dst.row) - i64::from(src.row);
        let (dx, dy) = src.offset_to(dst);

        let mut copies = Vec::new();
        for (&from, cell) in self.cells.iter().filter(|(pos, _)| src_rect.contains(**pos)) {
            let Some(to) = shifted(from, dc, dr) else {
                continue;
            };
            let mut cell = cell.clone();
            cell.apply_relative_offset(dx, dy);
            self.check_copy(to, &cell)?;
            copies.push((to, cell));
        }

        let cleared: Vec<Position> = self
            .cells
            .keys()
            .copied()
            .filter(|&pos| dst_rect.contains(pos))
            .filter(|&pos| shifted(pos, -dc, -dr).is_some_and(|from| !self.cells.contains_key(&from)))
            .collect();

        debug!(
            %dst,
            %src,
            width,
            height,
            copied = copies.len(),
            cleared = cleared.len(),
            "copying block"
        );
        for pos in cleared {
            self.clear_cell(pos);
        }
        for (pos, cell) in copies {
            self.install(pos, cell);
        }
        Ok(())
    }

    pub(crate) fn check_range_budget(&self, expr: &Expr) -> Result<()> {
        let cells = expr.range_cells();
        let limit = self.config.max_range_cells;
        if cells > limit {
            return Err(SheetError::RangeTooLarge { cells, limit });
        }
        Ok(())
    }

    /// Checks a shifted copy headed for `to`.
    fn check_copy(&self, to: Position, cell: &Cell) -> Result<()> {
        if let Some(reference) = cell.expr().off_grid_reference() {
            return Err(SheetError::ReferenceOffGrid { cell: to, reference });
        }
        self.check_range_budget(cell.expr())
    }

    /// Replace the cell at `pos`, rewire its edges and invalidate readers.
    fn install(&mut self, pos: Position, cell: Cell) {
        if let Some(old) = self.cells.get(&pos) {
            self.graph.unlink(pos, old.expr());
        }
        let edges = self.graph.link(pos, cell.expr());
        debug!(%pos, edges, "installed cell");
        self.cells.insert(pos, cell);
        self.invalidate(pos);
    }

    /// Mark `pos` and everything that (transitively) reads it dirty.
    fn invalidate(&mut self, pos: Position) {
        let mut to_process = vec![pos];
        let mut visited = BTreeSet::new();
        while let Some(current) = to_process.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(cell) = self.cells.get_mut(&current) {
                cell.mark_dirty();
                trace!(pos = %current, "marked dirty");
            }
            to_process.extend(self.graph.dependents(current));
        }
    }
}
