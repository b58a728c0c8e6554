use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::Spreadsheet;
use cellgrid_engine::engine::{Cell, CellResolver, EvalOptions, Evaluator, Position, Value};

impl Spreadsheet {
    /// Current value of `pos`, recomputing it (and whatever it reads) if stale.
    ///
    /// Absent cells are `Undefined` and reading never creates a cell. A cell
    /// reached again while it is being computed reads as `Undefined`; that
    /// inner read is not cached.
    pub fn get_value(&mut self, pos: Position) -> Value {
        let options = self.config.eval;
        Recalc {
            cells: &mut self.cells,
            evaluating: BTreeSet::new(),
            options,
        }
        .value_of(pos)
    }
}

/// One recalculation pass. `evaluating` holds the cells currently being
/// computed and is empty again when the pass returns.
struct Recalc<'a> {
    cells: &'a mut BTreeMap<Position, Cell>,
    evaluating: BTreeSet<Position>,
    options: EvalOptions,
}

impl Recalc<'_> {
    /// Computes `target` with an explicit work stack.
    ///
    /// The top of the stack is evaluated against the cached values. When it
    /// reads a stale cell the evaluation is abandoned, the stale cells are
    /// pushed, and the cell is evaluated again once they are clean. Cells
    /// below the top stay in `evaluating`, so the reads a cycle makes come
    /// back as `Undefined` exactly as a nested computation would see them.
    fn value_of(&mut self, target: Position) -> Value {
        let mut stack = vec![target];
        while let Some(&pos) = stack.last() {
            let expr = match self.cells.get(&pos) {
                Some(cell) if cell.is_dirty() => cell.shared_expr(),
                _ => {
                    stack.pop();
                    continue;
                }
            };
            self.evaluating.insert(pos);

            let options = self.options;
            let result = Evaluator::new(self, options).evaluate(&expr);
            match result {
                Ok(value) => {
                    self.evaluating.remove(&pos);
                    if let Some(cell) = self.cells.get_mut(&pos) {
                        cell.store(value);
                    }
                    stack.pop();
                }
                Err(blocked) => {
                    trace!(%pos, waiting = blocked.cells.len(), "deferring cell");
                    stack.extend(blocked.cells.into_iter().rev());
                }
            }
        }
        self.cells
            .get(&target)
            .map(|cell| cell.value().clone())
            .unwrap_or_default()
    }
}

impl CellResolver for Recalc<'_> {
    fn resolve(&mut self, pos: Position) -> Option<Value> {
        match self.cells.get(&pos) {
            None => Some(Value::Undefined),
            Some(cell) if !cell.is_dirty() => Some(cell.value().clone()),
            Some(_) if self.evaluating.contains(&pos) => {
                trace!(%pos, "circular read");
                Some(Value::Undefined)
            }
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use crate::error::SheetError;
    use cellgrid_engine::engine::{MAX_DEPTH, ParseError};

    fn pos(text: &str) -> Position {
        text.parse().unwrap()
    }

    #[test]
    fn test_absent_cell_reads_do_not_create_cells() {
        let mut sheet = Spreadsheet::new();
        assert_eq!(sheet.get_value(pos("AAAA9999")), Value::Undefined);
        sheet.set_cell(pos("A1"), "=B7").unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::Undefined);
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn test_clean_cells_are_not_recomputed() {
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(pos("A1"), "3").unwrap();
        sheet.set_cell(pos("B1"), "=A1*A1").unwrap();
        assert!(sheet.is_dirty(pos("B1")));
        assert_eq!(sheet.get_value(pos("B1")), Value::Number(9.0));
        assert!(!sheet.is_dirty(pos("A1")));
        assert!(!sheet.is_dirty(pos("B1")));
        assert_eq!(sheet.cell(pos("B1")).unwrap().value(), &Value::Number(9.0));
    }

    #[test]
    fn test_two_cell_cycle() {
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(pos("A1"), "=B1").unwrap();
        sheet.set_cell(pos("B1"), "=A1").unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::Undefined);
        assert_eq!(sheet.get_value(pos("B1")), Value::Undefined);

        // Breaking the cycle recomputes both.
        sheet.set_cell(pos("B1"), "4").unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(4.0));
    }

    #[test]
    fn test_self_reference_through_range() {
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(pos("A1"), "2").unwrap();
        sheet.set_cell(pos("A2"), "5").unwrap();
        sheet.set_cell(pos("A3"), "=sum(A1:A3)").unwrap();
        assert_eq!(sheet.get_value(pos("A3")), Value::Number(7.0));
        assert_eq!(sheet.get_value(pos("A3")), Value::Number(7.0));
    }

    #[test]
    fn test_long_cycle_terminates() {
        const LEN: i32 = 20_000;
        let mut sheet = Spreadsheet::new();
        for row in (1..=LEN).rev() {
            let next = if row == LEN { 1 } else { row + 1 };
            sheet.set_cell(Position::new(1, row), &format!("=A{next}+1")).unwrap();
        }
        assert_eq!(sheet.get_value(pos("A1")), Value::Undefined);
        assert_eq!(sheet.get_value(pos("A25")), Value::Undefined);
        assert!(!sheet.is_dirty(Position::new(1, LEN)));
    }

    #[test]
    fn test_long_chain() {
        const LEN: i32 = 100_000;
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(Position::new(1, LEN), "0").unwrap();
        for row in (1..LEN).rev() {
            sheet.set_cell(Position::new(1, row), &format!("=A{}+1", row + 1)).unwrap();
        }
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(f64::from(LEN - 1)));
        assert!(!sheet.is_dirty(Position::new(1, LEN / 2)));

        sheet.set_cell(Position::new(1, LEN), "10").unwrap();
        assert!(sheet.is_dirty(pos("A1")));
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(f64::from(LEN + 9)));
    }

    #[test]
    fn test_long_chain_through_ranges() {
        const LEN: i32 = 20_000;
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(Position::new(1, LEN), "1").unwrap();
        for row in (1..LEN).rev() {
            sheet
                .set_cell(Position::new(1, row), &format!("=sum(A{}:B{})", row + 1, row + 1))
                .unwrap();
        }
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(1.0));
    }

    #[test]
    fn test_untaken_branch_is_not_a_cycle() {
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(pos("A1"), "=if(C1, 5, B1)").unwrap();
        sheet.set_cell(pos("B1"), "=A1*2").unwrap();
        sheet.set_cell(pos("C1"), "1").unwrap();
        assert_eq!(sheet.get_value(pos("B1")), Value::Number(10.0));
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(5.0));

        sheet.set_cell(pos("C1"), "0").unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::Undefined);
        assert_eq!(sheet.get_value(pos("B1")), Value::Undefined);
    }

    #[test]
    fn test_formula_at_depth_limit() {
        let mut sheet = Spreadsheet::new();
        sheet.set_cell(pos("A2"), "1").unwrap();
        sheet
            .set_cell(pos("A1"), &format!("=A2{}", "+1".repeat(MAX_DEPTH - 1)))
            .unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::Number(MAX_DEPTH as f64));

        let mut loaded = Spreadsheet::new();
        loaded.load_bytes(&sheet.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.get_value(pos("A1")), Value::Number(MAX_DEPTH as f64));

        let err = sheet
            .set_cell(pos("A3"), &format!("=1{}", "+1".repeat(MAX_DEPTH)))
            .unwrap_err();
        assert!(matches!(err, SheetError::Parse(ParseError::TooDeep(MAX_DEPTH))));
        assert!(sheet.cell(pos("A3")).is_none());
    }

    #[test]
    fn test_text_precision_from_config() {
        let mut config = SheetConfig::default();
        config.eval.text_precision = 1;
        let mut sheet = Spreadsheet::with_config(config);
        sheet.set_cell(pos("A1"), "=\"total: \"+B1").unwrap();
        sheet.set_cell(pos("B1"), "2.24").unwrap();
        assert_eq!(sheet.get_value(pos("A1")), Value::from("total: 2.2"));
    }
}
