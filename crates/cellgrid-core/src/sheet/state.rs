use std::collections::BTreeMap;

use crate::config::SheetConfig;
use cellgrid_engine::engine::{Cell, Position};

use super::DependencyGraph;

/// A sparse grid of cells with dependency tracking.
///
/// Cloning a spreadsheet yields an independent copy: cells and edges are
/// deep-copied, and later edits to either side do not affect the other.
#[derive(Clone, Debug, Default)]
pub struct Spreadsheet {
    pub(crate) cells: BTreeMap<Position, Cell>,
    /// `(source, dependent)` edges derived from the cells' expressions.
    pub(crate) graph: DependencyGraph,
    pub(crate) config: SheetConfig,
}

impl Spreadsheet {
    /// Create an empty spreadsheet with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SheetConfig) -> Self {
        Spreadsheet {
            cells: BTreeMap::new(),
            graph: DependencyGraph::new(),
            config,
        }
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Number of occupied positions.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.keys().copied()
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// Editable input text for a cell; re-entering it reproduces the cell.
    pub fn contents(&self, pos: Position) -> Option<String> {
        self.cells.get(&pos).map(Cell::to_input_string)
    }

    /// Whether `pos` holds a cell whose cached value is stale.
    pub fn is_dirty(&self, pos: Position) -> bool {
        self.cells.get(&pos).is_some_and(Cell::is_dirty)
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Positions the formula at `pos` reads.
    pub fn dependencies_of(&self, pos: Position) -> Vec<Position> {
        self.graph.dependencies(pos).collect()
    }

    /// Positions whose formulas read `pos`.
    pub fn dependents_of(&self, pos: Position) -> Vec<Position> {
        self.graph.dependents(pos).collect()
    }
}
