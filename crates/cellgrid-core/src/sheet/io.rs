use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::{DependencyGraph, Spreadsheet};
use crate::error::{Result, SheetError};
use crate::storage;
use cellgrid_engine::engine::{Cell, Position};

impl Spreadsheet {
    /// Encode the spreadsheet in the binary storage format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        storage::encode(
            self.cells.iter().map(|(pos, cell)| (*pos, cell.expr())),
            self.graph.iter(),
        )
    }

    /// Write the spreadsheet to `writer`.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(
            cells = self.cells.len(),
            edges = self.graph.len(),
            bytes = bytes.len(),
            "saved spreadsheet"
        );
        Ok(())
    }

    /// Replace the contents with a spreadsheet read from `reader`.
    ///
    /// The data is fully validated first; on error nothing changes.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.load_bytes(&bytes)
    }

    /// Like [`Spreadsheet::load`], from an in-memory buffer.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let (cells, graph) = self
            .restore(bytes)
            .inspect_err(|err| warn!(error = %err, "rejected spreadsheet data"))?;
        debug!(cells = cells.len(), edges = graph.len(), "loaded spreadsheet");
        self.cells = cells;
        self.graph = graph;
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        self.load_bytes(&bytes)
    }

    /// Decode and validate without touching `self`. Every loaded cell is dirty.
    fn restore(&self, bytes: &[u8]) -> Result<(BTreeMap<Position, Cell>, DependencyGraph)> {
        let snapshot = storage::decode(bytes)?;

        let mut cells = BTreeMap::new();
        let mut graph = DependencyGraph::new();
        for (pos, expr) in snapshot.cells {
            self.check_range_budget(&expr)
                .map_err(|err| SheetError::Corrupt(format!("cell {pos}: {err}")))?;
            if let Some(reference) = expr.off_grid_reference() {
                return Err(SheetError::Corrupt(format!(
                    "cell {pos} references {reference}, outside the grid"
                )));
            }
            graph.link(pos, &expr);
            if cells.insert(pos, Cell::new(expr)).is_some() {
                return Err(SheetError::Corrupt(format!("cell {pos} is stored twice")));
            }
        }

        let edge_count = snapshot.edges.len();
        let stored: DependencyGraph = snapshot.edges.into_iter().collect();
        if stored.len() != edge_count {
            return Err(SheetError::Corrupt("duplicate dependency edges".to_string()));
        }
        if stored != graph {
            return Err(SheetError::Corrupt(
                "dependency edges do not match the stored formulas".to_string(),
            ));
        }
        Ok((cells, graph))
    }
}
