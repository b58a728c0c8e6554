use std::collections::BTreeSet;
use std::ops::Bound;

use cellgrid_engine::engine::{Expr, Position};

/// Ordered set of `(source, dependent)` edges: `dependent` reads `source`.
///
/// Ordering by source first makes "everything that reads X" a range scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeSet<(Position, Position)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Position, dependent: Position) -> bool {
        self.edges.insert((source, dependent))
    }

    pub fn remove(&mut self, source: Position, dependent: Position) -> bool {
        self.edges.remove(&(source, dependent))
    }

    pub fn contains(&self, source: Position, dependent: Position) -> bool {
        self.edges.contains(&(source, dependent))
    }

    /// Add an edge from every position `expr` reads to `dependent`.
    /// Returns the number of sources.
    pub fn link(&mut self, dependent: Position, expr: &Expr) -> usize {
        let sources = expr.dependencies();
        let count = sources.len();
        for source in sources {
            self.edges.insert((source, dependent));
        }
        count
    }

    /// Remove the edges `link(dependent, expr)` added.
    pub fn unlink(&mut self, dependent: Position, expr: &Expr) {
        for source in expr.dependencies() {
            self.edges.remove(&(source, dependent));
        }
    }

    /// Positions whose formulas read `source`.
    pub fn dependents(&self, source: Position) -> impl Iterator<Item = Position> + '_ {
        self.edges
            .range((Bound::Included((source, Position::MIN)), Bound::Unbounded))
            .take_while(move |(from, _)| *from == source)
            .map(|&(_, dependent)| dependent)
    }

    /// Positions `dependent` reads. This is a full scan.
    pub fn dependencies(&self, dependent: Position) -> impl Iterator<Item = Position> + '_ {
        self.edges
            .iter()
            .filter(move |(_, to)| *to == dependent)
            .map(|&(source, _)| source)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges in `(source, dependent)` order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Position, Position)> + '_ {
        self.edges.iter().copied()
    }
}

impl FromIterator<(Position, Position)> for DependencyGraph {
    fn from_iter<I: IntoIterator<Item = (Position, Position)>>(iter: I) -> Self {
        DependencyGraph {
            edges: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_engine::engine::parse_expr;

    fn pos(text: &str) -> Position {
        text.parse().unwrap()
    }

    #[test]
    fn test_link_expands_ranges() {
        let mut graph = DependencyGraph::new();
        let linked = graph.link(pos("C1"), &parse_expr("=A1+sum(B1:B3)").unwrap());
        assert_eq!(linked, 4);
        assert_eq!(graph.len(), 4);
        assert!(graph.contains(pos("B2"), pos("C1")));

        let deps: Vec<_> = graph.dependencies(pos("C1")).collect();
        assert_eq!(deps, vec![pos("A1"), pos("B1"), pos("B2"), pos("B3")]);
    }

    #[test]
    fn test_dependents_scan_stops_at_source() {
        let graph: DependencyGraph = [
            (pos("A1"), pos("B1")),
            (pos("A1"), pos("C7")),
            (pos("A2"), pos("B2")),
            (pos("B1"), pos("A1")),
        ]
        .into_iter()
        .collect();

        let dependents: Vec<_> = graph.dependents(pos("A1")).collect();
        assert_eq!(dependents, vec![pos("B1"), pos("C7")]);
        assert_eq!(graph.dependents(pos("Z9")).count(), 0);
    }

    #[test]
    fn test_unlink_removes_only_own_edges() {
        let mut graph = DependencyGraph::new();
        let expr = parse_expr("=A1*2").unwrap();
        graph.link(pos("B1"), &expr);
        graph.link(pos("B2"), &expr);
        graph.unlink(pos("B1"), &expr);
        assert!(!graph.contains(pos("A1"), pos("B1")));
        assert!(graph.contains(pos("A1"), pos("B2")));
        assert!(graph.remove(pos("A1"), pos("B2")));
        assert!(graph.is_empty());
    }
}
