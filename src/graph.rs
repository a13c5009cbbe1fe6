// graph.rs - Immutable weighted coupling graph: sparse edge-list parsing,
// deterministic lattice generation, per-node neighbor lists.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};

/// Duplicate entries whose weights differ by more than this are reported
/// as conflicting.
const WEIGHT_CONFLICT_TOL: f64 = 1e-12;

/// Regular lattice families with known critical temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeKind {
    Square,
    Triangular,
    Hexagonal,
}

impl LatticeKind {
    /// Theoretical critical temperature of the |J| = 1 ferromagnetic Ising
    /// model on this lattice.
    pub fn critical_temperature(self) -> f64 {
        match self {
            LatticeKind::Square => 2.27,
            LatticeKind::Triangular => 3.64,
            LatticeKind::Hexagonal => 1.52,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LatticeKind::Square => "square",
            LatticeKind::Triangular => "triangular",
            LatticeKind::Hexagonal => "hexagonal",
        }
    }
}

/// Warning-level conditions found while building a graph from input.
/// None of these abort construction.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphWarning {
    /// The same unordered pair was supplied more than once with different
    /// weights. The entry read last wins.
    ConflictingWeight {
        row: usize,
        col: usize,
        kept: f64,
        discarded: f64,
    },
    /// A diagonal entry was skipped; the model has no self-couplings.
    SelfLoop { node: usize },
    /// Nodes with no incident edges.
    IsolatedNodes { count: usize },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::ConflictingWeight {
                row,
                col,
                kept,
                discarded,
            } => write!(
                f,
                "conflicting weight for ({row}, {col}): kept {kept}, discarded {discarded}"
            ),
            GraphWarning::SelfLoop { node } => {
                write!(f, "ignored self-loop entry on node {node}")
            }
            GraphWarning::IsolatedNodes { count } => {
                write!(f, "{count} node(s) have no incident edges")
            }
        }
    }
}

/// Result of parsing an edge list: the graph plus anything worth reporting.
#[derive(Debug, Clone)]
pub struct ParsedGraph {
    pub graph: CouplingGraph,
    pub warnings: Vec<GraphWarning>,
}

/// Symmetric weighted adjacency over `n` nodes, immutable once built.
///
/// Neighbor lists are derived from the edge set at construction and give
/// O(degree) coupling queries.
#[derive(Debug, Clone)]
pub struct CouplingGraph {
    n: usize,
    neighbors: Vec<Vec<(usize, f64)>>,
    edge_count: usize,
    total_edge_weight: f64,
}

impl CouplingGraph {
    /// Parse the sparse `row,col,weight` edge-list format (1-based indices,
    /// `#` comments and blank lines ignored). The adjacency is symmetrized:
    /// a single `(i, j, w)` entry sets both directions. When both directions
    /// are supplied with conflicting values, the last entry wins and the
    /// conflict is reported as a warning.
    pub fn parse(text: &str) -> Result<ParsedGraph> {
        let mut edges: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut max_index = 0usize;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
            if fields.len() < 3 {
                return Err(Error::Parse {
                    line,
                    reason: format!("expected row,col,weight but found {} field(s)", fields.len()),
                });
            }

            let row = parse_index(fields[0], line, "row")?;
            let col = parse_index(fields[1], line, "col")?;
            let weight: f64 = fields[2].parse().map_err(|_| Error::Parse {
                line,
                reason: format!("unparseable weight '{}'", fields[2]),
            })?;
            if !weight.is_finite() {
                return Err(Error::Parse {
                    line,
                    reason: format!("non-finite weight '{}'", fields[2]),
                });
            }

            max_index = max_index.max(row).max(col);

            if row == col {
                warnings.push(GraphWarning::SelfLoop { node: row });
                continue;
            }
            // A zero weight carries no coupling.
            if weight == 0.0 {
                continue;
            }

            let key = ordered(row - 1, col - 1);
            if let Some(&prev) = edges.get(&key) {
                if (prev - weight).abs() > WEIGHT_CONFLICT_TOL {
                    warnings.push(GraphWarning::ConflictingWeight {
                        row,
                        col,
                        kept: weight,
                        discarded: prev,
                    });
                }
            }
            edges.insert(key, weight);
        }

        if edges.is_empty() {
            return Err(Error::EmptyEdgeList);
        }

        let graph = Self::from_weight_map(max_index, edges);
        let isolated = graph.isolated_count();
        if isolated > 0 {
            warnings.push(GraphWarning::IsolatedNodes { count: isolated });
        }
        for w in &warnings {
            warn!("{w}");
        }

        Ok(ParsedGraph { graph, warnings })
    }

    /// Build from 0-based edges over a fixed node count. Used by the lattice
    /// generators and by tests; unlike `parse`, structural problems here are
    /// hard errors.
    pub fn from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        if n == 0 {
            return Err(Error::Validation("graph has no nodes".into()));
        }
        let mut map = BTreeMap::new();
        for &(i, j, w) in edges {
            if i == j {
                return Err(Error::Validation(format!("self-loop on node {i}")));
            }
            if i >= n || j >= n {
                return Err(Error::Validation(format!(
                    "edge ({i}, {j}) outside node range 0..{n}"
                )));
            }
            if !w.is_finite() {
                return Err(Error::Validation(format!(
                    "non-finite weight on edge ({i}, {j})"
                )));
            }
            if w != 0.0 {
                map.insert(ordered(i, j), w);
            }
        }
        Ok(Self::from_weight_map(n, map))
    }

    /// Deterministic non-periodic lattice of the given kind and linear size,
    /// unit couplings.
    pub fn lattice(kind: LatticeKind, size: usize) -> Result<Self> {
        if size < 2 {
            return Err(Error::Config(format!(
                "lattice size must be at least 2, got {size}"
            )));
        }
        let at = |r: usize, c: usize| r * size + c;
        let mut edges = Vec::new();
        for r in 0..size {
            for c in 0..size {
                match kind {
                    LatticeKind::Square => {
                        if c + 1 < size {
                            edges.push((at(r, c), at(r, c + 1), 1.0));
                        }
                        if r + 1 < size {
                            edges.push((at(r, c), at(r + 1, c), 1.0));
                        }
                    }
                    LatticeKind::Triangular => {
                        if c + 1 < size {
                            edges.push((at(r, c), at(r, c + 1), 1.0));
                        }
                        if r + 1 < size {
                            edges.push((at(r, c), at(r + 1, c), 1.0));
                        }
                        if r + 1 < size && c + 1 < size {
                            edges.push((at(r, c), at(r + 1, c + 1), 1.0));
                        }
                    }
                    LatticeKind::Hexagonal => {
                        // Brick-wall embedding of the honeycomb lattice:
                        // every horizontal bond, vertical bonds on alternating
                        // columns so no node exceeds degree 3.
                        if c + 1 < size {
                            edges.push((at(r, c), at(r, c + 1), 1.0));
                        }
                        if r + 1 < size && (r + c) % 2 == 0 {
                            edges.push((at(r, c), at(r + 1, c), 1.0));
                        }
                    }
                }
            }
        }
        Self::from_edges(size * size, &edges)
    }

    fn from_weight_map(n: usize, edges: BTreeMap<(usize, usize), f64>) -> Self {
        let mut neighbors = vec![Vec::new(); n];
        let mut total = 0.0;
        for (&(i, j), &w) in &edges {
            neighbors[i].push((j, w));
            neighbors[j].push((i, w));
            total += w;
        }
        Self {
            n,
            neighbors,
            edge_count: edges.len(),
            total_edge_weight: total,
        }
    }

    /// Number of nodes.
    #[inline(always)]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of unordered edges.
    #[inline(always)]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Sum of weights over unordered edges.
    pub fn total_edge_weight(&self) -> f64 {
        self.total_edge_weight
    }

    /// Neighbors of node `i` as `(index, weight)` pairs. O(1) access,
    /// O(degree) iteration.
    #[inline(always)]
    pub fn neighbors(&self, i: usize) -> &[(usize, f64)] {
        &self.neighbors[i]
    }

    pub fn degree(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    /// Coupling weight between `i` and `j`, if the edge exists.
    pub fn weight(&self, i: usize, j: usize) -> Option<f64> {
        self.neighbors[i]
            .iter()
            .find(|&&(k, _)| k == j)
            .map(|&(_, w)| w)
    }

    fn isolated_count(&self) -> usize {
        self.neighbors.iter().filter(|adj| adj.is_empty()).count()
    }
}

fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i < j {
        (i, j)
    } else {
        (j, i)
    }
}

fn parse_index(field: &str, line: usize, name: &str) -> Result<usize> {
    let value: i64 = field.parse().map_err(|_| Error::Parse {
        line,
        reason: format!("unparseable {name} index '{field}'"),
    })?;
    if value < 1 {
        return Err(Error::Parse {
            line,
            reason: format!("{name} index must be positive, got {value}"),
        });
    }
    Ok(value as usize)
}
