// error.rs - Failure taxonomy for graph construction and run configuration.
//
// Cancellation of a sweep is a normal termination mode, not an error; it is
// reported through `sweep::SweepOutcome` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A malformed line or field in an edge-list input.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// An edge list that yields no usable entries at all.
    #[error("edge list contains no valid entries")]
    EmptyEdgeList,

    /// A structurally invalid graph (index out of range, self-loop, ...).
    #[error("invalid graph: {0}")]
    Validation(String),

    /// An out-of-range run parameter.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
