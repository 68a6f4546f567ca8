//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Raised when a collection of sequences cannot be linearized from their
/// predecessor declarations.
///
/// Carries the ids of the whole input collection so the caller can decide
/// how to adjust it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sequences cannot be ordered from their predecessors: [{}]", .sequences.join(", "))]
pub struct SequenceOrderingError {
    pub sequences: Vec<String>,
}

/// Domain errors represent topology rule violations.
/// These are independent of persistence and configuration concerns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("not a sequence: {0}")]
    NotASequence(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node {node} is not contained in sequence {sequence}")]
    NotInSequence { node: String, sequence: String },

    #[error("cycle detected: {node} cannot be added to {sequence}")]
    CycleDetected { node: String, sequence: String },

    #[error("duplicate node id {id} in sequence {sequence}")]
    DuplicateId { id: String, sequence: String },

    #[error("combo sequence {combo} reaches base constituent {constituent} more than once")]
    DuplicateConstituent { combo: String, constituent: String },

    #[error("combo sequence {0} has no constituents")]
    EmptyCombo(String),

    #[error("unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("unknown combo sequence type: {0}")]
    UnknownComboType(String),

    #[error("sequences of {0} do not form a closed ring")]
    NotARing(String),

    #[error(transparent)]
    SequenceOrdering(#[from] SequenceOrderingError),
}

/// Result type for topology operations.
pub type DomainResult<T> = Result<T, DomainError>;
