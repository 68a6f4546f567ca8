//! Domain layer: the accelerator topology model
//!
//! This layer is independent of external concerns (no I/O, no config loading).

pub mod accelerator;
pub mod arena;
pub mod builder;
pub mod combo;
pub mod error;
pub mod node;
pub mod ordering;
pub mod registry;
pub mod sequence;

pub use accelerator::Accelerator;
pub use arena::{DuplicatePolicy, TopologyArena, TreeIterator};
pub use builder::{ComboDefinition, ComboFailurePolicy, TopologyBuilder};
pub use combo::{ComboKind, ComboSequence, Constituent, SequenceProxy};
pub use error::{DomainError, DomainResult, SequenceOrderingError};
pub use node::{NodeData, NodeIndex, NodeType, SequenceData, TreeNode};
pub use ordering::{forms_ring, order_sequences, Precedence};
pub use registry::{ComboConstructor, ComboTypeRegistry, NodeTypeRegistry};
pub use sequence::{AnySequence, ComboRef, Sequence, SequenceRef};
