//! Accelerator lattice topology model.
//!
//! An accelerator is a tree of sequences holding positioned nodes. Loaded
//! documents are collected by a [`domain::TopologyBuilder`] and published as
//! an immutable [`domain::Accelerator`] snapshot that combines sequences
//! into linear and ring combo sequences.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::services::TopologyService;
pub use application::{ApplicationError, ApplicationResult, TopologyLoader};
pub use config::Settings;
pub use domain::{
    Accelerator, AnySequence, ComboRef, ComboSequence, DomainError, DomainResult, NodeData,
    NodeIndex, NodeType, Sequence, SequenceRef, TopologyBuilder,
};
pub use infrastructure::di::ServiceContainer;
pub use infrastructure::DataTree;
