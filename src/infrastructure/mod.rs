//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod data_tree;
pub mod di;
pub mod traits;

pub use data_tree::DataTree;
