//! Node payloads stored in the topology arena.

use std::collections::HashMap;
use std::fmt;

use generational_arena::Index;

/// Arena handle of a node or sequence.
pub type NodeIndex = Index;

/// Type tag of a node together with the kinds it belongs to.
///
/// A quadrupole tagged `QH` is also a `Q`, a `magnet` and a `node`, so
/// `is_kind_of("magnet")` matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    pub tag: String,
    pub kinds: Vec<String>,
}

impl NodeType {
    /// Placeholder tag substituted for unregistered node types.
    pub const GENERIC: &'static str = "GenericNode";

    /// Tag of plain sequences.
    pub const SEQUENCE: &'static str = "sequence";

    pub fn new(tag: impl Into<String>, kinds: &[&str]) -> Self {
        Self {
            tag: tag.into(),
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Generic placeholder for an unrecognized tag.
    ///
    /// The requested tag is kept as the software type so it can be written
    /// back unchanged.
    pub fn generic() -> Self {
        Self::new(Self::GENERIC, &["node"])
    }

    pub fn sequence() -> Self {
        Self::new(Self::SEQUENCE, &[Self::SEQUENCE, "node"])
    }

    pub fn is_kind_of(&self, kind: &str) -> bool {
        self.tag == kind || self.kinds.iter().any(|k| k == kind)
    }
}

/// Descriptive data of a topology node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Identifier, unique within the owning tree
    pub id: String,
    pub node_type: NodeType,
    /// Position (m) relative to the owning parent's origin
    pub position: f64,
    /// Length (m) along the reference orbit
    pub length: f64,
    /// Operational status
    pub status: bool,
    pub valid: bool,
    /// Physics id
    pub pid: Option<String>,
    /// Engineering id
    pub eid: Option<String>,
    /// Global display coordinate
    pub s_display: f64,
    /// Type tag as written in the source document when it differs from
    /// `node_type.tag` (e.g. for generic placeholders)
    pub soft_type: Option<String>,
}

impl NodeData {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            position: 0.0,
            length: 0.0,
            status: true,
            valid: true,
            pid: None,
            eid: None,
            s_display: 0.0,
            soft_type: None,
        }
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_status(mut self, status: bool) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.node_type.tag)
    }
}

/// Composite part of a sequence node.
#[derive(Debug, Clone, Default)]
pub struct SequenceData {
    /// Immediate children ordered by ascending local position
    pub children: Vec<NodeIndex>,
    /// Immediate children keyed by id, in insertion order; the last entry
    /// is the visible one
    pub node_table: HashMap<String, Vec<NodeIndex>>,
    /// Immediate child sequences in insertion order
    pub sequences: Vec<NodeIndex>,
    /// Ids of sequences allowed to immediately precede this one
    pub predecessors: Vec<String>,
}

/// Tree node in the topology arena.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub data: NodeData,
    /// Owning sequence, None for the root and for detached nodes
    pub parent: Option<NodeIndex>,
    /// Present iff this node is a sequence
    pub sequence: Option<SequenceData>,
}

impl TreeNode {
    pub fn is_sequence(&self) -> bool {
        self.sequence.is_some()
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn predecessors(&self) -> &[String] {
        self.sequence
            .as_ref()
            .map(|s| s.predecessors.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_quadrupole_type_when_checking_kinds_then_matches_lineage() {
        let quad = NodeType::new("QH", &["Q", "magnet", "node"]);
        assert!(quad.is_kind_of("QH"));
        assert!(quad.is_kind_of("magnet"));
        assert!(!quad.is_kind_of("BPM"));
    }

    #[test]
    fn given_generic_type_when_checking_kinds_then_only_node() {
        let generic = NodeType::generic();
        assert_eq!(generic.tag, NodeType::GENERIC);
        assert!(generic.is_kind_of("node"));
        assert!(!generic.is_kind_of("magnet"));
    }
}
