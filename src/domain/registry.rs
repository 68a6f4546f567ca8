//! Explicit type registries for nodes and combo sequences.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use itertools::Itertools;
use tracing::warn;

use crate::domain::arena::TopologyArena;
use crate::domain::combo::{ComboSequence, Constituent};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::NodeType;

/// Maps element type tags to node types.
#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    types: HashMap<String, NodeType>,
}

/// Element tags known without configuration, with their kind lineage.
const DEFAULT_NODE_TYPES: &[(&str, &[&str])] = &[
    ("marker", &["node"]),
    ("BPM", &["node"]),
    ("RBPM", &["BPM", "node"]),
    ("emag", &["magnet", "node"]),
    ("QH", &["Q", "magnet", "node"]),
    ("QV", &["Q", "magnet", "node"]),
    ("DH", &["dipole", "magnet", "node"]),
    ("DV", &["dipole", "magnet", "node"]),
    ("DCH", &["corrector", "dipole", "magnet", "node"]),
    ("DCV", &["corrector", "dipole", "magnet", "node"]),
    ("RG", &["node"]),
    ("RF", &["RfCavity", "sequence", "node"]),
    ("RfCavity", &["sequence", "node"]),
    ("SCLCavity", &["RfCavity", "sequence", "node"]),
    ("WS", &["profile", "node"]),
    ("Harp", &["profile", "node"]),
];

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (tag, kinds) in DEFAULT_NODE_TYPES {
            registry.register(NodeType::new(*tag, kinds));
        }
        registry.register(NodeType::sequence());
        registry
    }
}

impl NodeTypeRegistry {
    /// Registry without any registered tags.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.tag.clone(), node_type);
    }

    /// Register extra tags given as tag -> kind lineage.
    pub fn extend_from(&mut self, types: &BTreeMap<String, Vec<String>>) {
        for (tag, kinds) in types {
            let kinds: Vec<&str> = kinds.iter().map(String::as_str).collect();
            self.register(NodeType::new(tag.clone(), &kinds));
        }
    }

    pub fn get(&self, tag: &str) -> Option<&NodeType> {
        self.types.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    /// Resolve a tag, substituting the generic placeholder for unknown ones.
    pub fn resolve(&self, tag: &str) -> NodeType {
        match self.types.get(tag) {
            Some(node_type) => node_type.clone(),
            None => {
                warn!("unknown node type {}, using {}", tag, NodeType::GENERIC);
                NodeType::generic()
            }
        }
    }
}

/// Constructor of a combo sequence from its constituents.
pub type ComboConstructor = fn(&TopologyArena, &str, Vec<Constituent>) -> DomainResult<ComboSequence>;

/// Maps combo type tags to constructors.
#[derive(Clone)]
pub struct ComboTypeRegistry {
    constructors: HashMap<String, ComboConstructor>,
}

impl fmt::Debug for ComboTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboTypeRegistry")
            .field("tags", &self.constructors.keys().sorted().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ComboTypeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("", ComboSequence::instance);
        registry.register("sequenceCombo", ComboSequence::instance);
        registry.register("ring", ComboSequence::ring);
        registry.register("linear", ComboSequence::linear);
        registry
    }
}

impl ComboTypeRegistry {
    pub fn register(&mut self, tag: impl Into<String>, constructor: ComboConstructor) {
        self.constructors.insert(tag.into(), constructor);
    }

    pub fn create(
        &self,
        tag: &str,
        tree: &TopologyArena,
        id: &str,
        constituents: Vec<Constituent>,
    ) -> DomainResult<ComboSequence> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| DomainError::UnknownComboType(tag.to_string()))?;
        constructor(tree, id, constituents)
    }
}
