//! Single-writer construction of accelerator topologies.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::domain::accelerator::Accelerator;
use crate::domain::arena::{DuplicatePolicy, TopologyArena};
use crate::domain::combo::{ComboSequence, Constituent};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{NodeData, NodeIndex};
use crate::domain::registry::ComboTypeRegistry;

/// What `build()` does when a registered combo cannot be instantiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComboFailurePolicy {
    /// Log the failure and leave the combo out of the snapshot
    #[default]
    Omit,
    /// Abort the build with the underlying error
    Fail,
}

impl std::str::FromStr for ComboFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(Self::Omit),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown combo failure policy: {other}")),
        }
    }
}

/// Declared combo sequence, resolved against the tree at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboDefinition {
    pub id: String,
    /// Combo type tag; `None` picks linear or ring from the constituents
    pub combo_type: Option<String>,
    /// Ids of top-level sequences or earlier combos, in order
    pub sequences: Vec<String>,
}

impl ComboDefinition {
    pub fn new(id: impl Into<String>, sequences: &[&str]) -> Self {
        Self {
            id: id.into(),
            combo_type: None,
            sequences: sequences.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_type(mut self, combo_type: impl Into<String>) -> Self {
        self.combo_type = Some(combo_type.into());
        self
    }
}

/// Mutable topology under construction.
///
/// Every structural change goes through `&mut self`; `build()` hands the
/// result over as an immutable `Accelerator`.
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    tree: TopologyArena,
    combos: Vec<ComboDefinition>,
    combo_types: ComboTypeRegistry,
    combo_failure_policy: ComboFailurePolicy,
    version: Option<String>,
    date: Option<String>,
}

impl TopologyBuilder {
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            tree: TopologyArena::new(system_id),
            combos: Vec::new(),
            combo_types: ComboTypeRegistry::default(),
            combo_failure_policy: ComboFailurePolicy::default(),
            version: None,
            date: None,
        }
    }

    pub(crate) fn from_parts(
        tree: TopologyArena,
        combos: Vec<ComboDefinition>,
        combo_types: ComboTypeRegistry,
        combo_failure_policy: ComboFailurePolicy,
        version: Option<String>,
        date: Option<String>,
    ) -> Self {
        Self {
            tree,
            combos,
            combo_types,
            combo_failure_policy,
            version,
            date,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.tree.set_duplicate_policy(policy);
        self
    }

    pub fn with_combo_failure_policy(mut self, policy: ComboFailurePolicy) -> Self {
        self.combo_failure_policy = policy;
        self
    }

    pub fn with_combo_types(mut self, combo_types: ComboTypeRegistry) -> Self {
        self.combo_types = combo_types;
        self
    }

    pub fn tree(&self) -> &TopologyArena {
        &self.tree
    }

    pub fn root(&self) -> NodeIndex {
        self.tree.root()
    }

    pub fn system_id(&self) -> &str {
        self.tree.id(self.tree.root()).unwrap_or_default()
    }

    pub fn set_system_id(&mut self, system_id: impl Into<String>) {
        let root = self.tree.root();
        if let Some(node) = self.tree.get_node_mut(root) {
            node.data.id = system_id.into();
        }
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    pub fn set_date(&mut self, date: Option<String>) {
        self.date = date;
    }

    /// Deep lookup from the root.
    pub fn node_with_id(&self, id: &str) -> Option<NodeIndex> {
        self.tree.node_with_id(self.tree.root(), id)
    }

    /// Create a detached leaf node.
    pub fn new_node(&mut self, data: NodeData) -> NodeIndex {
        self.tree.create_node(data)
    }

    /// Create a detached sequence.
    pub fn new_sequence(&mut self, data: NodeData, predecessors: Vec<String>) -> NodeIndex {
        self.tree.create_sequence(data, predecessors)
    }

    pub fn add_node(&mut self, seq: NodeIndex, node: NodeIndex) -> DomainResult<()> {
        self.tree.add_node(seq, node)
    }

    /// Create a leaf node and add it to `seq`.
    pub fn add_to(&mut self, seq: NodeIndex, data: NodeData) -> DomainResult<NodeIndex> {
        let node = self.tree.create_node(data);
        self.tree.add_node(seq, node)?;
        Ok(node)
    }

    /// Create a sequence and add it to `seq`.
    pub fn add_sequence(
        &mut self,
        seq: NodeIndex,
        data: NodeData,
        predecessors: Vec<String>,
    ) -> DomainResult<NodeIndex> {
        let node = self.tree.create_sequence(data, predecessors);
        self.tree.add_node(seq, node)?;
        Ok(node)
    }

    pub fn remove_node(&mut self, seq: NodeIndex, node: NodeIndex) -> bool {
        self.tree.remove_node(seq, node)
    }

    pub fn remove_all_nodes(&mut self, seq: NodeIndex) {
        self.tree.remove_all_nodes(seq)
    }

    /// Modify a node's data in place.
    ///
    /// A node whose id or position changes is re-slotted in its parent so
    /// the identifier table and position order stay valid.
    #[instrument(level = "trace", skip(self, update))]
    pub fn update_node<F>(&mut self, node: NodeIndex, update: F) -> DomainResult<()>
    where
        F: FnOnce(&mut NodeData),
    {
        let current = self
            .tree
            .data(node)
            .cloned()
            .ok_or_else(|| DomainError::NodeNotFound(format!("{node:?}")))?;
        let mut updated = current.clone();
        update(&mut updated);

        let reslot = updated.id != current.id || updated.position != current.position;
        let parent = self.tree.parent(node).filter(|_| reslot);
        if let Some(parent) = parent {
            self.tree.remove_node(parent, node);
        }
        self.replace_data(node, updated);

        if let Some(parent) = parent {
            if let Err(e) = self.tree.add_node(parent, node) {
                self.replace_data(node, current);
                self.tree.add_node(parent, node)?;
                return Err(e);
            }
        }
        Ok(())
    }

    fn replace_data(&mut self, node: NodeIndex, data: NodeData) {
        if let Some(tree_node) = self.tree.get_node_mut(node) {
            tree_node.data = data;
        }
    }

    pub fn set_predecessors(&mut self, seq: NodeIndex, predecessors: Vec<String>) -> DomainResult<()> {
        self.tree.set_predecessors(seq, predecessors)
    }

    /// Register a combo to instantiate at build time, replacing any earlier
    /// definition with the same id.
    pub fn register_combo(&mut self, definition: ComboDefinition) {
        match self.combos.iter_mut().find(|c| c.id == definition.id) {
            Some(existing) => *existing = definition,
            None => self.combos.push(definition),
        }
    }

    pub fn combo_definitions(&self) -> &[ComboDefinition] {
        &self.combos
    }

    /// Publish the topology, instantiating registered combos in order.
    #[instrument(level = "debug", skip(self))]
    pub fn build(self) -> DomainResult<Accelerator> {
        let mut built: BTreeMap<String, Arc<ComboSequence>> = BTreeMap::new();
        for definition in &self.combos {
            match self.instantiate(definition, &built) {
                Ok(combo) => {
                    debug!("built combo {} ({:?})", combo.id(), combo.kind());
                    built.insert(definition.id.clone(), Arc::new(combo));
                }
                Err(e) => match self.combo_failure_policy {
                    ComboFailurePolicy::Omit => {
                        error!("omitting combo sequence {}: {}", definition.id, e);
                    }
                    ComboFailurePolicy::Fail => return Err(e),
                },
            }
        }
        Ok(Accelerator::new(
            self.tree,
            built,
            self.combos,
            self.combo_types,
            self.combo_failure_policy,
            self.version,
            self.date,
        ))
    }

    fn instantiate(
        &self,
        definition: &ComboDefinition,
        built: &BTreeMap<String, Arc<ComboSequence>>,
    ) -> DomainResult<ComboSequence> {
        let root = self.tree.root();
        let constituents = definition
            .sequences
            .iter()
            .map(|id| {
                if let Some(seq) = self.tree.sequence(root, id) {
                    Ok(Constituent::Sequence(seq))
                } else if let Some(combo) = built.get(id) {
                    Ok(Constituent::Combo(Arc::clone(combo)))
                } else {
                    Err(DomainError::UnknownSequence(id.clone()))
                }
            })
            .collect::<DomainResult<Vec<_>>>()?;
        self.combo_types.create(
            definition.combo_type.as_deref().unwrap_or_default(),
            &self.tree,
            &definition.id,
            constituents,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::NodeType;

    fn element(id: &str, position: f64) -> NodeData {
        NodeData::new(id, NodeType::new("BPM", &["node"])).with_position(position)
    }

    #[test]
    fn given_position_change_when_updating_then_reslotted() {
        let mut builder = TopologyBuilder::new("acc");
        let root = builder.root();
        let seq = builder
            .add_sequence(root, NodeData::new("S", NodeType::sequence()), vec![])
            .unwrap();
        let a = builder.add_to(seq, element("a", 1.0)).unwrap();
        let b = builder.add_to(seq, element("b", 2.0)).unwrap();

        builder.update_node(a, |d| d.position = 3.0).unwrap();

        assert_eq!(builder.tree().nodes(seq), &[b, a]);
        assert_eq!(builder.tree().parent(a), Some(seq));
    }

    #[test]
    fn given_id_change_when_updating_then_lookup_follows() {
        let mut builder = TopologyBuilder::new("acc");
        let root = builder.root();
        let a = builder.add_to(root, element("a", 1.0)).unwrap();

        builder.update_node(a, |d| d.id = "renamed".into()).unwrap();

        assert_eq!(builder.node_with_id("renamed"), Some(a));
        assert_eq!(builder.node_with_id("a"), None);
    }

    #[test]
    fn given_same_id_when_registering_combo_then_replaces_definition() {
        let mut builder = TopologyBuilder::new("acc");
        builder.register_combo(ComboDefinition::new("c", &["A"]));
        builder.register_combo(ComboDefinition::new("c", &["A", "B"]));

        assert_eq!(builder.combo_definitions().len(), 1);
        assert_eq!(builder.combo_definitions()[0].sequences, vec!["A", "B"]);
    }

    #[test]
    fn given_combo_failure_policy_when_parsing_then_case_insensitive() {
        assert_eq!("Fail".parse::<ComboFailurePolicy>().unwrap(), ComboFailurePolicy::Fail);
        assert!("explode".parse::<ComboFailurePolicy>().is_err());
    }
}
