//! Arena-backed storage for the accelerator node hierarchy.

use generational_arena::Arena;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{NodeData, NodeIndex, NodeType, SequenceData, TreeNode};

/// What to do when a node is added under an id its sequence already knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The later node shadows the earlier one in the identifier table
    #[default]
    Shadow,
    /// Adding the node fails with `DomainError::DuplicateId`
    Reject,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shadow" => Ok(Self::Shadow),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

/// Index of the slot after the last child whose position does not exceed
/// `position`.
///
/// Scans from the tail since nodes usually arrive in increasing position
/// order; equal positions keep insertion order.
pub(crate) fn insertion_index<I>(positions: I, position: f64) -> usize
where
    I: DoubleEndedIterator<Item = f64> + ExactSizeIterator,
{
    let len = positions.len();
    positions
        .rev()
        .position(|existing| position >= existing)
        .map(|from_tail| len - from_tail)
        .unwrap_or(0)
}

/// Arena-based topology tree.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// The root sequence represents the whole facility; nodes removed from
/// their sequence stay in the arena, detached and unreachable from the root.
#[derive(Debug, Clone)]
pub struct TopologyArena {
    /// Arena storage for all tree nodes
    arena: Arena<TreeNode>,
    /// Index of the root sequence
    root: NodeIndex,
    duplicate_policy: DuplicatePolicy,
}

impl TopologyArena {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self::with_policy(root_id, DuplicatePolicy::default())
    }

    pub fn with_policy(root_id: impl Into<String>, duplicate_policy: DuplicatePolicy) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(TreeNode {
            data: NodeData::new(root_id, NodeType::new("accelerator", &["sequence", "node"])),
            parent: None,
            sequence: Some(SequenceData::default()),
        });
        Self {
            arena,
            root,
            duplicate_policy,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub(crate) fn set_duplicate_policy(&mut self, policy: DuplicatePolicy) {
        self.duplicate_policy = policy;
    }

    /// Number of nodes held by the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get_node(&self, idx: NodeIndex) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub(crate) fn get_node_mut(&mut self, idx: NodeIndex) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn data(&self, idx: NodeIndex) -> Option<&NodeData> {
        self.get_node(idx).map(|n| &n.data)
    }

    pub fn id(&self, idx: NodeIndex) -> Option<&str> {
        self.get_node(idx).map(|n| n.id())
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.get_node(idx).and_then(|n| n.parent)
    }

    pub fn is_sequence(&self, idx: NodeIndex) -> bool {
        self.get_node(idx).is_some_and(TreeNode::is_sequence)
    }

    pub fn predecessors(&self, idx: NodeIndex) -> &[String] {
        self.get_node(idx).map(TreeNode::predecessors).unwrap_or(&[])
    }

    /// Label used in error messages, tolerant of stale indices.
    pub(crate) fn label(&self, idx: NodeIndex) -> String {
        self.id(idx)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{idx:?}"))
    }

    fn node(&self, idx: NodeIndex) -> DomainResult<&TreeNode> {
        self.get_node(idx)
            .ok_or_else(|| DomainError::NodeNotFound(format!("{idx:?}")))
    }

    fn sequence_data(&self, seq: NodeIndex) -> DomainResult<&SequenceData> {
        self.node(seq)?
            .sequence
            .as_ref()
            .ok_or_else(|| DomainError::NotASequence(self.label(seq)))
    }

    /// Create a detached leaf node.
    pub fn create_node(&mut self, data: NodeData) -> NodeIndex {
        self.arena.insert(TreeNode {
            data,
            parent: None,
            sequence: None,
        })
    }

    /// Create a detached, empty sequence.
    pub fn create_sequence(&mut self, data: NodeData, predecessors: Vec<String>) -> NodeIndex {
        self.arena.insert(TreeNode {
            data,
            parent: None,
            sequence: Some(SequenceData {
                predecessors,
                ..SequenceData::default()
            }),
        })
    }

    pub fn set_predecessors(&mut self, seq: NodeIndex, predecessors: Vec<String>) -> DomainResult<()> {
        let label = self.label(seq);
        let data = self
            .get_node_mut(seq)
            .ok_or_else(|| DomainError::NodeNotFound(label.clone()))?
            .sequence
            .as_mut()
            .ok_or(DomainError::NotASequence(label))?;
        data.predecessors = predecessors;
        Ok(())
    }

    /// True if `ancestor` is `node` or lies on `node`'s parent chain.
    pub fn is_ancestor(&self, ancestor: NodeIndex, node: NodeIndex) -> bool {
        let mut current = Some(node);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent(idx);
        }
        false
    }

    /// Insert `node` into `seq` at the index preserving position order.
    ///
    /// A node that already has an owning sequence is moved out of it first.
    #[instrument(level = "trace", skip(self))]
    pub fn add_node(&mut self, seq: NodeIndex, node: NodeIndex) -> DomainResult<()> {
        let node_id = self.node(node)?.id().to_string();
        let position = self.node(node)?.data.position;
        let is_sequence = self.node(node)?.is_sequence();
        let seq_data = self.sequence_data(seq)?;

        if self.is_ancestor(node, seq) {
            return Err(DomainError::CycleDetected {
                node: node_id,
                sequence: self.label(seq),
            });
        }
        if self.duplicate_policy == DuplicatePolicy::Reject
            && seq_data
                .node_table
                .get(&node_id)
                .is_some_and(|entries| entries.iter().any(|&existing| existing != node))
        {
            return Err(DomainError::DuplicateId {
                id: node_id,
                sequence: self.label(seq),
            });
        }

        if let Some(old_parent) = self.parent(node) {
            self.remove_node(old_parent, node);
        }

        let index = {
            let seq_data = self.sequence_data(seq)?;
            let positions: Vec<f64> = seq_data
                .children
                .iter()
                .map(|&child| self.data(child).map(|d| d.position).unwrap_or(f64::NEG_INFINITY))
                .collect();
            insertion_index(positions.into_iter(), position)
        };

        if let Some(seq_data) = self.get_node_mut(seq).and_then(|n| n.sequence.as_mut()) {
            seq_data.children.insert(index, node);
            let entries = seq_data.node_table.entry(node_id.clone()).or_default();
            if !entries.is_empty() {
                debug!("{} shadows an earlier node with the same id", node_id);
            }
            entries.push(node);
            if is_sequence {
                seq_data.sequences.push(node);
            }
        }
        if let Some(child) = self.get_node_mut(node) {
            child.parent = Some(seq);
        }
        Ok(())
    }

    /// Remove `node` from the immediate children of `seq`.
    ///
    /// Returns false if `node` was not a child of `seq`.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_node(&mut self, seq: NodeIndex, node: NodeIndex) -> bool {
        let Some(node_id) = self.id(node).map(str::to_string) else {
            return false;
        };
        if !self.contains(seq, node) {
            return false;
        }
        let Some(seq_data) = self.get_node_mut(seq).and_then(|n| n.sequence.as_mut()) else {
            return false;
        };
        seq_data.children.retain(|&c| c != node);
        // the most recently inserted survivor becomes visible again
        if let Some(entries) = seq_data.node_table.get_mut(&node_id) {
            entries.retain(|&n| n != node);
            if entries.is_empty() {
                seq_data.node_table.remove(&node_id);
            }
        }
        seq_data.sequences.retain(|&s| s != node);
        if let Some(child) = self.get_node_mut(node) {
            child.parent = None;
        }
        true
    }

    /// Detach every immediate child of `seq`.
    pub fn remove_all_nodes(&mut self, seq: NodeIndex) {
        let children = match self.get_node_mut(seq).and_then(|n| n.sequence.as_mut()) {
            Some(seq_data) => {
                seq_data.node_table.clear();
                seq_data.sequences.clear();
                std::mem::take(&mut seq_data.children)
            }
            None => return,
        };
        for child in children {
            if let Some(node) = self.get_node_mut(child) {
                node.parent = None;
            }
        }
    }

    /// Immediate children of `seq`, ordered by position.
    pub fn nodes(&self, seq: NodeIndex) -> &[NodeIndex] {
        self.sequence_data(seq)
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate child sequences of `seq`, in insertion order.
    pub fn sequences(&self, seq: NodeIndex) -> &[NodeIndex] {
        self.sequence_data(seq)
            .map(|d| d.sequences.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate child sequence of `seq` with the given id.
    pub fn sequence(&self, seq: NodeIndex, id: &str) -> Option<NodeIndex> {
        self.sequences(seq)
            .iter()
            .copied()
            .find(|&s| self.id(s) == Some(id))
    }

    /// Search deeply for the node with the given id.
    ///
    /// Checks `seq` itself, then the identifier table of its immediate
    /// children, then recurses into child sequences in list order.
    pub fn node_with_id(&self, seq: NodeIndex, id: &str) -> Option<NodeIndex> {
        if self.id(seq) == Some(id) {
            return Some(seq);
        }
        let seq_data = self.sequence_data(seq).ok()?;
        if let Some(&node) = seq_data.node_table.get(id).and_then(|entries| entries.last()) {
            return Some(node);
        }
        seq_data
            .sequences
            .iter()
            .find_map(|&child| self.node_with_id(child, id))
    }

    /// All nodes below `seq` in pre-order, `seq` itself excluded.
    pub fn all_nodes(&self, seq: NodeIndex) -> Vec<NodeIndex> {
        self.iter_from(seq).skip(1).map(|(idx, _)| idx).collect()
    }

    /// All sequences nested below `seq`, depth first.
    pub fn all_sequences(&self, seq: NodeIndex) -> Vec<NodeIndex> {
        let mut sequences = Vec::new();
        self.collect_sequences(seq, &mut sequences);
        sequences
    }

    fn collect_sequences(&self, seq: NodeIndex, sequences: &mut Vec<NodeIndex>) {
        for &child in self.sequences(seq) {
            sequences.push(child);
            self.collect_sequences(child, sequences);
        }
    }

    /// Position of `node` relative to the origin of `seq`.
    ///
    /// Resolves recursively through the node's owning sequences; this is
    /// the single position rule of the primary tree.
    pub fn position(&self, seq: NodeIndex, node: NodeIndex) -> DomainResult<f64> {
        if node == seq {
            return Ok(0.0);
        }
        let tree_node = self.node(node)?;
        match tree_node.parent {
            Some(parent) if parent == seq => Ok(tree_node.data.position),
            Some(parent) => Ok(tree_node.data.position + self.position(seq, parent)?),
            None => Err(DomainError::NotInSequence {
                node: tree_node.id().to_string(),
                sequence: self.label(seq),
            }),
        }
    }

    /// The top-level sequence (direct child of the root) containing `node`.
    pub fn primary_ancestor(&self, node: NodeIndex) -> Option<NodeIndex> {
        let mut current = node;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// True if `node` is an immediate child of `seq`.
    pub fn contains(&self, seq: NodeIndex, node: NodeIndex) -> bool {
        self.nodes(seq).contains(&node)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, node_idx: NodeIndex) -> usize {
        1 + self
            .nodes(node_idx)
            .iter()
            .map(|&child| self.calculate_depth(child))
            .max()
            .unwrap_or(0)
    }

    /// Pre-order iterator over the nodes reachable from the root.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Pre-order iterator over `seq` and everything below it.
    pub fn iter_from(&self, seq: NodeIndex) -> TreeIterator<'_> {
        TreeIterator::new(self, seq)
    }
}

pub struct TreeIterator<'a> {
    tree: &'a TopologyArena,
    stack: Vec<NodeIndex>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a TopologyArena, start: NodeIndex) -> Self {
        let stack = if tree.get_node(start).is_some() {
            vec![start]
        } else {
            Vec::new()
        };
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeIndex, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current_idx = self.stack.pop()?;
        let node = self.tree.get_node(current_idx)?;
        // Push children in reverse order for left-to-right traversal
        if let Some(seq_data) = &node.sequence {
            self.stack.extend(seq_data.children.iter().rev());
        }
        Some((current_idx, node))
    }
}
