//! Read-only sequence views over a topology arena.
//!
//! `SequenceRef` views a sequence owned by the tree, `ComboRef` views a
//! combo sequence layered over base constituents. Both resolve into the
//! same arena nodes, so query code is written once against `Sequence`.

use itertools::Itertools;

use crate::domain::arena::TopologyArena;
use crate::domain::combo::ComboSequence;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{NodeData, NodeIndex};
use crate::domain::ordering::Precedence;

/// Queries shared by primary sequences and combo sequences.
pub trait Sequence {
    fn tree(&self) -> &TopologyArena;

    fn id(&self) -> &str;

    fn length(&self) -> f64;

    /// Id of the sequence where beam enters this one.
    fn entrance_id(&self) -> Option<&str>;

    /// False for rings, whose relative positions wrap around.
    fn is_linear(&self) -> bool {
        true
    }

    /// Position of `node` relative to the origin of this sequence.
    fn position(&self, node: NodeIndex) -> DomainResult<f64>;

    /// Deep search for the node with the given id.
    fn node_with_id(&self, id: &str) -> Option<NodeIndex>;

    /// Immediate nodes in position order.
    fn nodes(&self) -> Vec<NodeIndex>;

    /// Immediate child sequences.
    fn sequences(&self) -> Vec<NodeIndex>;

    /// Every node below this sequence, pre-order.
    fn all_nodes(&self) -> Vec<NodeIndex>;

    /// Like `all_nodes` but including the sequence itself where it has a
    /// node of its own.
    fn all_inclusive_nodes(&self) -> Vec<NodeIndex>;

    /// Every sequence nested below this one.
    fn all_sequences(&self) -> Vec<NodeIndex> {
        self.all_nodes()
            .into_iter()
            .filter(|&n| self.tree().is_sequence(n))
            .collect()
    }

    /// Immediate child sequence with the given id.
    fn sequence(&self, id: &str) -> Option<NodeIndex> {
        self.sequences()
            .into_iter()
            .find(|&s| self.tree().id(s) == Some(id))
    }

    fn data(&self, node: NodeIndex) -> Option<&NodeData> {
        self.tree().data(node)
    }

    fn distance_between(&self, reference: NodeIndex, node: NodeIndex) -> DomainResult<f64> {
        Ok(self.position(node)? - self.position(reference)?)
    }

    fn relative_position(&self, position: f64, reference: NodeIndex) -> DomainResult<f64> {
        Ok(position - self.position(reference)?)
    }

    fn relative_position_to_id(&self, position: f64, reference_id: &str) -> DomainResult<f64> {
        let reference = self
            .node_with_id(reference_id)
            .ok_or_else(|| DomainError::NodeNotFound(reference_id.to_string()))?;
        self.relative_position(position, reference)
    }

    /// Signed distance from `reference` to `node`, wrapped into
    /// `[-L/2, L/2]` on rings.
    fn shortest_relative_position(&self, node: NodeIndex, reference: NodeIndex) -> DomainResult<f64> {
        let distance = self.distance_between(reference, node)?;
        let length = self.length();
        if self.is_linear() || length <= 0.0 {
            return Ok(distance);
        }
        let wrapped = distance.rem_euclid(length);
        Ok(if wrapped > length / 2.0 {
            wrapped - length
        } else {
            wrapped
        })
    }

    fn sort_by_position(&self, nodes: &[NodeIndex]) -> DomainResult<Vec<NodeIndex>> {
        sort_by_key(nodes, |n| self.position(n))
    }

    /// Orders by absolute shortest distance from `reference`.
    fn sort_by_proximity(&self, nodes: &[NodeIndex], reference: NodeIndex) -> DomainResult<Vec<NodeIndex>> {
        sort_by_key(nodes, |n| {
            self.shortest_relative_position(n, reference).map(f64::abs)
        })
    }

    fn sort_by_relative_position(
        &self,
        nodes: &[NodeIndex],
        reference: NodeIndex,
    ) -> DomainResult<Vec<NodeIndex>> {
        sort_by_key(nodes, |n| self.shortest_relative_position(n, reference))
    }

    fn nodes_with_status(&self, status: bool) -> Vec<NodeIndex> {
        filter_status(self.tree(), self.nodes(), status)
    }

    fn all_nodes_with_status(&self, status: bool) -> Vec<NodeIndex> {
        filter_status(self.tree(), self.all_nodes(), status)
    }

    fn sequences_with_status(&self, status: bool) -> Vec<NodeIndex> {
        filter_status(self.tree(), self.sequences(), status)
    }

    fn nodes_of_type(&self, kind: &str) -> Vec<NodeIndex> {
        filter_kind(self.tree(), self.nodes(), kind)
    }

    fn all_nodes_of_type(&self, kind: &str) -> Vec<NodeIndex> {
        filter_kind(self.tree(), self.all_nodes(), kind)
    }

    fn node_count(&self) -> usize {
        self.nodes().len()
    }

    fn index_of_node(&self, node: NodeIndex) -> Option<usize> {
        self.nodes().iter().position(|&n| n == node)
    }

    fn node_at(&self, index: usize) -> Option<NodeIndex> {
        self.nodes().get(index).copied()
    }

    fn contains(&self, node: NodeIndex) -> bool {
        self.nodes().contains(&node)
    }

    /// Comma separated ids, handy for log lines.
    fn describe(&self, nodes: &[NodeIndex]) -> String {
        nodes
            .iter()
            .map(|&n| self.tree().id(n).unwrap_or("?"))
            .join(", ")
    }
}

fn sort_by_key<F>(nodes: &[NodeIndex], mut key: F) -> DomainResult<Vec<NodeIndex>>
where
    F: FnMut(NodeIndex) -> DomainResult<f64>,
{
    let keyed = nodes
        .iter()
        .map(|&n| key(n).map(|k| (k, n)))
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(keyed
        .into_iter()
        .sorted_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, n)| n)
        .collect())
}

fn filter_status(tree: &TopologyArena, nodes: Vec<NodeIndex>, status: bool) -> Vec<NodeIndex> {
    nodes
        .into_iter()
        .filter(|&n| tree.data(n).is_some_and(|d| d.status == status))
        .collect()
}

fn filter_kind(tree: &TopologyArena, nodes: Vec<NodeIndex>, kind: &str) -> Vec<NodeIndex> {
    nodes
        .into_iter()
        .filter(|&n| tree.data(n).is_some_and(|d| d.node_type.is_kind_of(kind)))
        .collect()
}

/// View of a sequence owned by the primary tree.
#[derive(Debug, Clone, Copy)]
pub struct SequenceRef<'a> {
    tree: &'a TopologyArena,
    index: NodeIndex,
}

impl<'a> SequenceRef<'a> {
    pub fn new(tree: &'a TopologyArena, index: NodeIndex) -> DomainResult<Self> {
        if tree.is_sequence(index) {
            Ok(Self { tree, index })
        } else {
            Err(DomainError::NotASequence(tree.label(index)))
        }
    }

    /// The root sequence of `tree`, which always exists.
    pub(crate) fn root_of(tree: &'a TopologyArena) -> Self {
        Self {
            tree,
            index: tree.root(),
        }
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn predecessors(&self) -> &'a [String] {
        self.tree.predecessors(self.index)
    }

    pub fn status(&self) -> bool {
        self.tree.data(self.index).is_some_and(|d| d.status)
    }
}

impl PartialEq for SequenceRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

impl Precedence for SequenceRef<'_> {
    fn precedence_id(&self) -> &str {
        self.tree.id(self.index).unwrap_or_default()
    }

    fn predecessors(&self) -> &[String] {
        self.tree.predecessors(self.index)
    }
}

impl Sequence for SequenceRef<'_> {
    fn tree(&self) -> &TopologyArena {
        self.tree
    }

    fn id(&self) -> &str {
        self.tree.id(self.index).unwrap_or_default()
    }

    fn length(&self) -> f64 {
        self.tree.data(self.index).map(|d| d.length).unwrap_or(0.0)
    }

    fn entrance_id(&self) -> Option<&str> {
        self.tree.id(self.index)
    }

    fn position(&self, node: NodeIndex) -> DomainResult<f64> {
        self.tree.position(self.index, node)
    }

    fn node_with_id(&self, id: &str) -> Option<NodeIndex> {
        self.tree.node_with_id(self.index, id)
    }

    fn nodes(&self) -> Vec<NodeIndex> {
        self.tree.nodes(self.index).to_vec()
    }

    fn sequences(&self) -> Vec<NodeIndex> {
        self.tree.sequences(self.index).to_vec()
    }

    fn all_nodes(&self) -> Vec<NodeIndex> {
        self.tree.all_nodes(self.index)
    }

    fn all_inclusive_nodes(&self) -> Vec<NodeIndex> {
        let mut nodes = vec![self.index];
        nodes.extend(self.tree.all_nodes(self.index));
        nodes
    }

    fn all_sequences(&self) -> Vec<NodeIndex> {
        self.tree.all_sequences(self.index)
    }

    fn sequence(&self, id: &str) -> Option<NodeIndex> {
        self.tree.sequence(self.index, id)
    }

    fn contains(&self, node: NodeIndex) -> bool {
        self.tree.contains(self.index, node)
    }
}

/// View of a combo sequence over the tree its constituents live in.
#[derive(Debug, Clone, Copy)]
pub struct ComboRef<'a> {
    tree: &'a TopologyArena,
    combo: &'a ComboSequence,
}

impl<'a> ComboRef<'a> {
    pub fn new(tree: &'a TopologyArena, combo: &'a ComboSequence) -> Self {
        Self { tree, combo }
    }

    pub fn combo(&self) -> &'a ComboSequence {
        self.combo
    }

    fn base_views(&self) -> impl Iterator<Item = SequenceRef<'a>> + '_ {
        let tree = self.tree;
        self.combo
            .base_constituents()
            .into_iter()
            .filter_map(move |idx| SequenceRef::new(tree, idx).ok())
    }

    /// Nearest ancestor of `node` (or `node` itself) that is a base
    /// constituent, with its absolute offset in the combo.
    fn owning_constituent(&self, node: NodeIndex) -> Option<(NodeIndex, f64)> {
        let mut current = Some(node);
        while let Some(idx) = current {
            if let Some(offset) = self.combo.base_offset(idx) {
                return Some((idx, offset));
            }
            current = self.tree.parent(idx);
        }
        None
    }
}

impl Sequence for ComboRef<'_> {
    fn tree(&self) -> &TopologyArena {
        self.tree
    }

    fn id(&self) -> &str {
        self.combo.id()
    }

    fn length(&self) -> f64 {
        self.combo.length()
    }

    /// Entrance of the first base constituent.
    fn entrance_id(&self) -> Option<&str> {
        self.combo
            .base_entries()
            .first()
            .and_then(|&(idx, _)| self.tree.id(idx))
    }

    fn is_linear(&self) -> bool {
        self.combo.is_linear()
    }

    fn position(&self, node: NodeIndex) -> DomainResult<f64> {
        let (constituent, offset) = self.owning_constituent(node).ok_or_else(|| DomainError::NotInSequence {
            node: self.tree.label(node),
            sequence: self.combo.id().to_string(),
        })?;
        Ok(offset + self.tree.position(constituent, node)?)
    }

    fn node_with_id(&self, id: &str) -> Option<NodeIndex> {
        self.base_views().find_map(|seq| seq.node_with_id(id))
    }

    fn nodes(&self) -> Vec<NodeIndex> {
        self.base_views().flat_map(|seq| seq.nodes()).collect()
    }

    fn sequences(&self) -> Vec<NodeIndex> {
        self.base_views().flat_map(|seq| seq.sequences()).collect()
    }

    fn all_nodes(&self) -> Vec<NodeIndex> {
        self.base_views().flat_map(|seq| seq.all_nodes()).collect()
    }

    /// Each base constituent followed by everything below it.
    fn all_inclusive_nodes(&self) -> Vec<NodeIndex> {
        self.base_views()
            .flat_map(|seq| seq.all_inclusive_nodes())
            .collect()
    }
}

/// Either kind of sequence view.
#[derive(Debug, Clone, Copy)]
pub enum AnySequence<'a> {
    Primary(SequenceRef<'a>),
    Combo(ComboRef<'a>),
}

macro_rules! delegate {
    ($self:ident, $seq:ident => $body:expr) => {
        match $self {
            AnySequence::Primary($seq) => $body,
            AnySequence::Combo($seq) => $body,
        }
    };
}

impl Sequence for AnySequence<'_> {
    fn tree(&self) -> &TopologyArena {
        delegate!(self, s => s.tree())
    }

    fn id(&self) -> &str {
        delegate!(self, s => s.id())
    }

    fn length(&self) -> f64 {
        delegate!(self, s => s.length())
    }

    fn entrance_id(&self) -> Option<&str> {
        delegate!(self, s => s.entrance_id())
    }

    fn is_linear(&self) -> bool {
        delegate!(self, s => s.is_linear())
    }

    fn position(&self, node: NodeIndex) -> DomainResult<f64> {
        delegate!(self, s => s.position(node))
    }

    fn node_with_id(&self, id: &str) -> Option<NodeIndex> {
        delegate!(self, s => s.node_with_id(id))
    }

    fn nodes(&self) -> Vec<NodeIndex> {
        delegate!(self, s => s.nodes())
    }

    fn sequences(&self) -> Vec<NodeIndex> {
        delegate!(self, s => s.sequences())
    }

    fn all_nodes(&self) -> Vec<NodeIndex> {
        delegate!(self, s => s.all_nodes())
    }

    fn all_inclusive_nodes(&self) -> Vec<NodeIndex> {
        delegate!(self, s => s.all_inclusive_nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::NodeType;

    fn line() -> (TopologyArena, NodeIndex, Vec<NodeIndex>) {
        let mut tree = TopologyArena::new("acc");
        let root = tree.root();
        let seq = tree.create_sequence(
            NodeData::new("L", NodeType::sequence()).with_length(10.0),
            vec![],
        );
        tree.add_node(root, seq).unwrap();
        let quad = NodeType::new("QH", &["Q", "magnet", "node"]);
        let nodes: Vec<NodeIndex> = [("q1", 1.0, true), ("b1", 4.0, false), ("q2", 8.0, true)]
            .into_iter()
            .map(|(id, pos, status)| {
                let node_type = if id.starts_with('q') {
                    quad.clone()
                } else {
                    NodeType::new("BPM", &["node"])
                };
                let n = tree.create_node(NodeData::new(id, node_type).with_position(pos).with_status(status));
                tree.add_node(seq, n).unwrap();
                n
            })
            .collect();
        (tree, seq, nodes)
    }

    #[test]
    fn given_leaf_index_when_viewing_as_sequence_then_not_a_sequence() {
        let (tree, _, nodes) = line();
        assert!(matches!(
            SequenceRef::new(&tree, nodes[0]),
            Err(DomainError::NotASequence(_))
        ));
    }

    #[test]
    fn given_linear_sequence_when_sorting_by_proximity_then_nearest_first() {
        let (tree, seq, nodes) = line();
        let view = SequenceRef::new(&tree, seq).unwrap();

        let sorted = view.sort_by_proximity(&nodes, nodes[2]).unwrap();

        assert_eq!(sorted, vec![nodes[2], nodes[1], nodes[0]]);
    }

    #[test]
    fn given_filters_when_enumerating_then_status_and_kind_apply() {
        let (tree, seq, nodes) = line();
        let view = SequenceRef::new(&tree, seq).unwrap();

        assert_eq!(view.nodes_with_status(false), vec![nodes[1]]);
        assert_eq!(view.nodes_of_type("magnet"), vec![nodes[0], nodes[2]]);
        assert_eq!(view.index_of_node(nodes[1]), Some(1));
        assert_eq!(view.node_at(2), Some(nodes[2]));
        assert_eq!(view.describe(&view.nodes()), "q1, b1, q2");
    }

    #[test]
    fn given_nested_nodes_out_of_order_when_sorting_by_position_then_parent_frame_used() {
        let (mut tree, seq, nodes) = line();
        let inner = tree.create_sequence(
            NodeData::new("L:IN", NodeType::sequence())
                .with_position(5.0)
                .with_length(2.0),
            vec![],
        );
        tree.add_node(seq, inner).unwrap();
        let deep = tree.create_node(NodeData::new("m1", NodeType::new("BPM", &["node"])).with_position(1.5));
        tree.add_node(inner, deep).unwrap();
        let view = SequenceRef::new(&tree, seq).unwrap();

        let sorted = view
            .sort_by_position(&[nodes[2], deep, nodes[0], inner, nodes[1]])
            .unwrap();

        assert_eq!(view.describe(&sorted), "q1, b1, L:IN, m1, q2");
        assert_eq!(view.position(deep).unwrap(), 6.5);
    }

    #[test]
    fn given_nested_nodes_when_filtering_deep_by_status_then_all_levels_checked() {
        let (mut tree, seq, nodes) = line();
        let on = tree.create_sequence(NodeData::new("L:ON", NodeType::sequence()).with_position(2.0), vec![]);
        let off = tree.create_sequence(
            NodeData::new("L:OFF", NodeType::sequence())
                .with_position(6.0)
                .with_status(false),
            vec![],
        );
        tree.add_node(seq, on).unwrap();
        tree.add_node(seq, off).unwrap();
        let dead = tree.create_node(NodeData::new("b2", NodeType::new("BPM", &["node"])).with_status(false));
        tree.add_node(on, dead).unwrap();
        let view = SequenceRef::new(&tree, seq).unwrap();

        let inactive = view.all_nodes_with_status(false);
        let active = view.all_nodes_with_status(true);

        assert_eq!(inactive, vec![dead, nodes[1], off]);
        assert_eq!(active, vec![nodes[0], on, nodes[2]]);
        assert_eq!(view.sequences_with_status(true), vec![on]);
        assert_eq!(view.sequences_with_status(false), vec![off]);
    }

    #[test]
    fn given_reference_id_when_relative_position_then_offset_from_reference() {
        let (tree, seq, _) = line();
        let view = SequenceRef::new(&tree, seq).unwrap();

        assert_eq!(view.relative_position_to_id(5.0, "b1").unwrap(), 1.0);
        assert!(matches!(
            view.relative_position_to_id(5.0, "nope"),
            Err(DomainError::NodeNotFound(_))
        ));
    }
}
