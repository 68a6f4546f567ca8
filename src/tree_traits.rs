//! Render topologies as text trees for display and debugging.

use termtree::Tree;
use tracing::instrument;

use crate::domain::{Accelerator, ComboRef, NodeIndex, Sequence, SequenceRef, TopologyArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

fn node_label(arena: &TopologyArena, idx: NodeIndex) -> String {
    match arena.data(idx) {
        Some(data) => format!("{} ({})", data.id, data.node_type.tag),
        None => format!("{idx:?}"),
    }
}

fn build_tree(arena: &TopologyArena, seq: NodeIndex, parent_tree: &mut Tree<String>) {
    for &child_idx in arena.nodes(seq) {
        let mut child_tree = Tree::new(node_label(arena, child_idx));
        if arena.is_sequence(child_idx) {
            build_tree(arena, child_idx, &mut child_tree);
        }
        parent_tree.push(child_tree);
    }
}

impl TreeNodeConvert for SequenceRef<'_> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        let mut tree = Tree::new(node_label(self.tree(), self.index()));
        build_tree(self.tree(), self.index(), &mut tree);
        tree
    }
}

impl TreeNodeConvert for ComboRef<'_> {
    fn to_tree_string(&self) -> Tree<String> {
        let kind = if self.is_linear() { "linear" } else { "ring" };
        let leaves: Vec<_> = self
            .combo()
            .base_constituents()
            .into_iter()
            .filter_map(|idx| SequenceRef::new(self.tree(), idx).ok())
            .map(|seq| seq.to_tree_string())
            .collect();
        Tree::new(format!("{} ({kind})", self.id())).with_leaves(leaves)
    }
}

impl TreeNodeConvert for Accelerator {
    fn to_tree_string(&self) -> Tree<String> {
        let mut tree = self.root().to_tree_string();
        for combo in self.combo_sequences() {
            tree.push(combo.to_tree_string());
        }
        tree
    }
}
