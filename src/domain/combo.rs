//! Combo sequences: non-owning concatenations of existing sequences.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::arena::{insertion_index, TopologyArena};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::NodeIndex;
use crate::domain::ordering::forms_ring;
use crate::domain::sequence::{ComboRef, SequenceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComboKind {
    Linear,
    /// Closed loop; relative positions wrap around the total length
    Ring,
}

/// Offset alias of a constituent inside a combo.
///
/// Carries only the target id and offsets, never tree membership.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceProxy {
    pub target_id: String,
    /// Offset of the constituent's origin within the combo
    pub position: f64,
    pub length: f64,
}

/// One immediate constituent of a combo sequence.
#[derive(Debug, Clone)]
pub enum Constituent {
    Sequence(NodeIndex),
    Combo(Arc<ComboSequence>),
}

impl Constituent {
    fn id(&self, tree: &TopologyArena) -> String {
        match self {
            Self::Sequence(idx) => tree.label(*idx),
            Self::Combo(combo) => combo.id.clone(),
        }
    }

    fn length(&self, tree: &TopologyArena) -> f64 {
        match self {
            Self::Sequence(idx) => tree.data(*idx).map(|d| d.length).unwrap_or(0.0),
            Self::Combo(combo) => combo.length,
        }
    }
}

/// Virtual sequence presenting several existing sequences as one.
#[derive(Debug, Clone)]
pub struct ComboSequence {
    id: String,
    kind: ComboKind,
    constituents: Vec<Constituent>,
    /// One proxy per immediate constituent, ordered by position
    proxies: Vec<SequenceProxy>,
    /// Flattened non-combo constituents with their absolute offsets
    base: Vec<(NodeIndex, f64)>,
    length: f64,
}

impl ComboSequence {
    /// Combo that is a ring if its base constituents close on themselves.
    pub fn instance(tree: &TopologyArena, id: &str, constituents: Vec<Constituent>) -> DomainResult<Self> {
        let mut combo = Self::flatten(tree, id, constituents, ComboKind::Linear)?;
        if combo.base_forms_ring(tree) {
            debug!("combo {} forms a ring", id);
            combo.kind = ComboKind::Ring;
        }
        Ok(combo)
    }

    /// Combo that is always treated as linear.
    pub fn linear(tree: &TopologyArena, id: &str, constituents: Vec<Constituent>) -> DomainResult<Self> {
        Self::flatten(tree, id, constituents, ComboKind::Linear)
    }

    /// Ring combo; the base constituents must close on themselves.
    pub fn ring(tree: &TopologyArena, id: &str, constituents: Vec<Constituent>) -> DomainResult<Self> {
        let combo = Self::flatten(tree, id, constituents, ComboKind::Ring)?;
        if !combo.base_forms_ring(tree) {
            return Err(DomainError::NotARing(id.to_string()));
        }
        Ok(combo)
    }

    /// Every non-cycling chain of top-level sequences running from `start`
    /// to `end`, one combo per chain.
    #[instrument(level = "debug", skip(tree))]
    pub fn instances_for_range(
        tree: &TopologyArena,
        id: &str,
        start: NodeIndex,
        end: NodeIndex,
    ) -> DomainResult<Vec<Self>> {
        extend_chains(tree, start, vec![end])
            .into_iter()
            .map(|chain| {
                let constituents = chain.into_iter().map(Constituent::Sequence).collect();
                Self::instance(tree, id, constituents)
            })
            .collect()
    }

    pub fn instance_for_range(
        tree: &TopologyArena,
        id: &str,
        start: NodeIndex,
        end: NodeIndex,
    ) -> DomainResult<Option<Self>> {
        Ok(Self::instances_for_range(tree, id, start, end)?
            .into_iter()
            .next())
    }

    fn flatten(
        tree: &TopologyArena,
        id: &str,
        constituents: Vec<Constituent>,
        kind: ComboKind,
    ) -> DomainResult<Self> {
        if constituents.is_empty() {
            return Err(DomainError::EmptyCombo(id.to_string()));
        }

        let mut cumulative = 0.0;
        let mut proxies: Vec<SequenceProxy> = Vec::with_capacity(constituents.len());
        let mut base: Vec<(NodeIndex, f64)> = Vec::new();

        for constituent in &constituents {
            match constituent {
                Constituent::Sequence(idx) => {
                    if tree.get_node(*idx).is_none() {
                        return Err(DomainError::NodeNotFound(format!("{idx:?}")));
                    }
                    if !tree.is_sequence(*idx) {
                        return Err(DomainError::NotASequence(tree.label(*idx)));
                    }
                    base.push((*idx, cumulative));
                }
                Constituent::Combo(inner) => {
                    base.extend(
                        inner
                            .base
                            .iter()
                            .map(|&(idx, offset)| (idx, cumulative + offset)),
                    );
                }
            }

            let length = constituent.length(tree);
            let at = insertion_index(proxies.iter().map(|p| p.position), cumulative);
            proxies.insert(
                at,
                SequenceProxy {
                    target_id: constituent.id(tree),
                    position: cumulative,
                    length,
                },
            );
            cumulative += length;
        }

        for (i, &(idx, _)) in base.iter().enumerate() {
            if base[..i].iter().any(|&(earlier, _)| earlier == idx) {
                return Err(DomainError::DuplicateConstituent {
                    combo: id.to_string(),
                    constituent: tree.label(idx),
                });
            }
        }

        Ok(Self {
            id: id.to_string(),
            kind,
            constituents,
            proxies,
            base,
            length: cumulative,
        })
    }

    fn base_forms_ring(&self, tree: &TopologyArena) -> bool {
        let views: Vec<SequenceRef<'_>> = self
            .base
            .iter()
            .filter_map(|&(idx, _)| SequenceRef::new(tree, idx).ok())
            .collect();
        views.len() == self.base.len() && forms_ring(&views)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ComboKind {
        self.kind
    }

    pub fn is_linear(&self) -> bool {
        self.kind == ComboKind::Linear
    }

    pub fn is_ring(&self) -> bool {
        self.kind == ComboKind::Ring
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn constituent_ids(&self) -> Vec<&str> {
        self.proxies.iter().map(|p| p.target_id.as_str()).collect()
    }

    pub fn proxies(&self) -> &[SequenceProxy] {
        &self.proxies
    }

    pub fn proxy(&self, target_id: &str) -> Option<&SequenceProxy> {
        self.proxies.iter().find(|p| p.target_id == target_id)
    }

    /// Non-combo constituents, left to right, regardless of nesting depth.
    pub fn base_constituents(&self) -> Vec<NodeIndex> {
        self.base.iter().map(|&(idx, _)| idx).collect()
    }

    pub fn base_entries(&self) -> &[(NodeIndex, f64)] {
        &self.base
    }

    /// Absolute offset of a base constituent within this combo.
    pub fn base_offset(&self, constituent: NodeIndex) -> Option<f64> {
        self.base
            .iter()
            .find(|&&(idx, _)| idx == constituent)
            .map(|&(_, offset)| offset)
    }

    pub fn view<'a>(&'a self, tree: &'a TopologyArena) -> ComboRef<'a> {
        ComboRef::new(tree, self)
    }
}

impl PartialEq for ComboSequence {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.base_constituents() == other.base_constituents()
    }
}

/// Extend `chain` backward through predecessor declarations until it
/// starts at `terminal`, returning every chain that gets there without
/// visiting a sequence twice.
fn extend_chains(tree: &TopologyArena, terminal: NodeIndex, chain: Vec<NodeIndex>) -> Vec<Vec<NodeIndex>> {
    let Some(&first) = chain.first() else {
        return Vec::new();
    };
    if first == terminal {
        return vec![chain];
    }
    tree.predecessors(first)
        .iter()
        .filter_map(|pred| tree.sequence(tree.root(), pred))
        .filter(|pred| !chain.contains(pred))
        .flat_map(|pred| {
            let mut extended = Vec::with_capacity(chain.len() + 1);
            extended.push(pred);
            extended.extend_from_slice(&chain);
            extend_chains(tree, terminal, extended)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{NodeData, NodeType};
    use crate::domain::sequence::Sequence;

    fn add_sequence(tree: &mut TopologyArena, id: &str, length: f64, preds: &[&str]) -> NodeIndex {
        let root = tree.root();
        let seq = tree.create_sequence(
            NodeData::new(id, NodeType::sequence()).with_length(length),
            preds.iter().map(|p| p.to_string()).collect(),
        );
        tree.add_node(root, seq).unwrap();
        seq
    }

    #[test]
    fn given_three_sequences_when_combining_then_offsets_accumulate() {
        let mut tree = TopologyArena::new("acc");
        let a = add_sequence(&mut tree, "A", 10.0, &[]);
        let b = add_sequence(&mut tree, "B", 5.0, &["A"]);
        let c = add_sequence(&mut tree, "C", 7.0, &["B"]);

        let combo = ComboSequence::instance(
            &tree,
            "ABC",
            vec![Constituent::Sequence(a), Constituent::Sequence(b), Constituent::Sequence(c)],
        )
        .unwrap();

        assert_eq!(combo.length(), 22.0);
        assert!(combo.is_linear());
        let positions: Vec<f64> = combo.proxies().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0.0, 10.0, 15.0]);
        assert_eq!(combo.constituent_ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn given_nested_combo_when_resolving_position_then_uses_absolute_offset() {
        let mut tree = TopologyArena::new("acc");
        let a = add_sequence(&mut tree, "A", 10.0, &[]);
        let b = add_sequence(&mut tree, "B", 5.0, &["A"]);
        let c = add_sequence(&mut tree, "C", 7.0, &["B"]);
        let x = tree.create_node(NodeData::new("X", NodeType::generic()).with_position(2.0));
        tree.add_node(b, x).unwrap();

        let ab = ComboSequence::linear(&tree, "AB", vec![Constituent::Sequence(a), Constituent::Sequence(b)]).unwrap();
        let abc = ComboSequence::linear(
            &tree,
            "ABC",
            vec![Constituent::Combo(Arc::new(ab)), Constituent::Sequence(c)],
        )
        .unwrap();

        assert_eq!(abc.base_constituents(), vec![a, b, c]);
        assert_eq!(abc.view(&tree).position(x).unwrap(), 12.0);
    }

    #[test]
    fn given_constituent_twice_when_combining_then_duplicate_constituent() {
        let mut tree = TopologyArena::new("acc");
        let a = add_sequence(&mut tree, "A", 10.0, &[]);

        let result = ComboSequence::linear(&tree, "AA", vec![Constituent::Sequence(a), Constituent::Sequence(a)]);

        assert!(matches!(result, Err(DomainError::DuplicateConstituent { .. })));
    }

    #[test]
    fn given_open_chain_when_forcing_ring_then_not_a_ring() {
        let mut tree = TopologyArena::new("acc");
        let a = add_sequence(&mut tree, "A", 10.0, &[]);
        let b = add_sequence(&mut tree, "B", 5.0, &["A"]);

        let result = ComboSequence::ring(&tree, "R", vec![Constituent::Sequence(a), Constituent::Sequence(b)]);

        assert_eq!(result.unwrap_err(), DomainError::NotARing("R".to_string()));
    }

    #[test]
    fn given_branching_predecessors_when_building_range_then_one_combo_per_chain() {
        let mut tree = TopologyArena::new("acc");
        let start = add_sequence(&mut tree, "S", 1.0, &[]);
        add_sequence(&mut tree, "U", 1.0, &["S"]);
        add_sequence(&mut tree, "D", 1.0, &["S"]);
        let end = add_sequence(&mut tree, "E", 1.0, &["U", "D"]);

        let combos = ComboSequence::instances_for_range(&tree, "range", start, end).unwrap();

        let chains: Vec<Vec<&str>> = combos.iter().map(|c| c.constituent_ids()).collect();
        assert_eq!(chains, vec![vec!["S", "U", "E"], vec!["S", "D", "E"]]);
    }

    #[test]
    fn given_empty_constituents_when_combining_then_empty_combo_error() {
        let tree = TopologyArena::new("acc");
        let result = ComboSequence::linear(&tree, "none", vec![]);
        assert!(matches!(result, Err(DomainError::EmptyCombo(_))));
    }
}
