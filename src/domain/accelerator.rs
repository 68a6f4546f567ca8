//! Published, read-only accelerator topology.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use crate::domain::arena::TopologyArena;
use crate::domain::builder::{ComboDefinition, ComboFailurePolicy, TopologyBuilder};
use crate::domain::combo::{ComboSequence, Constituent};
use crate::domain::error::{DomainError, DomainResult, SequenceOrderingError};
use crate::domain::node::{NodeData, NodeIndex};
use crate::domain::ordering;
use crate::domain::registry::ComboTypeRegistry;
use crate::domain::sequence::{AnySequence, ComboRef, Sequence, SequenceRef};

/// Immutable snapshot of a facility: the primary tree plus its named
/// combo sequences.
///
/// Only `&self` operations exist, so a snapshot can be shared across
/// threads behind an `Arc` and queried without locking.
#[derive(Debug, Clone)]
pub struct Accelerator {
    tree: TopologyArena,
    combos: BTreeMap<String, Arc<ComboSequence>>,
    definitions: Vec<ComboDefinition>,
    combo_types: ComboTypeRegistry,
    combo_failure_policy: ComboFailurePolicy,
    version: Option<String>,
    date: Option<String>,
}

impl Accelerator {
    pub(crate) fn new(
        tree: TopologyArena,
        combos: BTreeMap<String, Arc<ComboSequence>>,
        definitions: Vec<ComboDefinition>,
        combo_types: ComboTypeRegistry,
        combo_failure_policy: ComboFailurePolicy,
        version: Option<String>,
        date: Option<String>,
    ) -> Self {
        Self {
            tree,
            combos,
            definitions,
            combo_types,
            combo_failure_policy,
            version,
            date,
        }
    }

    pub fn tree(&self) -> &TopologyArena {
        &self.tree
    }

    /// The root sequence, spanning the whole facility.
    pub fn root(&self) -> SequenceRef<'_> {
        SequenceRef::root_of(&self.tree)
    }

    pub fn system_id(&self) -> &str {
        self.tree.id(self.tree.root()).unwrap_or_default()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Top-level sequence with the given id.
    pub fn sequence(&self, id: &str) -> Option<SequenceRef<'_>> {
        self.tree
            .sequence(self.tree.root(), id)
            .and_then(|idx| SequenceRef::new(&self.tree, idx).ok())
    }

    /// All top-level sequences.
    pub fn sequences(&self) -> Vec<SequenceRef<'_>> {
        self.tree
            .sequences(self.tree.root())
            .iter()
            .filter_map(|&idx| SequenceRef::new(&self.tree, idx).ok())
            .collect()
    }

    pub fn combo_sequence(&self, id: &str) -> Option<ComboRef<'_>> {
        self.combos.get(id).map(|combo| combo.view(&self.tree))
    }

    /// Registered combos ordered by id.
    pub fn combo_sequences(&self) -> Vec<ComboRef<'_>> {
        self.combos
            .values()
            .map(|combo| combo.view(&self.tree))
            .collect()
    }

    pub fn ring(&self, id: &str) -> Option<ComboRef<'_>> {
        self.combo_sequence(id).filter(|c| c.combo().is_ring())
    }

    pub fn rings(&self) -> Vec<ComboRef<'_>> {
        self.combo_sequences()
            .into_iter()
            .filter(|c| c.combo().is_ring())
            .collect()
    }

    /// Top-level sequence with the given id, falling back to the combos.
    pub fn find_sequence(&self, id: &str) -> Option<AnySequence<'_>> {
        self.sequence(id)
            .map(AnySequence::Primary)
            .or_else(|| self.combo_sequence(id).map(AnySequence::Combo))
    }

    /// Node with the given id, found by scanning every level of the tree.
    #[instrument(level = "trace", skip(self))]
    pub fn node(&self, id: &str) -> Option<NodeIndex> {
        self.root()
            .all_nodes()
            .into_iter()
            .find(|&idx| self.tree.id(idx) == Some(id))
    }

    /// Node with the given id through the identifier tables.
    pub fn node_with_id(&self, id: &str) -> Option<NodeIndex> {
        self.tree.node_with_id(self.tree.root(), id)
    }

    pub fn node_data(&self, node: NodeIndex) -> Option<&NodeData> {
        self.tree.data(node)
    }

    /// Build a combo from top-level sequence ids without registering it.
    pub fn combo_instance(&self, id: &str, sequence_ids: &[&str]) -> DomainResult<ComboSequence> {
        let constituents = sequence_ids
            .iter()
            .map(|seq_id| {
                self.tree
                    .sequence(self.tree.root(), seq_id)
                    .map(Constituent::Sequence)
                    .ok_or_else(|| DomainError::UnknownSequence(seq_id.to_string()))
            })
            .collect::<DomainResult<Vec<_>>>()?;
        ComboSequence::instance(&self.tree, id, constituents)
    }

    /// Every combo running from `start` to `end` through predecessor links.
    pub fn combos_for_range(&self, id: &str, start: &str, end: &str) -> DomainResult<Vec<ComboSequence>> {
        let start = self.top_level_index(start)?;
        let end = self.top_level_index(end)?;
        ComboSequence::instances_for_range(&self.tree, id, start, end)
    }

    pub fn combo_for_range(&self, id: &str, start: &str, end: &str) -> DomainResult<Option<ComboSequence>> {
        let start = self.top_level_index(start)?;
        let end = self.top_level_index(end)?;
        ComboSequence::instance_for_range(&self.tree, id, start, end)
    }

    fn top_level_index(&self, id: &str) -> DomainResult<NodeIndex> {
        self.tree
            .sequence(self.tree.root(), id)
            .ok_or_else(|| DomainError::UnknownSequence(id.to_string()))
    }

    /// Order top-level sequences by their predecessor declarations.
    ///
    /// Unknown ids are ignored.
    pub fn order_sequences(&self, ids: &[&str]) -> Result<Vec<SequenceRef<'_>>, SequenceOrderingError> {
        ordering::order_sequences(ids.iter().filter_map(|id| self.sequence(id)))
    }

    pub fn forms_ring(&self, ids: &[&str]) -> bool {
        let sequences: Vec<SequenceRef<'_>> = ids.iter().filter_map(|id| self.sequence(id)).collect();
        sequences.len() == ids.len() && ordering::forms_ring(&sequences)
    }

    /// Combo definitions this snapshot was built from.
    pub fn combo_definitions(&self) -> &[ComboDefinition] {
        &self.definitions
    }

    /// Clone this snapshot into a builder for reconfiguration.
    pub fn to_builder(&self) -> TopologyBuilder {
        TopologyBuilder::from_parts(
            self.tree.clone(),
            self.definitions.clone(),
            self.combo_types.clone(),
            self.combo_failure_policy,
            self.version.clone(),
            self.date.clone(),
        )
    }
}
