//! Serialize accelerator topologies into structured documents.

use chrono::Local;
use itertools::Itertools;
use tracing::instrument;

use crate::application::loader::{COMBO_TAG, NODE_TAG, SEQUENCE_TAG};
use crate::domain::{Accelerator, ComboSequence, NodeIndex, NodeType, TopologyArena};
use crate::infrastructure::traits::DataAdaptor;

/// Date format of the `date` attribute.
pub const DATE_FORMAT: &str = "%m.%d.%Y";

/// Write the whole accelerator into `adaptor`, which becomes the root
/// element. Combos that failed to build are not written.
#[instrument(level = "debug", skip_all)]
pub fn write_accelerator<D: DataAdaptor>(accelerator: &Accelerator, adaptor: &mut D) {
    adaptor.set_value("system", accelerator.system_id());
    if let Some(version) = accelerator.version() {
        adaptor.set_value("ver", version);
    }
    adaptor.set_value("date", Local::now().format(DATE_FORMAT));

    let tree = accelerator.tree();
    write_children(tree, tree.root(), adaptor);

    for definition in accelerator.combo_definitions() {
        if let Some(combo) = accelerator.combo_sequence(&definition.id) {
            let child = adaptor.create_child(COMBO_TAG);
            write_combo(combo.combo(), definition.combo_type.as_deref(), child);
        }
    }
}

/// Write a sequence's attributes, predecessors and all nested children.
pub fn write_sequence<D: DataAdaptor>(tree: &TopologyArena, seq: NodeIndex, adaptor: &mut D) {
    write_node(tree, seq, adaptor);
    let predecessors = tree.predecessors(seq);
    if !predecessors.is_empty() {
        adaptor.set_value("predecessors", predecessors.iter().join(" "));
    }
    write_children(tree, seq, adaptor);
}

fn write_children<D: DataAdaptor>(tree: &TopologyArena, seq: NodeIndex, adaptor: &mut D) {
    for &child in tree.nodes(seq) {
        if tree.is_sequence(child) {
            write_sequence(tree, child, adaptor.create_child(SEQUENCE_TAG));
        } else {
            write_node(tree, child, adaptor.create_child(NODE_TAG));
        }
    }
}

/// Write the attributes of a single node.
pub fn write_node<D: DataAdaptor>(tree: &TopologyArena, node: NodeIndex, adaptor: &mut D) {
    let Some(data) = tree.data(node) else {
        return;
    };
    adaptor.set_value("id", &data.id);
    // generic placeholders keep the tag they were read with
    let tag = match data.soft_type.as_deref() {
        Some(soft_type) if data.node_type.tag == NodeType::GENERIC => soft_type,
        _ => data.node_type.tag.as_str(),
    };
    if tag != NodeType::SEQUENCE {
        adaptor.set_value("type", tag);
    }
    if let Some(soft_type) = &data.soft_type {
        adaptor.set_value("softType", soft_type);
    }
    if let Some(pid) = &data.pid {
        adaptor.set_value("pid", pid);
    }
    if let Some(eid) = &data.eid {
        adaptor.set_value("eid", eid);
    }
    adaptor.set_value("status", data.status);
    adaptor.set_value("pos", data.position);
    adaptor.set_value("s", data.s_display);
    adaptor.set_value("len", data.length);
}

/// Write a combo as its id, optional type tag and constituent ids.
pub fn write_combo<D: DataAdaptor>(combo: &ComboSequence, combo_type: Option<&str>, adaptor: &mut D) {
    adaptor.set_value("id", combo.id());
    if let Some(combo_type) = combo_type {
        adaptor.set_value("type", combo_type);
    }
    for id in combo.constituent_ids() {
        adaptor.create_child(SEQUENCE_TAG).set_value("id", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::loader::ROOT_TAG;
    use crate::domain::{NodeData, TopologyBuilder};
    use crate::infrastructure::DataTree;

    #[test]
    fn given_accelerator_when_writing_then_date_uses_month_day_year() {
        let acc = TopologyBuilder::new("acc").build().unwrap();
        let mut doc = DataTree::new(ROOT_TAG);

        write_accelerator(&acc, &mut doc);

        let date = doc.string_value("date").unwrap();
        assert!(chrono::NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok());
        assert_eq!(doc.string_value("system"), Some("acc"));
    }

    #[test]
    fn given_sequence_with_predecessors_when_writing_then_space_separated() {
        let mut builder = TopologyBuilder::new("acc");
        let root = builder.root();
        let seq = builder
            .add_sequence(root, NodeData::new("B", NodeType::sequence()), vec!["A".into(), "Z".into()])
            .unwrap();
        let mut doc = DataTree::new(SEQUENCE_TAG);

        write_sequence(builder.tree(), seq, &mut doc);

        assert_eq!(doc.string_value("predecessors"), Some("A Z"));
        assert!(!doc.has_attribute("type"));
    }
}
