//! Populate topology builders from structured documents.
//!
//! Document layout: a root `xdxf` element with `system`, `ver` and `date`
//! attributes, nested `sequence` and `node` elements, and `comboseq`
//! elements naming the sequences they combine.

use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{
    Accelerator, ComboDefinition, ComboFailurePolicy, DuplicatePolicy, NodeData, NodeIndex,
    NodeType, NodeTypeRegistry, TopologyBuilder,
};
use crate::infrastructure::traits::DataAdaptor;

pub const ROOT_TAG: &str = "xdxf";
pub const SEQUENCE_TAG: &str = "sequence";
pub const NODE_TAG: &str = "node";
pub const COMBO_TAG: &str = "comboseq";

/// Reads topology documents into builders.
#[derive(Debug, Clone, Default)]
pub struct TopologyLoader {
    node_types: NodeTypeRegistry,
    duplicate_policy: DuplicatePolicy,
    combo_failure_policy: ComboFailurePolicy,
}

impl TopologyLoader {
    pub fn new(
        node_types: NodeTypeRegistry,
        duplicate_policy: DuplicatePolicy,
        combo_failure_policy: ComboFailurePolicy,
    ) -> Self {
        Self {
            node_types,
            duplicate_policy,
            combo_failure_policy,
        }
    }

    /// Loader using the policies and extra node types from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut node_types = NodeTypeRegistry::default();
        node_types.extend_from(&settings.node_types);
        Self::new(
            node_types,
            settings.duplicate_policy,
            settings.combo_failure_policy,
        )
    }

    pub fn node_types(&self) -> &NodeTypeRegistry {
        &self.node_types
    }

    /// Fresh builder populated from `adaptor`.
    pub fn builder_from<D: DataAdaptor>(&self, adaptor: &D) -> ApplicationResult<TopologyBuilder> {
        let system_id = adaptor.string_value("system").unwrap_or(ROOT_TAG);
        let mut builder = TopologyBuilder::new(system_id)
            .with_duplicate_policy(self.duplicate_policy)
            .with_combo_failure_policy(self.combo_failure_policy);
        self.update(&mut builder, adaptor)?;
        Ok(builder)
    }

    /// Build an accelerator from a single document.
    pub fn load<D: DataAdaptor>(&self, adaptor: &D) -> ApplicationResult<Accelerator> {
        Ok(self.builder_from(adaptor)?.build()?)
    }

    /// Apply a document to an existing builder.
    ///
    /// Existing nodes are updated in place, new ones created, and elements
    /// marked `exclude` removed, so a base document can be followed by
    /// any number of delta documents.
    #[instrument(level = "debug", skip(self, builder, adaptor))]
    pub fn update<D: DataAdaptor>(&self, builder: &mut TopologyBuilder, adaptor: &D) -> ApplicationResult<()> {
        if adaptor.name() != ROOT_TAG {
            return Err(ApplicationError::InvalidDocument {
                message: format!("expected root element {ROOT_TAG}, found {}", adaptor.name()),
            });
        }
        if let Some(system) = adaptor.string_value("system") {
            builder.set_system_id(system);
        }
        if adaptor.has_attribute("ver") {
            builder.set_version(adaptor.string_value("ver").map(str::to_string));
        }
        if adaptor.has_attribute("date") {
            builder.set_date(adaptor.string_value("date").map(str::to_string));
        }

        let root = builder.root();
        self.update_children(builder, root, adaptor)?;

        for combo in adaptor.child_adaptors(COMBO_TAG) {
            let Some(id) = combo.string_value("id") else {
                warn!("skipping {} without id", COMBO_TAG);
                continue;
            };
            let sequences = combo
                .child_adaptors(SEQUENCE_TAG)
                .into_iter()
                .filter_map(|s| s.string_value("id"))
                .map(str::to_string)
                .collect();
            let combo_type = combo
                .string_value("type")
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            debug!("registering combo {}", id);
            builder.register_combo(ComboDefinition {
                id: id.to_string(),
                combo_type,
                sequences,
            });
        }
        Ok(())
    }

    fn update_children<D: DataAdaptor>(
        &self,
        builder: &mut TopologyBuilder,
        seq: NodeIndex,
        adaptor: &D,
    ) -> ApplicationResult<()> {
        for child in adaptor.child_adaptors(SEQUENCE_TAG) {
            self.update_child(builder, seq, child, true)?;
        }
        for child in adaptor.child_adaptors(NODE_TAG) {
            self.update_child(builder, seq, child, false)?;
        }
        Ok(())
    }

    fn update_child<D: DataAdaptor>(
        &self,
        builder: &mut TopologyBuilder,
        seq: NodeIndex,
        adaptor: &D,
        is_sequence: bool,
    ) -> ApplicationResult<()> {
        let Some(id) = adaptor.string_value("id") else {
            warn!("skipping {} without id", adaptor.name());
            return Ok(());
        };
        let existing = builder.tree().node_with_id(seq, id);

        if excluded(adaptor) {
            if let Some(node) = existing {
                if let Some(parent) = builder.tree().parent(node) {
                    debug!("excluding {}", id);
                    builder.remove_node(parent, node);
                }
            }
            return Ok(());
        }

        let node = match existing {
            Some(node) => {
                builder.update_node(node, |data| apply_attributes(adaptor, data))?;
                node
            }
            None => {
                let mut data = NodeData::new(id, self.node_type(adaptor, id, is_sequence));
                apply_attributes(adaptor, &mut data);
                if is_sequence {
                    builder.add_sequence(seq, data, Vec::new())?
                } else {
                    builder.add_to(seq, data)?
                }
            }
        };

        if is_sequence && builder.tree().is_sequence(node) {
            if let Some(raw) = adaptor.string_value("predecessors") {
                builder.set_predecessors(node, split_predecessors(raw))?;
            }
            self.update_children(builder, node, adaptor)?;
        }
        Ok(())
    }

    fn node_type<D: DataAdaptor>(&self, adaptor: &D, id: &str, is_sequence: bool) -> NodeType {
        match adaptor.string_value("type").filter(|t| !t.is_empty()) {
            None if is_sequence => NodeType::sequence(),
            None => {
                warn!("{} has no node type, using {}", id, NodeType::GENERIC);
                NodeType::generic()
            }
            Some(tag) => self.node_types.resolve(tag),
        }
    }
}

fn excluded<D: DataAdaptor>(adaptor: &D) -> bool {
    match adaptor.boolean_value("exclude") {
        Ok(flag) => flag.unwrap_or(false),
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

/// Copy attributes present on `adaptor` into `data`.
///
/// Unparsable values are logged and leave the current value untouched.
fn apply_attributes<D: DataAdaptor>(adaptor: &D, data: &mut NodeData) {
    let id = data.id.clone();
    let number = |name: &str| match adaptor.double_value(name) {
        Ok(value) => value,
        Err(e) => {
            warn!("{}: {}", id, e);
            None
        }
    };
    if let Some(position) = number("pos") {
        data.position = position;
    }
    if let Some(length) = number("len") {
        data.length = length;
    }
    if let Some(s) = number("s") {
        data.s_display = s;
    }
    match adaptor.boolean_value("status") {
        Ok(Some(status)) => data.status = status,
        Ok(None) => {}
        Err(e) => warn!("{}: {}", data.id, e),
    }
    if let Some(pid) = adaptor.string_value("pid") {
        data.pid = Some(pid.to_string());
    }
    if let Some(eid) = adaptor.string_value("eid") {
        data.eid = Some(eid.to_string());
    }
    if let Some(soft_type) = adaptor.string_value("softType") {
        data.soft_type = Some(soft_type.to_string());
    } else if data.node_type.tag == NodeType::GENERIC {
        if let Some(tag) = adaptor.string_value("type") {
            data.soft_type = Some(tag.to_string());
        }
    }
}

/// Split a predecessor list separated by whitespace and/or commas.
pub fn split_predecessors(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::DataTree;
    use rstest::rstest;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[rstest]
    #[case("A B", vec!["A", "B"])]
    #[case("A, B,C", vec!["A", "B", "C"])]
    #[case("  ", vec![])]
    fn given_predecessor_list_when_splitting_then_ids(#[case] raw: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_predecessors(raw), expected);
    }

    #[test]
    fn given_bad_number_when_applying_attributes_then_value_kept() {
        let adaptor = DataTree::new(NODE_TAG)
            .with_attr("pos", "abc")
            .with_attr("len", "2.5");
        let mut data = NodeData::new("n", NodeType::generic()).with_position(7.0);

        apply_attributes(&adaptor, &mut data);

        assert_eq!(data.position, 7.0);
        assert_eq!(data.length, 2.5);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn given_node_without_type_when_loading_then_generic_with_warning() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let document = DataTree::new(ROOT_TAG).with_attr("system", "acc").with_child(
            DataTree::new(SEQUENCE_TAG)
                .with_attr("id", "S")
                .with_child(DataTree::new(NODE_TAG).with_attr("id", "S:M1").with_attr("pos", "1.0")),
        );

        let acc = tracing::subscriber::with_default(subscriber, || TopologyLoader::default().load(&document)).unwrap();

        let marker = acc.node_with_id("S:M1").unwrap();
        assert_eq!(acc.node_data(marker).unwrap().node_type.tag, NodeType::GENERIC);
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("S:M1 has no node type"));
    }

    #[test]
    fn given_wrong_root_tag_when_loading_then_invalid_document() {
        let result = TopologyLoader::default().load(&DataTree::new("html"));
        assert!(matches!(result, Err(ApplicationError::InvalidDocument { .. })));
    }
}
