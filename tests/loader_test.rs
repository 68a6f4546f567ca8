//! Tests for loading and saving topology documents

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use acctree::application::services::TopologyService;
use acctree::application::{ApplicationError, TopologyLoader};
use acctree::config::Settings;
use acctree::domain::{NodeType, Sequence};
use acctree::infrastructure::traits::RealFileSystem;
use acctree::util::testing::init_test_setup;
use acctree::ServiceContainer;

const BASE: &str = r#"
name = "xdxf"

[attributes]
system = "linac"
ver = "2.1"
date = "01.15.2024"

[[children]]
name = "sequence"
attributes = { id = "MEBT", len = "10", pos = "0" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:BPM1", type = "BPM", pos = "2.5", len = "0.1" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:BPM2", type = "BPM", pos = "4" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:W1", type = "Wiggler", pos = "6", status = "false" }

[[children]]
name = "sequence"
attributes = { id = "DTL", len = "20", pos = "10", predecessors = "MEBT" }

[[children.children]]
name = "node"
attributes = { id = "DTL:QH1", type = "QH", pos = "1" }

[[children]]
name = "comboseq"
attributes = { id = "FRONT" }

[[children.children]]
name = "sequence"
attributes = { id = "MEBT" }

[[children.children]]
name = "sequence"
attributes = { id = "DTL" }
"#;

const DELTA: &str = r#"
name = "xdxf"

[[children]]
name = "sequence"
attributes = { id = "MEBT" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:BPM1", pos = "7" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:BPM2", exclude = "true" }

[[children.children]]
name = "node"
attributes = { id = "MEBT:BPM3", type = "BPM", pos = "5" }
"#;

fn service() -> TopologyService {
    init_test_setup();
    TopologyService::new(Arc::new(RealFileSystem), TopologyLoader::default())
}

fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write document");
    path
}

// ============================================================
// Loading
// ============================================================

#[test]
fn given_document_when_loading_then_tree_and_metadata_built() {
    // Arrange
    let service = service();

    // Act
    let acc = service.load_str(BASE).unwrap();

    // Assert
    assert_eq!(acc.system_id(), "linac");
    assert_eq!(acc.version(), Some("2.1"));
    assert_eq!(acc.date(), Some("01.15.2024"));
    let dtl = acc.sequence("DTL").unwrap();
    assert_eq!(dtl.predecessors(), &["MEBT".to_string()]);
    let quad = acc.node_with_id("DTL:QH1").unwrap();
    assert_eq!(acc.root().position(quad).unwrap(), 11.0);
    assert!(acc.node_data(quad).unwrap().node_type.is_kind_of("magnet"));
    let front = acc.combo_sequence("FRONT").unwrap();
    assert_eq!(front.length(), 30.0);
    assert_eq!(front.position(quad).unwrap(), 11.0);
}

#[test]
fn given_unknown_element_type_when_loading_then_generic_placeholder() {
    // Arrange
    let service = service();

    // Act
    let acc = service.load_str(BASE).unwrap();

    // Assert
    let wiggler = acc.node_with_id("MEBT:W1").unwrap();
    let data = acc.node_data(wiggler).unwrap();
    assert_eq!(data.node_type.tag, NodeType::GENERIC);
    assert_eq!(data.soft_type.as_deref(), Some("Wiggler"));
    assert!(!data.status);
}

#[test]
fn given_configured_node_type_when_loading_through_container_then_recognized() {
    // Arrange
    init_test_setup();
    let settings = Settings {
        node_types: BTreeMap::from([(
            "Wiggler".to_string(),
            vec!["magnet".to_string(), "node".to_string()],
        )]),
        ..Settings::default()
    };
    let container = ServiceContainer::with_deps(settings, Arc::new(RealFileSystem));

    // Act
    let acc = container.topology.load_str(BASE).unwrap();

    // Assert
    let wiggler = acc.node_with_id("MEBT:W1").unwrap();
    let data = acc.node_data(wiggler).unwrap();
    assert_eq!(data.node_type.tag, "Wiggler");
    assert!(data.node_type.is_kind_of("magnet"));
}

#[test]
fn given_wrong_root_element_when_loading_then_invalid_document() {
    let service = service();

    let result = service.load_str("name = \"html\"\n");

    assert!(matches!(result, Err(ApplicationError::InvalidDocument { .. })));
}

// ============================================================
// Deltas
// ============================================================

#[test]
fn given_base_and_delta_when_loading_then_delta_applied_in_place() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let base = write_doc(&temp, "base.toml", BASE);
    let delta = write_doc(&temp, "delta.toml", DELTA);
    let service = service();

    // Act
    let acc = service.load_files(&base, &[delta]).unwrap();

    // Assert
    let mebt = acc.sequence("MEBT").unwrap();
    assert_eq!(mebt.describe(&mebt.nodes()), "MEBT:BPM3, MEBT:W1, MEBT:BPM1");
    assert!(acc.node_with_id("MEBT:BPM2").is_none());
    let bpm1 = acc.node_with_id("MEBT:BPM1").unwrap();
    assert_eq!(acc.node_data(bpm1).unwrap().length, 0.1);
    assert_eq!(acc.system_id(), "linac");
    assert_eq!(acc.version(), Some("2.1"));
}

// ============================================================
// Saving
// ============================================================

#[test]
fn given_loaded_accelerator_when_saved_and_reloaded_then_topology_preserved() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let service = service();
    let original = service.load_str(BASE).unwrap();
    let target = temp.path().join("out/optics.toml");

    // Act
    service.save_file(&original, &target).unwrap();
    let reloaded = service.load_file(&target).unwrap();

    // Assert
    assert_eq!(reloaded.system_id(), "linac");
    assert_eq!(reloaded.version(), Some("2.1"));
    let ids = |acc: &acctree::Accelerator| -> Vec<String> {
        acc.root()
            .all_nodes()
            .into_iter()
            .filter_map(|n| acc.tree().id(n).map(str::to_string))
            .collect()
    };
    assert_eq!(ids(&reloaded), ids(&original));
    let quad = reloaded.node_with_id("DTL:QH1").unwrap();
    assert_eq!(reloaded.root().position(quad).unwrap(), 11.0);
    let wiggler = reloaded.node_with_id("MEBT:W1").unwrap();
    assert_eq!(
        reloaded.node_data(wiggler).unwrap().soft_type.as_deref(),
        Some("Wiggler")
    );
    assert_eq!(
        reloaded.combo_sequence("FRONT").map(|c| c.combo().constituent_ids()),
        Some(vec!["MEBT", "DTL"])
    );
}

#[test]
fn given_accelerator_when_serialized_then_unknown_type_written_back_unchanged() {
    // Arrange
    let service = service();
    let acc = service.load_str(BASE).unwrap();

    // Act
    let text = service.to_toml(&acc).unwrap();

    // Assert
    assert!(text.contains("Wiggler"));
    assert!(!text.contains(NodeType::GENERIC));
    assert!(text.contains("comboseq"));
}
