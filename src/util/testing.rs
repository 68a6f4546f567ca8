use std::sync::Once;
use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::domain::{ComboDefinition, NodeData, NodeIndex, NodeType, TopologyBuilder};

static TEST_SETUP: Once = Once::new();

/// Filter used when `RUST_LOG` is unset; arena moves are per node and
/// drown everything else.
const DEFAULT_TEST_FILTER: &str = "debug,acctree::domain::arena=info";

/// Install the tracing subscriber shared by all tests, once per process.
///
/// Output goes through the test writer, so it only shows for failing tests
/// or with `--nocapture`.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
        match installed {
            Ok(()) => info!("test logging ready"),
            Err(e) => eprintln!("test logging not installed: {e}"),
        }
    });
}

/// Add a plain sequence of `length` under the root.
pub fn add_sequence(builder: &mut TopologyBuilder, id: &str, length: f64, predecessors: &[&str]) -> NodeIndex {
    let root = builder.root();
    builder
        .add_sequence(
            root,
            NodeData::new(id, NodeType::sequence()).with_length(length),
            predecessors.iter().map(|p| p.to_string()).collect(),
        )
        .unwrap_or_else(|e| panic!("add sequence {id}: {e}"))
}

/// Add a beam position monitor at `position`.
pub fn add_bpm(builder: &mut TopologyBuilder, seq: NodeIndex, id: &str, position: f64) -> NodeIndex {
    builder
        .add_to(seq, NodeData::new(id, NodeType::new("BPM", &["node"])).with_position(position))
        .unwrap_or_else(|e| panic!("add node {id}: {e}"))
}

/// Storage ring of four 10 m arcs A1 -> A2 -> A3 -> A4 -> A1, each holding
/// one BPM at 2 m, combined as `RING`.
pub fn four_arc_ring() -> TopologyBuilder {
    let mut builder = TopologyBuilder::new("ring");
    let arcs = [("A1", "A4"), ("A2", "A1"), ("A3", "A2"), ("A4", "A3")];
    for (id, predecessor) in arcs {
        let seq = add_sequence(&mut builder, id, 10.0, &[predecessor]);
        add_bpm(&mut builder, seq, &format!("{id}:BPM"), 2.0);
    }
    builder.register_combo(ComboDefinition::new("RING", &["A1", "A2", "A3", "A4"]));
    builder
}
