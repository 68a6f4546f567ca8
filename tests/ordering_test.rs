//! Tests for ordering sequences from predecessor declarations

use rstest::rstest;

use acctree::domain::{Sequence, TopologyBuilder};
use acctree::util::testing::{add_sequence, init_test_setup};

fn chain_abc() -> TopologyBuilder {
    init_test_setup();
    let mut builder = TopologyBuilder::new("acc");
    add_sequence(&mut builder, "C", 7.0, &["B"]);
    add_sequence(&mut builder, "A", 10.0, &[]);
    add_sequence(&mut builder, "B", 5.0, &["A"]);
    builder
}

#[rstest]
#[case(&["C", "A", "B"])]
#[case(&["A", "B", "C"])]
#[case(&["B", "C", "A"])]
#[case(&["C", "B", "A"])]
fn given_any_input_order_when_ordering_then_predecessor_order(#[case] input: &[&str]) {
    // Arrange
    let acc = chain_abc().build().unwrap();

    // Act
    let ordered = acc.order_sequences(input).unwrap();

    // Assert
    let ids: Vec<&str> = ordered.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
}

#[test]
fn given_disconnected_sequences_when_ordering_then_error_carries_input() {
    // Arrange
    let mut builder = chain_abc();
    add_sequence(&mut builder, "X", 1.0, &[]);
    let acc = builder.build().unwrap();

    // Act
    let result = acc.order_sequences(&["C", "X", "A", "B"]);

    // Assert
    let err = result.unwrap_err();
    let mut ids = err.sequences.clone();
    ids.sort();
    assert_eq!(ids, vec!["A", "B", "C", "X"]);
    assert!(err.to_string().contains('X'));
}

#[test]
fn given_empty_selection_when_ordering_then_empty() {
    let acc = chain_abc().build().unwrap();

    let ordered = acc.order_sequences(&[]).unwrap();

    assert!(ordered.is_empty());
}

#[test]
fn given_gap_in_chain_when_ordering_then_fails() {
    // A and C are both present but B, which links them, is not selected
    let acc = chain_abc().build().unwrap();

    let result = acc.order_sequences(&["A", "C"]);

    assert!(result.is_err());
}

#[rstest]
#[case(&["A", "B", "C"], false)]
#[case(&["A"], false)]
fn given_open_chain_when_checking_ring_then_false(#[case] ids: &[&str], #[case] expected: bool) {
    let acc = chain_abc().build().unwrap();

    assert_eq!(acc.forms_ring(ids), expected);
}

#[test]
fn given_closing_predecessor_when_checking_ring_then_true() {
    // Arrange
    let mut builder = chain_abc();
    let a = builder.node_with_id("A").unwrap();
    builder.set_predecessors(a, vec!["C".into()]).unwrap();
    let acc = builder.build().unwrap();

    // Act
    let closed = acc.forms_ring(&["A", "B", "C"]);

    // Assert
    assert!(closed);
    let a = acc.sequence("A").unwrap();
    let b = acc.sequence("B").unwrap();
    assert!(acctree::domain::Precedence::can_precede(&a, &b));
    assert!(!acctree::domain::Precedence::can_precede(&b, &a));
}
