//! Ordering of sequences from their predecessor declarations.
//!
//! Predecessors are pure metadata: they are independent of tree parentage
//! and only consulted here and by ring detection.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, instrument};

use crate::domain::error::SequenceOrderingError;

/// Anything that carries an id and a list of predecessor ids.
pub trait Precedence {
    fn precedence_id(&self) -> &str;

    fn predecessors(&self) -> &[String];

    /// True if `other` declares this item as one of its predecessors.
    fn can_precede(&self, other: &Self) -> bool {
        other
            .predecessors()
            .iter()
            .any(|p| p == self.precedence_id())
    }
}

/// True iff the list, read cyclically, links every element to the one
/// before it through its predecessor declarations.
pub fn forms_ring<T: Precedence>(ordered: &[T]) -> bool {
    if ordered.len() < 2 {
        return false;
    }
    let mut previous = &ordered[ordered.len() - 1];
    for item in ordered {
        if !previous.can_precede(item) {
            return false;
        }
        previous = item;
    }
    true
}

/// Reconstruct a linear ordering of `items` using only predecessor metadata.
///
/// The result does not depend on the iteration order of the input. A
/// chain that cannot be linked onto the tail of the ordered prefix makes
/// the whole input unorderable.
#[instrument(level = "debug", skip(items))]
pub fn order_sequences<T, I>(items: I) -> Result<Vec<T>, SequenceOrderingError>
where
    T: Precedence,
    I: IntoIterator<Item = T>,
{
    let mut table: BTreeMap<String, T> = BTreeMap::new();
    let mut input_ids = Vec::new();
    for item in items {
        let id = item.precedence_id().to_string();
        input_ids.push(id.clone());
        table.insert(id, item);
    }

    let Some(start) = table.keys().next().cloned() else {
        return Ok(Vec::new());
    };
    let mut ordered = take_chain(&mut table, start);

    while let Some(next) = table.keys().next().cloned() {
        let chain = take_chain(&mut table, next);
        let linked = match (ordered.back(), chain.front()) {
            (Some(last), Some(first)) => last.can_precede(first),
            _ => false,
        };
        if !linked {
            debug!("cannot link chain starting at {:?}", chain.front().map(|c| c.precedence_id()));
            return Err(SequenceOrderingError {
                sequences: input_ids,
            });
        }
        ordered.extend(chain);
    }

    Ok(ordered.into())
}

/// Remove `start` and its predecessors (transitively, first present one
/// wins) from the table, returning them with the earliest first.
fn take_chain<T: Precedence>(table: &mut BTreeMap<String, T>, start: String) -> VecDeque<T> {
    let mut chain = VecDeque::new();
    let mut next = Some(start);
    while let Some(item) = next.and_then(|id| table.remove(&id)) {
        next = item
            .predecessors()
            .iter()
            .find(|p| table.contains_key(p.as_str()))
            .cloned();
        chain.push_front(item);
    }
    chain
}
