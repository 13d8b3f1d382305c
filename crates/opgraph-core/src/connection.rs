//! Connections between slots inside a symbol.
//!
//! A [`Connection`] is identified by its four endpoint IDs. An endpoint whose
//! parent-or-child ID is [`ChildId::NONE`] refers to the owning symbol's own
//! boundary: a boundary input when it is the source, a boundary output when
//! it is the target.
//!
//! Connections live in an ordered list. The order matters for multi-inputs:
//! the N-th connection into a given `(target, slot)` pair occupies position N
//! of that multi-input.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::id::{ChildId, SlotId};

/// A directed edge between two slots of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source_parent_or_child_id: ChildId,
    pub source_slot_id: SlotId,
    pub target_parent_or_child_id: ChildId,
    pub target_slot_id: SlotId,
}

impl Connection {
    pub fn new(
        source_parent_or_child_id: ChildId,
        source_slot_id: SlotId,
        target_parent_or_child_id: ChildId,
        target_slot_id: SlotId,
    ) -> Self {
        Connection {
            source_parent_or_child_id,
            source_slot_id,
            target_parent_or_child_id,
            target_slot_id,
        }
    }

    /// Returns `true` if the source is one of the symbol's own inputs.
    pub fn is_connected_to_symbol_input(&self) -> bool {
        self.source_parent_or_child_id.is_none()
    }

    /// Returns `true` if the target is one of the symbol's own outputs.
    pub fn is_connected_to_symbol_output(&self) -> bool {
        self.target_parent_or_child_id.is_none()
    }

    /// Returns `true` if both connections feed the same target slot.
    pub fn same_target(&self, other: &Connection) -> bool {
        self.target_parent_or_child_id == other.target_parent_or_child_id
            && self.target_slot_id == other.target_slot_id
    }

    /// Returns `true` if either endpoint is the given child.
    pub fn touches_child(&self, child: ChildId) -> bool {
        self.source_parent_or_child_id == child || self.target_parent_or_child_id == child
    }
}

/// A connection scheduled for removal, with its position in the list and its
/// index within the target multi-input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionEntry {
    pub connection: Connection,
    pub multi_input_index: usize,
    pub position: usize,
}

/// Returns the multi-input index of the connection at `position`: the number
/// of earlier connections in the list that share its target.
pub fn multi_input_index_at(connections: &[Connection], position: usize) -> usize {
    let con = &connections[position];
    connections[..position]
        .iter()
        .filter(|other| other.same_target(con))
        .count()
}

/// Finds the position of the `multi_input_index`-th connection into `con`'s
/// target, provided it is `con` itself.
pub fn position_of_multi_input(
    connections: &[Connection],
    con: &Connection,
    multi_input_index: usize,
) -> Option<usize> {
    connections
        .iter()
        .enumerate()
        .filter(|(_, other)| other.same_target(con))
        .nth(multi_input_index)
        .filter(|(_, other)| *other == con)
        .map(|(position, _)| position)
}

/// List position at which a new connection must be inserted so that it ends
/// up at `multi_input_index` among the connections into its target.
///
/// Indices past the end append after the last connection into the target
/// (or at the end of the list when there is none).
pub fn insertion_position(
    connections: &[Connection],
    con: &Connection,
    multi_input_index: usize,
) -> usize {
    let mut seen = 0;
    for (position, other) in connections.iter().enumerate() {
        if !other.same_target(con) {
            continue;
        }
        if seen == multi_input_index {
            return position;
        }
        seen += 1;
    }
    connections.len()
}

/// Orders entries for batch removal: descending list position, then
/// descending multi-input index. Duplicates are dropped.
///
/// Removing in this order never shifts the position or multi-input index of
/// an entry that is still waiting to be removed.
pub fn removal_order(entries: impl IntoIterator<Item = ConnectionEntry>) -> Vec<ConnectionEntry> {
    let unique: HashSet<ConnectionEntry> = entries.into_iter().collect();
    let mut ordered: Vec<ConnectionEntry> = unique.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.position
            .cmp(&a.position)
            .then(b.multi_input_index.cmp(&a.multi_input_index))
    });
    ordered
}
