//! Structural check errors with enough context to explain a refusal.

use opgraph_core::{ChildId, SlotId, SymbolId};
use serde::{Deserialize, Serialize};

/// Why a proposed structural edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CheckError {
    /// A connection endpoint names a child placement the symbol does not have.
    #[error("child {child} not found in symbol {symbol}")]
    UnknownChild {
        /// Symbol owning the connection.
        symbol: SymbolId,
        /// The missing placement.
        child: ChildId,
    },

    /// The source slot is not an input of the boundary or an output of the
    /// source child.
    #[error("unknown source slot {slot} on {endpoint}")]
    UnknownSourceSlot {
        /// Source parent-or-child ID of the candidate.
        endpoint: ChildId,
        /// The slot that could not be found.
        slot: SlotId,
    },

    /// The target slot is not an output of the boundary or an input of the
    /// target child.
    #[error("unknown target slot {slot} on {endpoint}")]
    UnknownTargetSlot {
        /// Target parent-or-child ID of the candidate.
        endpoint: ChildId,
        /// The slot that could not be found.
        slot: SlotId,
    },

    /// The connection would close a loop among the symbol's children.
    #[error("connection from {from_child} to {to_child} would create a cycle in symbol {symbol}")]
    CycleDetected {
        symbol: SymbolId,
        from_child: ChildId,
        to_child: ChildId,
    },

    /// Placing the child would make a symbol contain itself.
    #[error("placing {child} inside {parent} would make {parent} contain itself")]
    RecursivePlacement { parent: SymbolId, child: SymbolId },
}
