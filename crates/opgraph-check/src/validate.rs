//! Validation of connections proposed for addition to a symbol.

use opgraph_core::{ChildId, Connection, SlotId, Symbol, SymbolDefinition, SymbolId};

use crate::cycle::connections_form_cycle;
use crate::error::CheckError;

/// Slot IDs a symbol exposes when placed as a child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotIds {
    pub inputs: Vec<SlotId>,
    pub outputs: Vec<SlotId>,
}

impl SlotIds {
    /// Reads the current definition IDs of `symbol` under its lock.
    pub fn of(symbol: &Symbol) -> Self {
        let state = symbol.lock();
        SlotIds {
            inputs: state.input_definitions.iter().map(|d| d.id).collect(),
            outputs: state.output_definitions.iter().map(|d| d.id).collect(),
        }
    }
}

/// Checks that `candidate` references existing slots of `owner` and of its
/// children, and that it would not create a cycle.
///
/// `child_slots` resolves the slot IDs of the symbol placed as a child. It
/// is called for at most two symbols.
pub fn validate_connection(
    owner: &SymbolDefinition,
    candidate: &Connection,
    child_slots: impl Fn(SymbolId) -> Option<SlotIds>,
) -> Result<(), CheckError> {
    let child_symbol = |child: ChildId| {
        owner
            .children
            .iter()
            .find(|c| c.id == child)
            .map(|c| c.symbol_id)
            .ok_or(CheckError::UnknownChild {
                symbol: owner.id,
                child,
            })
    };

    let source = candidate.source_parent_or_child_id;
    let source_known = if source.is_none() {
        owner.input_definitions.iter().any(|d| d.id == candidate.source_slot_id)
    } else {
        child_slots(child_symbol(source)?)
            .is_some_and(|slots| slots.outputs.contains(&candidate.source_slot_id))
    };
    if !source_known {
        return Err(CheckError::UnknownSourceSlot {
            endpoint: source,
            slot: candidate.source_slot_id,
        });
    }

    let target = candidate.target_parent_or_child_id;
    let target_known = if target.is_none() {
        owner.output_definitions.iter().any(|d| d.id == candidate.target_slot_id)
    } else {
        child_slots(child_symbol(target)?)
            .is_some_and(|slots| slots.inputs.contains(&candidate.target_slot_id))
    };
    if !target_known {
        return Err(CheckError::UnknownTargetSlot {
            endpoint: target,
            slot: candidate.target_slot_id,
        });
    }

    if connections_form_cycle(&owner.connections, candidate) {
        return Err(CheckError::CycleDetected {
            symbol: owner.id,
            from_child: source,
            to_child: target,
        });
    }
    Ok(())
}
