//! Core error types for opgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the symbol model, the instance arena and the value
//! factories.

use thiserror::Error;

use crate::id::{ChildId, InstanceId, SlotId, SymbolId};
use crate::value::ValueType;

/// Core errors produced by the opgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No compiled operator metadata is registered for the symbol.
    #[error("no operator info for symbol {symbol}")]
    OperatorInfoNotFound { symbol: SymbolId },

    /// A child placement ID was not found in a symbol.
    #[error("child {child} not found in symbol {symbol}")]
    ChildNotFound { symbol: SymbolId, child: ChildId },

    /// A slot ID was not found where a connection expected it.
    #[error("slot {slot} not found on {endpoint}")]
    SlotNotFound { slot: SlotId, endpoint: ChildId },

    /// An instance ID is not (or no longer) present in the arena.
    #[error("instance not found: {id}")]
    InstanceNotFound { id: InstanceId },

    /// A connection does not exist in the symbol's connection list.
    #[error("connection not found in symbol {symbol}")]
    ConnectionNotFound { symbol: SymbolId },

    /// A value was assigned to a slot of a different type.
    #[error("type mismatch on slot {slot}: expected {expected}, got {actual}")]
    TypeMismatch {
        slot: SlotId,
        expected: ValueType,
        actual: ValueType,
    },

    /// A value factory could not produce a value.
    #[error(transparent)]
    Factory(#[from] FactoryError),
}

/// Errors produced by [`ValueFactories`](crate::factory::ValueFactories).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactoryError {
    /// No creator is registered for the value type.
    #[error("no value creator registered for {value_type}")]
    NotRegistered { value_type: ValueType },

    /// The creator ran but failed to build a value.
    #[error("failed to create default value for {value_type}: {reason}")]
    CreationFailed { value_type: ValueType, reason: String },
}
