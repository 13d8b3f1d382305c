//! Slot definitions: the declared inputs and outputs of a symbol.
//!
//! A definition's [`SlotId`] is its only identity. Names may change on every
//! recompile without affecting which connections and runtime slots refer to
//! the definition.

use serde::{Deserialize, Serialize};

use crate::id::SlotId;
use crate::value::{Value, ValueType};

/// A declared input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDefinition {
    pub id: SlotId,
    pub name: String,
    /// Whether the slot accepts an ordered list of incoming connections.
    #[serde(default)]
    pub is_multi_input: bool,
    /// Owned default value. Its type is the slot's value type.
    pub default_value: Value,
}

impl InputDefinition {
    pub fn new(id: SlotId, name: impl Into<String>, default_value: Value) -> Self {
        InputDefinition {
            id,
            name: name.into(),
            is_multi_input: false,
            default_value,
        }
    }

    /// Marks the input as a multi-input.
    pub fn multi(mut self) -> Self {
        self.is_multi_input = true;
        self
    }

    /// The slot's value type, taken from its default value.
    pub fn value_type(&self) -> ValueType {
        self.default_value.value_type()
    }
}

/// When an output's dirty flag is raised regardless of input changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyFlagTrigger {
    /// Only when an input changes.
    #[default]
    None,
    /// On every frame.
    Always,
    /// While the timeline is playing.
    Animated,
}

/// A declared output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDefinition {
    pub id: SlotId,
    pub name: String,
    pub value_type: ValueType,
    /// Structured payload type for outputs carrying more than a plain value.
    #[serde(default)]
    pub output_data_type: Option<ValueType>,
    #[serde(default)]
    pub dirty_flag_trigger: DirtyFlagTrigger,
}

impl OutputDefinition {
    pub fn new(id: SlotId, name: impl Into<String>, value_type: ValueType) -> Self {
        OutputDefinition {
            id,
            name: name.into(),
            value_type,
            output_data_type: None,
            dirty_flag_trigger: DirtyFlagTrigger::None,
        }
    }
}

/// Looks up a definition by ID in an ordered definition list.
pub fn find_input(definitions: &[InputDefinition], id: SlotId) -> Option<&InputDefinition> {
    definitions.iter().find(|d| d.id == id)
}
