//! Compiled operator metadata.
//!
//! The compiler collaborator produces one [`OperatorDescriptor`] per compiled
//! operator type: the ordered input and output declarations that the type
//! update engine reconciles symbols against. The [`OperatorRegistry`] makes
//! them addressable by [`SymbolId`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::{SlotId, SymbolId};
use crate::slot::DirtyFlagTrigger;
use crate::value::ValueType;

/// Key of a compiled operator type. Changes on every hot reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(pub String);

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An input declared by a compiled operator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub id: SlotId,
    pub name: String,
    #[serde(default)]
    pub is_multi_input: bool,
    pub value_type: ValueType,
}

/// An output declared by a compiled operator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub id: SlotId,
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub output_data_type: Option<ValueType>,
    #[serde(default)]
    pub dirty_flag_trigger: DirtyFlagTrigger,
}

/// Everything the type update engine needs to know about one compiled
/// operator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub symbol_id: SymbolId,
    pub type_key: TypeKey,
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
    #[serde(default)]
    pub outputs: Vec<OutputDescriptor>,
}

impl OperatorDescriptor {
    pub fn new(symbol_id: SymbolId, type_key: impl Into<String>) -> Self {
        OperatorDescriptor {
            symbol_id,
            type_key: TypeKey(type_key.into()),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends an input declaration.
    pub fn with_input(mut self, id: SlotId, name: &str, value_type: ValueType) -> Self {
        self.inputs.push(InputDescriptor {
            id,
            name: name.to_string(),
            is_multi_input: false,
            value_type,
        });
        self
    }

    /// Appends a multi-input declaration.
    pub fn with_multi_input(mut self, id: SlotId, name: &str, value_type: ValueType) -> Self {
        self.inputs.push(InputDescriptor {
            id,
            name: name.to_string(),
            is_multi_input: true,
            value_type,
        });
        self
    }

    /// Appends an output declaration.
    pub fn with_output(mut self, id: SlotId, name: &str, value_type: ValueType) -> Self {
        self.outputs.push(OutputDescriptor {
            id,
            name: name.to_string(),
            value_type,
            output_data_type: None,
            dirty_flag_trigger: DirtyFlagTrigger::None,
        });
        self
    }
}

/// Operator descriptors indexed by symbol.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    descriptors: HashMap<SymbolId, Arc<OperatorDescriptor>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, returning the one it replaced.
    pub fn insert(&mut self, descriptor: OperatorDescriptor) -> Option<Arc<OperatorDescriptor>> {
        self.descriptors
            .insert(descriptor.symbol_id, Arc::new(descriptor))
    }

    pub fn get(&self, symbol: SymbolId) -> Option<&Arc<OperatorDescriptor>> {
        self.descriptors.get(&symbol)
    }

    pub fn remove(&mut self, symbol: SymbolId) -> Option<Arc<OperatorDescriptor>> {
        self.descriptors.remove(&symbol)
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.descriptors.contains_key(&symbol)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<OperatorDescriptor>> {
        self.descriptors.values()
    }
}

impl FromIterator<OperatorDescriptor> for OperatorRegistry {
    fn from_iter<I: IntoIterator<Item = OperatorDescriptor>>(iter: I) -> Self {
        let mut registry = OperatorRegistry::new();
        for descriptor in iter {
            registry.insert(descriptor);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_declaration_order() {
        let (a, b, out) = (SlotId::new(), SlotId::new(), SlotId::new());
        let desc = OperatorDescriptor::new(SymbolId::new(), "Lib.Blur@1")
            .with_input(a, "Image", ValueType::TEXTURE2D)
            .with_multi_input(b, "Layers", ValueType::COMMAND)
            .with_output(out, "Output", ValueType::TEXTURE2D);

        assert_eq!(desc.inputs[0].id, a);
        assert_eq!(desc.inputs[1].id, b);
        assert!(desc.inputs[1].is_multi_input);
        assert_eq!(desc.outputs[0].name, "Output");
    }

    #[test]
    fn registry_insert_replaces() {
        let symbol = SymbolId::new();
        let mut registry = OperatorRegistry::new();
        assert!(registry.insert(OperatorDescriptor::new(symbol, "A@1")).is_none());
        let previous = registry.insert(OperatorDescriptor::new(symbol, "A@2")).unwrap();
        assert_eq!(previous.type_key.0, "A@1");
        assert_eq!(registry.get(symbol).unwrap().type_key.0, "A@2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn descriptor_serde_defaults() {
        let symbol = SymbolId::new();
        let json = serde_json::json!({
            "symbol_id": symbol,
            "type_key": "Lib.Empty@1",
        });
        let desc: OperatorDescriptor = serde_json::from_value(json).unwrap();
        assert!(desc.inputs.is_empty());
        assert!(desc.outputs.is_empty());

        let registry: OperatorRegistry = vec![desc].into_iter().collect();
        assert!(registry.contains(symbol));
    }
}
