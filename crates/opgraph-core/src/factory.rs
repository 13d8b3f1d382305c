//! Type-indexed value factories.
//!
//! [`ValueFactories`] maps a [`ValueType`] tag to the functions that build
//! a fresh input default and a fresh output payload for that type. The table
//! is populated once (usually via [`ValueFactories::with_builtins`] plus
//! project-specific registrations) and then injected into the type update
//! engine, so the engine never reaches for a hidden global.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::FactoryError;
use crate::value::{Value, ValueType};

/// A creation function for one value type. Returns a human-readable reason
/// on failure.
pub type ValueCreator = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;

/// Registry of input default creators and output payload creators.
#[derive(Clone, Default)]
pub struct ValueFactories {
    inputs: HashMap<ValueType, ValueCreator>,
    outputs: HashMap<ValueType, ValueCreator>,
}

impl ValueFactories {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with creators for every built-in [`ValueType`].
    ///
    /// Plain data types default to zero / empty; resource types produce an
    /// empty opaque handle. Both inputs and outputs are covered.
    pub fn with_builtins() -> Self {
        let mut factories = Self::new();

        let plain: [(ValueType, Value); 7] = [
            (ValueType::FLOAT, Value::Float(0.0)),
            (ValueType::INT, Value::Int(0)),
            (ValueType::BOOL, Value::Bool(false)),
            (ValueType::STRING, Value::String(String::new())),
            (ValueType::VEC2, Value::Vec2([0.0; 2])),
            (ValueType::VEC3, Value::Vec3([0.0; 3])),
            (ValueType::VEC4, Value::Vec4([0.0; 4])),
        ];
        for (value_type, default) in plain {
            factories.register(value_type, move || Ok(default.clone()));
        }

        for value_type in [ValueType::TEXTURE2D, ValueType::BUFFER, ValueType::COMMAND] {
            let tag = value_type.clone();
            factories.register(value_type, move || Ok(Value::opaque(tag.clone())));
        }

        factories
    }

    /// Registers the same creator for inputs and outputs of `value_type`.
    pub fn register<F>(&mut self, value_type: ValueType, creator: F)
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        let creator: ValueCreator = Arc::new(creator);
        self.inputs.insert(value_type.clone(), creator.clone());
        self.outputs.insert(value_type, creator);
    }

    /// Registers (or replaces) the input default creator for `value_type`.
    pub fn register_input<F>(&mut self, value_type: ValueType, creator: F)
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        self.inputs.insert(value_type, Arc::new(creator));
    }

    /// Registers (or replaces) the output payload creator for `value_type`.
    pub fn register_output<F>(&mut self, value_type: ValueType, creator: F)
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        self.outputs.insert(value_type, Arc::new(creator));
    }

    /// Looks up the input default creator for `value_type`.
    pub fn input_creator(&self, value_type: &ValueType) -> Option<&ValueCreator> {
        self.inputs.get(value_type)
    }

    /// Looks up the output payload creator for `value_type`.
    pub fn output_creator(&self, value_type: &ValueType) -> Option<&ValueCreator> {
        self.outputs.get(value_type)
    }

    /// Builds a fresh input default for `value_type`.
    pub fn create_input_default(&self, value_type: &ValueType) -> Result<Value, FactoryError> {
        let creator = self
            .input_creator(value_type)
            .ok_or_else(|| FactoryError::NotRegistered {
                value_type: value_type.clone(),
            })?;
        run_creator(creator, value_type)
    }

    /// Builds a fresh output payload for `value_type`.
    pub fn create_output_payload(&self, value_type: &ValueType) -> Result<Value, FactoryError> {
        let creator = self
            .output_creator(value_type)
            .ok_or_else(|| FactoryError::NotRegistered {
                value_type: value_type.clone(),
            })?;
        run_creator(creator, value_type)
    }
}

/// Runs `creator` and maps its failure into a [`FactoryError`].
pub(crate) fn run_creator(
    creator: &ValueCreator,
    value_type: &ValueType,
) -> Result<Value, FactoryError> {
    creator().map_err(|reason| FactoryError::CreationFailed {
        value_type: value_type.clone(),
        reason,
    })
}

impl fmt::Debug for ValueFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut inputs: Vec<_> = self.inputs.keys().map(ValueType::name).collect();
        let mut outputs: Vec<_> = self.outputs.keys().map(ValueType::name).collect();
        inputs.sort_unstable();
        outputs.sort_unstable();
        f.debug_struct("ValueFactories")
            .field("inputs", &inputs)
            .field("outputs", &outputs)
            .finish()
    }
}
