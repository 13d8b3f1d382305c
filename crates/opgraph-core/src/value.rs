//! Value type tags and type-erased slot values.
//!
//! A [`ValueType`] is the semantic type a slot carries. Built-in tags are
//! provided as constants; operators may declare any other tag by name, in
//! which case a matching creator has to be registered with
//! [`ValueFactories`](crate::factory::ValueFactories) before the slot can be
//! instantiated.
//!
//! [`Value`] is the owned, type-erased payload stored in input defaults,
//! runtime inputs and runtime outputs.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic value type tag of a slot.
///
/// Compared by name, so two tags are equal iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueType(Cow<'static, str>);

/// Pre-defined tags for the value types every project supports.
impl ValueType {
    pub const FLOAT: ValueType = ValueType(Cow::Borrowed("float"));
    pub const INT: ValueType = ValueType(Cow::Borrowed("int"));
    pub const BOOL: ValueType = ValueType(Cow::Borrowed("bool"));
    pub const STRING: ValueType = ValueType(Cow::Borrowed("string"));
    pub const VEC2: ValueType = ValueType(Cow::Borrowed("vec2"));
    pub const VEC3: ValueType = ValueType(Cow::Borrowed("vec3"));
    pub const VEC4: ValueType = ValueType(Cow::Borrowed("vec4"));
    pub const TEXTURE2D: ValueType = ValueType(Cow::Borrowed("texture2d"));
    pub const BUFFER: ValueType = ValueType(Cow::Borrowed("buffer"));
    pub const COMMAND: ValueType = ValueType(Cow::Borrowed("command"));

    /// Creates a tag for a value type that is not one of the built-ins.
    pub fn named(name: impl Into<String>) -> Self {
        ValueType(Cow::Owned(name.into()))
    }

    /// Returns the tag name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An owned, type-erased slot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Float(f32),
    Int(i32),
    Bool(bool),
    String(String),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Payload of a resource or custom value type. The data itself is owned
    /// by the operator behavior, so only an optional handle is kept here.
    Opaque {
        value_type: ValueType,
        handle: Option<u64>,
    },
}

impl Value {
    /// Returns the value type tag this value belongs to.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Float(_) => ValueType::FLOAT,
            Value::Int(_) => ValueType::INT,
            Value::Bool(_) => ValueType::BOOL,
            Value::String(_) => ValueType::STRING,
            Value::Vec2(_) => ValueType::VEC2,
            Value::Vec3(_) => ValueType::VEC3,
            Value::Vec4(_) => ValueType::VEC4,
            Value::Opaque { value_type, .. } => value_type.clone(),
        }
    }

    /// An empty payload of the given type.
    pub fn opaque(value_type: ValueType) -> Self {
        Value::Opaque {
            value_type,
            handle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tags_compare_by_name() {
        assert_eq!(ValueType::FLOAT, ValueType::named("float"));
        assert_ne!(ValueType::FLOAT, ValueType::INT);
    }

    #[test]
    fn value_reports_its_type() {
        assert_eq!(Value::Float(1.0).value_type(), ValueType::FLOAT);
        assert_eq!(Value::String("a".into()).value_type(), ValueType::STRING);
        assert_eq!(
            Value::opaque(ValueType::TEXTURE2D).value_type(),
            ValueType::TEXTURE2D
        );
    }

    #[test]
    fn serde_value_shape() {
        let json = serde_json::to_value(Value::Vec2([1.0, 2.0])).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "vec2", "value": [1.0, 2.0]}));

        let tag: ValueType = serde_json::from_str("\"gradient\"").unwrap();
        assert_eq!(tag, ValueType::named("gradient"));
    }
}
