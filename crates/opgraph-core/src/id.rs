//! Stable ID newtypes for symbols, child placements, slots and instances.
//!
//! Symbol, child and slot IDs are UUID newtypes so that definitions authored
//! in different packages never collide. Instance IDs are arena keys handed
//! out by [`InstanceArena`](crate::instance::InstanceArena) and are only
//! meaningful for the lifetime of the process.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable symbol identity. Survives every hot reload of the backing operator
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub Uuid);

/// Identity of a child placement inside a symbol.
///
/// [`ChildId::NONE`] (the nil UUID) stands for the owning symbol's own
/// boundary when used as a connection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(pub Uuid);

/// Stable identity of an input or output slot definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub Uuid);

/// Key of a live instance inside an [`InstanceArena`](crate::instance::InstanceArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl SymbolId {
    /// Generates a fresh random symbol ID.
    pub fn new() -> Self {
        SymbolId(Uuid::new_v4())
    }
}

impl ChildId {
    /// The boundary marker: "the owning symbol itself".
    pub const NONE: ChildId = ChildId(Uuid::nil());

    /// Generates a fresh random child ID.
    pub fn new() -> Self {
        ChildId(Uuid::new_v4())
    }

    /// Returns `true` if this ID denotes the owning symbol's boundary.
    pub fn is_none(&self) -> bool {
        self.0.is_nil()
    }
}

impl SlotId {
    /// Generates a fresh random slot ID.
    pub fn new() -> Self {
        SlotId(Uuid::new_v4())
    }
}

impl Default for SymbolId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ChildId {
    fn default() -> Self {
        ChildId::NONE
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<boundary>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Uuid> for SymbolId {
    fn from(id: Uuid) -> Self {
        SymbolId(id)
    }
}

impl From<Uuid> for SlotId {
    fn from(id: Uuid) -> Self {
        SlotId(id)
    }
}

impl From<Uuid> for ChildId {
    fn from(id: Uuid) -> Self {
        ChildId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_none_is_boundary() {
        assert!(ChildId::NONE.is_none());
        assert!(ChildId::default().is_none());
        assert!(!ChildId::new().is_none());
    }

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(SymbolId::new(), SymbolId::new());
        assert_ne!(SlotId::new(), SlotId::new());
        assert_ne!(ChildId::new(), ChildId::new());
    }

    #[test]
    fn display_formats() {
        assert_eq!(format!("{}", InstanceId(7)), "#7");
        assert_eq!(format!("{}", ChildId::NONE), "<boundary>");

        let uuid = Uuid::new_v4();
        assert_eq!(format!("{}", SlotId(uuid)), uuid.to_string());
    }

    #[test]
    fn serde_is_transparent() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&SymbolId(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));

        let back: SymbolId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SymbolId(uuid));
    }
}
