//! Dirty detection for compiled operator types using blake3.
//!
//! A fingerprint covers only what the type update engine reconciles: the
//! ordered input and output declarations. The type key is left out, so a
//! reload that changes nothing but the implementation does not trigger a
//! type update.

use std::collections::{HashMap, HashSet};

use opgraph_core::{OperatorDescriptor, OperatorRegistry, SymbolId};

use crate::error::ProjectError;

/// Hashes the slot declarations of a descriptor.
pub fn descriptor_fingerprint(descriptor: &OperatorDescriptor) -> Result<blake3::Hash, ProjectError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(descriptor.symbol_id.0.as_bytes());
    hasher.update(&serde_json::to_vec(&descriptor.inputs)?);
    hasher.update(&serde_json::to_vec(&descriptor.outputs)?);
    Ok(hasher.finalize())
}

/// Fingerprints every descriptor of a registry.
pub fn fingerprint_all(registry: &OperatorRegistry) -> Result<HashMap<SymbolId, blake3::Hash>, ProjectError> {
    registry
        .iter()
        .map(|descriptor| Ok((descriptor.symbol_id, descriptor_fingerprint(descriptor)?)))
        .collect()
}

/// Symbols whose compiled type changed between two compilations.
#[derive(Debug, Clone, Default)]
pub struct DirtySymbols {
    /// Types compiled for the first time.
    pub new: HashSet<SymbolId>,
    /// Types whose slot declarations changed.
    pub modified: HashSet<SymbolId>,
    /// Types that are no longer compiled.
    pub removed: HashSet<SymbolId>,
}

impl DirtySymbols {
    /// Symbols that need a type update (new + modified).
    pub fn needs_update(&self) -> HashSet<SymbolId> {
        self.new.union(&self.modified).copied().collect()
    }

    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Compares fresh fingerprints against those of the previous compilation.
pub fn compute_dirty_symbols(
    current: &HashMap<SymbolId, blake3::Hash>,
    previous: &HashMap<SymbolId, blake3::Hash>,
) -> DirtySymbols {
    let mut dirty = DirtySymbols::default();
    for (&symbol, &hash) in current {
        match previous.get(&symbol) {
            Some(&prev) if prev == hash => {}
            Some(_) => {
                dirty.modified.insert(symbol);
            }
            None => {
                dirty.new.insert(symbol);
            }
        }
    }
    dirty.removed = previous
        .keys()
        .filter(|symbol| !current.contains_key(symbol))
        .copied()
        .collect();
    dirty
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgraph_core::{SlotId, ValueType};

    #[test]
    fn fingerprint_ignores_type_key() {
        let symbol = SymbolId::new();
        let input = SlotId::new();
        let v1 = OperatorDescriptor::new(symbol, "Blur@1").with_input(input, "Amount", ValueType::FLOAT);
        let v2 = OperatorDescriptor::new(symbol, "Blur@2").with_input(input, "Amount", ValueType::FLOAT);
        let v3 = OperatorDescriptor::new(symbol, "Blur@3").with_input(input, "Strength", ValueType::FLOAT);

        assert_eq!(descriptor_fingerprint(&v1).unwrap(), descriptor_fingerprint(&v2).unwrap());
        assert_ne!(descriptor_fingerprint(&v1).unwrap(), descriptor_fingerprint(&v3).unwrap());
    }

    #[test]
    fn dirty_symbols_categorize_changes() {
        let (kept, changed, added, dropped) = (SymbolId::new(), SymbolId::new(), SymbolId::new(), SymbolId::new());
        let h = |s: &str| blake3::hash(s.as_bytes());
        let previous = HashMap::from([(kept, h("k")), (changed, h("c1")), (dropped, h("d"))]);
        let current = HashMap::from([(kept, h("k")), (changed, h("c2")), (added, h("a"))]);

        let dirty = compute_dirty_symbols(&current, &previous);
        assert_eq!(dirty.new, HashSet::from([added]));
        assert_eq!(dirty.modified, HashSet::from([changed]));
        assert_eq!(dirty.removed, HashSet::from([dropped]));
        assert_eq!(dirty.needs_update(), HashSet::from([added, changed]));
        assert!(!dirty.is_clean());
        assert!(compute_dirty_symbols(&current, &current).is_clean());
    }
}
