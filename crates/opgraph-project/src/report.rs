//! Summary of one compilation event.

use serde::Serialize;

use opgraph_core::SymbolId;

/// A symbol whose type update failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUpdate {
    pub symbol: SymbolId,
    pub error: String,
}

/// What [`SymbolLibrary::apply_compilation`](crate::SymbolLibrary::apply_compilation)
/// and [`SymbolLibrary::update_dirty_symbols`](crate::SymbolLibrary::update_dirty_symbols)
/// did. Symbol lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilationReport {
    pub new_types: Vec<SymbolId>,
    pub changed_types: Vec<SymbolId>,
    pub removed_types: Vec<SymbolId>,
    /// Symbols that went through a full type update.
    pub updated: Vec<SymbolId>,
    /// Symbols that took the fast exit.
    pub skipped: Vec<SymbolId>,
    pub failed: Vec<FailedUpdate>,
    /// Connections removed inside the updated symbols themselves.
    pub removed_connections: usize,
    /// Connections removed in depending symbols.
    pub pruned_dependent_connections: usize,
    pub modified_dependents: Vec<SymbolId>,
    pub read_only_dependents: Vec<SymbolId>,
}

impl CompilationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
