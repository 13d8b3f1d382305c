//! Project error types for opgraph-project.
//!
//! [`ProjectError`] wraps the core and check errors and adds the failure
//! modes of the library itself: unknown or duplicate symbols, symbols still
//! in use, and project file IO.

use std::path::PathBuf;

use opgraph_check::CheckError;
use opgraph_core::{ChildId, CoreError, SymbolId};
use thiserror::Error;

/// Errors produced by library operations and project files.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// A core model operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A structural check refused the edit.
    #[error(transparent)]
    Check(#[from] CheckError),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a project file failed.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No symbol with the given ID is loaded.
    #[error("symbol not found: {0}")]
    SymbolNotFound(SymbolId),

    /// A symbol with the given ID is already loaded.
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(SymbolId),

    /// The symbol already has a child placement with this ID.
    #[error("child {child} already exists in symbol {symbol}")]
    DuplicateChild { symbol: SymbolId, child: ChildId },

    /// The symbol is still placed inside other symbols.
    #[error("symbol {symbol} is used by {dependents} other symbols")]
    SymbolInUse { symbol: SymbolId, dependents: usize },
}
