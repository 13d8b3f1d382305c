//! Symbol library, compilation events and project files for opgraph.
//!
//! Ties the core model and the structural checks together: a
//! [`SymbolLibrary`] owns every loaded symbol and the live instance tree,
//! applies structural edits to definitions and instances alike, and turns a
//! fresh compilation into type update passes over the symbols whose
//! operator types changed.
//!
//! # Modules
//!
//! - [`library`]: SymbolLibrary (instantiation, editing, compilation events)
//! - [`fingerprint`]: blake3 fingerprints and dirty detection
//! - [`report`]: CompilationReport
//! - [`file`]: JSON project and operator manifest files
//! - [`config`]: ProjectConfig from environment variables
//! - [`error`]: ProjectError

pub mod config;
pub mod error;
pub mod file;
pub mod fingerprint;
pub mod library;
pub mod report;

pub use config::ProjectConfig;
pub use error::ProjectError;
pub use file::{load_operators, load_project, save_operators, save_project, OperatorManifest, PackageFile, ProjectFile};
pub use fingerprint::{compute_dirty_symbols, descriptor_fingerprint, fingerprint_all, DirtySymbols};
pub use library::{SymbolLibrary, DEFAULT_PACKAGE};
pub use report::{CompilationReport, FailedUpdate};
