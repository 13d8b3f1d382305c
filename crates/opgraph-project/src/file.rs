//! JSON project and operator manifest files.
//!
//! The in-memory [`SymbolLibrary`](crate::library::SymbolLibrary) is the
//! source of truth; these types are only its persisted form.

use std::path::Path;

use serde::{Deserialize, Serialize};

use opgraph_core::{OperatorDescriptor, OperatorRegistry, SymbolDefinition, SymbolId};

use crate::error::ProjectError;

/// A saved project: symbol definitions grouped by package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Symbol instantiated as the root of the instance tree.
    #[serde(default)]
    pub home: Option<SymbolId>,
    #[serde(default)]
    pub packages: Vec<PackageFile>,
}

/// A package of symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageFile {
    pub name: String,
    /// Read-only packages are never flagged as modified.
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub symbols: Vec<SymbolDefinition>,
}

/// Compiled operator metadata as published by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorManifest {
    #[serde(default)]
    pub operators: Vec<OperatorDescriptor>,
}

impl OperatorManifest {
    pub fn into_registry(self) -> OperatorRegistry {
        self.operators.into_iter().collect()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ProjectError> {
    let data = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a project file.
pub fn load_project(path: &Path) -> Result<ProjectFile, ProjectError> {
    read_json(path)
}

/// Saves a project file as pretty-printed JSON.
pub fn save_project(path: &Path, project: &ProjectFile) -> Result<(), ProjectError> {
    write_json(path, project)
}

/// Loads an operator manifest.
pub fn load_operators(path: &Path) -> Result<OperatorManifest, ProjectError> {
    read_json(path)
}

/// Saves an operator manifest as pretty-printed JSON.
pub fn save_operators(path: &Path, manifest: &OperatorManifest) -> Result<(), ProjectError> {
    write_json(path, manifest)
}
