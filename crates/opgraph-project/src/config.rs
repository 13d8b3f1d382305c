//! Library configuration.
//!
//! Read from environment variables:
//! - `OPGRAPH_PARALLEL_UPDATES`: reconcile dirty symbols on the rayon pool
//!   (default: true)
//! - `OPGRAPH_FLAG_DEPENDENTS`: flag depending symbols as modified after a
//!   successful type update (default: true)
//! - `OPGRAPH_PRUNE_DEPENDENTS`: remove connections in depending symbols that
//!   point at removed slots (default: true)

use serde::{Deserialize, Serialize};

pub const PARALLEL_UPDATES_VAR: &str = "OPGRAPH_PARALLEL_UPDATES";
pub const FLAG_DEPENDENTS_VAR: &str = "OPGRAPH_FLAG_DEPENDENTS";
pub const PRUNE_DEPENDENTS_VAR: &str = "OPGRAPH_PRUNE_DEPENDENTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub parallel_updates: bool,
    pub flag_dependents: bool,
    pub prune_dependents: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            parallel_updates: true,
            flag_dependents: true,
            prune_dependents: true,
        }
    }
}

impl ProjectConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ProjectConfig::default();
        let flag = |name: &str, default: bool| match lookup(name) {
            None => default,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                tracing::warn!("Ignoring invalid value {:?} for {}", raw, name);
                default
            }),
        };
        ProjectConfig {
            parallel_updates: flag(PARALLEL_UPDATES_VAR, defaults.parallel_updates),
            flag_dependents: flag(FLAG_DEPENDENTS_VAR, defaults.flag_dependents),
            prune_dependents: flag(PRUNE_DEPENDENTS_VAR, defaults.prune_dependents),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
