//! Structural checks for opgraph symbols.
//!
//! These are read-only queries used by editing layers before they mutate a
//! symbol: whether a connection would close a loop among children, which
//! symbols depend on a given symbol, and whether a placement would make a
//! symbol contain itself.
//!
//! # Modules
//!
//! - [`cycle`]: child-level cycle detection
//! - [`structure`]: dependents, recursive placements, instance ancestry
//! - [`validate`]: full validation of a candidate connection
//! - [`error`]: CheckError

pub mod cycle;
pub mod error;
pub mod structure;
pub mod validate;

pub use cycle::{check_for_cycle, child_graph, connections_form_cycle};
pub use error::CheckError;
pub use structure::{
    collect_depending_symbols, collect_parent_instances, containment_graph, dependents_in,
    would_create_recursive_placement,
};
pub use validate::{validate_connection, SlotIds};
