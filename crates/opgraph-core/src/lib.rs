//! Core model and type update engine for opgraph node graphs.
//!
//! A [`Symbol`] is a graph definition: slot definitions, child placements
//! and an ordered connection list. Live [`Instance`]s of symbols are kept in
//! an [`InstanceArena`]. When a compiled operator type changes, the type
//! update engine ([`Symbol::update_instance_type`]) brings the symbol and
//! every live instance back in line with the new [`OperatorDescriptor`].
//!
//! # Modules
//!
//! - [`id`]: SymbolId, ChildId, SlotId, InstanceId
//! - [`value`]: ValueType tags and type-erased Values
//! - [`factory`]: injected value factory registry
//! - [`slot`]: input and output definitions
//! - [`connection`]: connections and multi-input index helpers
//! - [`operator`]: compiled operator descriptors
//! - [`instance`]: runtime instances and their arena
//! - [`symbol`]: the symbol and its creation lock
//! - [`type_update`]: the reconciliation engine
//! - [`message`]: user-facing message surface
//! - [`error`]: CoreError and FactoryError

pub mod connection;
pub mod error;
pub mod factory;
pub mod id;
pub mod instance;
pub mod message;
pub mod operator;
pub mod slot;
pub mod symbol;
pub mod type_update;
pub mod value;

// Re-export commonly used types
pub use connection::{Connection, ConnectionEntry};
pub use error::{CoreError, FactoryError};
pub use factory::ValueFactories;
pub use id::{ChildId, InstanceId, SlotId, SymbolId};
pub use instance::{InputLink, Instance, InstanceArena, RuntimeInput, RuntimeOutput};
pub use message::{LogMessageSurface, MessageSurface, RecordingMessageSurface, UserMessage};
pub use operator::{InputDescriptor, OperatorDescriptor, OperatorRegistry, OutputDescriptor, TypeKey};
pub use slot::{DirtyFlagTrigger, InputDefinition, OutputDefinition};
pub use symbol::{RemovedChild, Symbol, SymbolChild, SymbolDefinition, SymbolState};
pub use type_update::{
    update_symbol_child_io, SlotChangeInfo, TypeUpdateContext, TypeUpdateOutcome, TypeUpdateReport,
};
pub use value::{Value, ValueType};
