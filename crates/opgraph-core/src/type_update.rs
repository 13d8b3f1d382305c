//! The type update engine.
//!
//! After a hot reload the compiler publishes fresh [`OperatorDescriptor`]s.
//! [`Symbol::update_instance_type`] reconciles one symbol against its
//! descriptor:
//!
//! 1. input and output definitions are matched to the declarations by
//!    [`SlotId`], reusing surviving definitions in place;
//! 2. connections that reference a vanished boundary slot are removed in
//!    descending (position, multi-input index) order and detached from every
//!    live instance;
//! 3. every registered instance has its runtime slots aligned to the new
//!    definitions via [`update_symbol_child_io`].
//!
//! The whole pass runs under the symbol's creation lock.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::connection::{multi_input_index_at, Connection, ConnectionEntry};
use crate::error::CoreError;
use crate::factory::{run_creator, ValueFactories};
use crate::id::{InstanceId, SlotId, SymbolId};
use crate::instance::{Instance, InstanceArena, RuntimeInput, RuntimeOutput};
use crate::message::MessageSurface;
use crate::operator::{InputDescriptor, OperatorDescriptor, OperatorRegistry, TypeKey};
use crate::slot::{InputDefinition, OutputDefinition};
use crate::symbol::{Symbol, SymbolState};

/// Title of the message shown when an input cannot be created.
pub const SLOT_TYPE_ERROR_TITLE: &str = "Slot type error";

/// Collaborators a type update pass needs.
#[derive(Clone, Copy)]
pub struct TypeUpdateContext<'a> {
    pub operators: &'a OperatorRegistry,
    pub factories: &'a ValueFactories,
    pub instances: &'a InstanceArena,
    pub messages: &'a dyn MessageSurface,
}

impl<'a> TypeUpdateContext<'a> {
    pub fn new(
        operators: &'a OperatorRegistry,
        factories: &'a ValueFactories,
        instances: &'a InstanceArena,
        messages: &'a dyn MessageSurface,
    ) -> Self {
        TypeUpdateContext {
            operators,
            factories,
            instances,
            messages,
        }
    }
}

/// What changed in a symbol's definitions during one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotChangeInfo {
    pub removed_input_definitions: Vec<InputDefinition>,
    pub removed_output_definitions: Vec<OutputDefinition>,
    pub latest_input_definitions: Vec<InputDefinition>,
    pub latest_output_definitions: Vec<OutputDefinition>,
}

impl SlotChangeInfo {
    pub fn has_removals(&self) -> bool {
        !self.removed_input_definitions.is_empty() || !self.removed_output_definitions.is_empty()
    }
}

/// Result of a full reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeUpdateReport {
    pub changes: SlotChangeInfo,
    /// Connections pruned from the symbol, in former list order.
    pub removed_connections: Vec<Connection>,
    pub updated_instances: usize,
    pub failed_instances: Vec<InstanceId>,
}

/// How a call to the engine ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeUpdateOutcome {
    /// Not dirty and not forced; nothing was touched.
    NotNeeded,
    /// Nothing observable to reconcile; definitions were left as they were.
    Skipped,
    Updated(TypeUpdateReport),
}

impl TypeUpdateOutcome {
    /// `true` for every outcome except [`TypeUpdateOutcome::NotNeeded`].
    pub fn performed(&self) -> bool {
        !matches!(self, TypeUpdateOutcome::NotNeeded)
    }

    pub fn report(&self) -> Option<&TypeUpdateReport> {
        match self {
            TypeUpdateOutcome::Updated(report) => Some(report),
            _ => None,
        }
    }
}

impl Symbol {
    /// Reconciles the symbol with its compiled operator type.
    ///
    /// Returns `Ok(false)` when the symbol was neither dirty nor forced, and
    /// `Ok(true)` when a pass ran (including the fast exit).
    pub fn update_instance_type(&self, force: bool, ctx: &TypeUpdateContext<'_>) -> Result<bool, CoreError> {
        self.reconcile(force, ctx).map(|outcome| outcome.performed())
    }

    /// Like [`Symbol::update_instance_type`], returning the full outcome.
    pub fn reconcile(&self, force: bool, ctx: &TypeUpdateContext<'_>) -> Result<TypeUpdateOutcome, CoreError> {
        self.lock().reconcile_locked(self.id(), force, ctx)
    }
}

impl SymbolState {
    /// The engine entry point for callers already holding the lock.
    pub fn reconcile_locked(
        &mut self,
        symbol_id: SymbolId,
        force: bool,
        ctx: &TypeUpdateContext<'_>,
    ) -> Result<TypeUpdateOutcome, CoreError> {
        if !self.needs_type_update && !force {
            return Ok(TypeUpdateOutcome::NotNeeded);
        }
        self.needs_type_update = false;

        let descriptor = ctx
            .operators
            .get(symbol_id)
            .ok_or(CoreError::OperatorInfoNotFound { symbol: symbol_id })?;

        // Runs before definitions change and ignores children. Skipped
        // definitions are refreshed when the first instance is created.
        if self.instances.is_empty()
            && self.output_definitions.is_empty()
            && descriptor.outputs.is_empty()
        {
            tracing::debug!("Symbol {} has nothing to reconcile; skipping", symbol_id);
            self.definitions_stale = true;
            return Ok(TypeUpdateOutcome::Skipped);
        }

        let report = self.apply_descriptor(symbol_id, descriptor, ctx);
        Ok(TypeUpdateOutcome::Updated(report))
    }

    /// Runs a full pass without the fast exit. Used to bring stale
    /// definitions up to date before the first instance is created.
    pub fn refresh_definitions_locked(
        &mut self,
        symbol_id: SymbolId,
        ctx: &TypeUpdateContext<'_>,
    ) -> Result<TypeUpdateReport, CoreError> {
        self.needs_type_update = false;
        let descriptor = ctx
            .operators
            .get(symbol_id)
            .ok_or(CoreError::OperatorInfoNotFound { symbol: symbol_id })?;
        Ok(self.apply_descriptor(symbol_id, descriptor, ctx))
    }

    fn apply_descriptor(
        &mut self,
        symbol_id: SymbolId,
        descriptor: &OperatorDescriptor,
        ctx: &TypeUpdateContext<'_>,
    ) -> TypeUpdateReport {
        self.definitions_stale = false;

        let removed_inputs = self.update_input_definitions(descriptor, ctx);
        let removed_outputs = self.update_output_definitions(descriptor);
        let removed_connections = self.prune_dangling_connections(&removed_inputs, &removed_outputs, ctx.instances);

        let changes = SlotChangeInfo {
            removed_input_definitions: removed_inputs,
            removed_output_definitions: removed_outputs,
            latest_input_definitions: self.input_definitions.clone(),
            latest_output_definitions: self.output_definitions.clone(),
        };

        let mut updated_instances = 0;
        let mut failed_instances = Vec::new();
        for &instance in &self.instances {
            match update_instance_io(ctx.instances, instance, &changes, ctx.factories) {
                Ok(()) => updated_instances += 1,
                Err(e) => {
                    tracing::error!("Failed to update instance {} of symbol {}: {}", instance, symbol_id, e);
                    failed_instances.push(instance);
                }
            }
        }

        tracing::debug!(
            "Updated symbol {}: {} inputs, {} outputs, {} connections removed, {} instances",
            symbol_id,
            self.input_definitions.len(),
            self.output_definitions.len(),
            removed_connections.len(),
            updated_instances
        );

        TypeUpdateReport {
            changes,
            removed_connections,
            updated_instances,
            failed_instances,
        }
    }

    /// Rebuilds the input definitions in declaration order. Returns the
    /// definitions that did not survive.
    fn update_input_definitions(
        &mut self,
        descriptor: &OperatorDescriptor,
        ctx: &TypeUpdateContext<'_>,
    ) -> Vec<InputDefinition> {
        let mut removed = std::mem::take(&mut self.input_definitions);
        let mut latest = Vec::with_capacity(descriptor.inputs.len());

        for info in &descriptor.inputs {
            let existing = removed.iter().position(|d| d.id == info.id);
            if let Some(index) = existing {
                if removed[index].value_type() == info.value_type {
                    let mut definition = removed.remove(index);
                    definition.name.clone_from(&info.name);
                    definition.is_multi_input = info.is_multi_input;
                    latest.push(definition);
                    continue;
                }
            }

            // New input, or the slot changed its type.
            let Some(definition) = create_input_definition(info, &descriptor.type_key, ctx) else {
                continue;
            };
            if let Some(index) = existing {
                removed.remove(index);
            }
            latest.push(definition);
        }

        self.input_definitions = latest;
        removed
    }

    /// Rebuilds the output definitions in declaration order. Returns the
    /// definitions that did not survive.
    fn update_output_definitions(&mut self, descriptor: &OperatorDescriptor) -> Vec<OutputDefinition> {
        let mut removed = std::mem::take(&mut self.output_definitions);
        let mut latest = Vec::with_capacity(descriptor.outputs.len());

        for info in &descriptor.outputs {
            let definition = match removed.iter().position(|d| d.id == info.id) {
                Some(index) if removed[index].value_type == info.value_type => {
                    let mut definition = removed.remove(index);
                    definition.name.clone_from(&info.name);
                    definition.output_data_type.clone_from(&info.output_data_type);
                    definition.dirty_flag_trigger = info.dirty_flag_trigger;
                    definition
                }
                existing => {
                    if let Some(index) = existing {
                        removed.remove(index);
                    }
                    OutputDefinition {
                        id: info.id,
                        name: info.name.clone(),
                        value_type: info.value_type.clone(),
                        output_data_type: info.output_data_type.clone(),
                        dirty_flag_trigger: info.dirty_flag_trigger,
                    }
                }
            };
            latest.push(definition);
        }

        self.output_definitions = latest;
        removed
    }

    /// Removes connections whose boundary source is a removed input or whose
    /// boundary target is a removed output.
    fn prune_dangling_connections(
        &mut self,
        removed_inputs: &[InputDefinition],
        removed_outputs: &[OutputDefinition],
        arena: &InstanceArena,
    ) -> Vec<Connection> {
        if removed_inputs.is_empty() && removed_outputs.is_empty() {
            return Vec::new();
        }
        let removed_input_ids: HashSet<SlotId> = removed_inputs.iter().map(|d| d.id).collect();
        let removed_output_ids: HashSet<SlotId> = removed_outputs.iter().map(|d| d.id).collect();

        let mut marked = HashSet::new();
        for (position, con) in self.connections.iter().enumerate() {
            let dangling_source =
                con.is_connected_to_symbol_input() && removed_input_ids.contains(&con.source_slot_id);
            let dangling_target =
                con.is_connected_to_symbol_output() && removed_output_ids.contains(&con.target_slot_id);
            if dangling_source || dangling_target {
                marked.insert(ConnectionEntry {
                    connection: *con,
                    multi_input_index: multi_input_index_at(&self.connections, position),
                    position,
                });
            }
        }

        self.remove_connection_entries_locked(marked, arena)
    }
}

fn create_input_definition(
    info: &InputDescriptor,
    type_key: &TypeKey,
    ctx: &TypeUpdateContext<'_>,
) -> Option<InputDefinition> {
    let Some(creator) = ctx.factories.input_creator(&info.value_type) else {
        ctx.messages.show_message_box(
            &format!(
                "[{}] can't create input definition for {}. Make sure the operator only uses registered value types.",
                type_key, info.value_type
            ),
            SLOT_TYPE_ERROR_TITLE,
        );
        return None;
    };

    match run_creator(creator, &info.value_type) {
        Ok(default_value) if default_value.value_type() == info.value_type => Some(InputDefinition {
            id: info.id,
            name: info.name.clone(),
            is_multi_input: info.is_multi_input,
            default_value,
        }),
        Ok(default_value) => {
            tracing::error!(
                "Creator for {} returned a {} default; skipping input {}",
                info.value_type,
                default_value.value_type(),
                info.name
            );
            None
        }
        Err(e) => {
            tracing::error!("Skipping input {} of {}: {}", info.name, type_key, e);
            None
        }
    }
}

/// Applies [`update_symbol_child_io`] to one instance in the arena.
pub fn update_instance_io(
    arena: &InstanceArena,
    id: InstanceId,
    changes: &SlotChangeInfo,
    factories: &ValueFactories,
) -> Result<(), CoreError> {
    arena
        .with_mut(id, |instance| update_symbol_child_io(instance, changes, factories))
        .ok_or(CoreError::InstanceNotFound { id })
}

/// Aligns an instance's runtime slots with the latest definitions.
///
/// Runtime slots whose definition survived with the same value type are kept
/// untouched, including their stored value. Retyped slots get a fresh value
/// but keep their incoming links. Afterwards the instance's input and output
/// keys are exactly the latest definition IDs, in definition order, except
/// for outputs whose payload could not be created.
pub fn update_symbol_child_io(instance: &mut Instance, changes: &SlotChangeInfo, factories: &ValueFactories) {
    for definition in &changes.removed_input_definitions {
        if instance.inputs.shift_remove(&definition.id).is_none() {
            tracing::error!("Could not remove input {} from instance {}", definition.name, instance.id);
        }
    }

    let mut inputs = IndexMap::with_capacity(changes.latest_input_definitions.len());
    for definition in &changes.latest_input_definitions {
        let input = match instance.inputs.shift_remove(&definition.id) {
            Some(mut existing) if existing.value_type == definition.value_type() => {
                if existing.is_multi_input && !definition.is_multi_input && existing.links.len() > 1 {
                    let keep_from = existing.links.len() - 1;
                    existing.links.drain(..keep_from);
                }
                existing.is_multi_input = definition.is_multi_input;
                existing
            }
            Some(retyped) => RuntimeInput {
                links: retyped.links,
                ..RuntimeInput::new(definition)
            },
            None => RuntimeInput::new(definition),
        };
        inputs.insert(definition.id, input);
    }
    for (id, _) in instance.inputs.drain(..) {
        tracing::warn!("Dropping input {} without definition from instance {}", id, instance.id);
    }
    instance.inputs = inputs;

    for definition in &changes.removed_output_definitions {
        if instance.outputs.shift_remove(&definition.id).is_none() {
            tracing::error!("Could not remove output {} from instance {}", definition.name, instance.id);
        }
    }

    let mut outputs = IndexMap::with_capacity(changes.latest_output_definitions.len());
    for definition in &changes.latest_output_definitions {
        let output = match instance.outputs.shift_remove(&definition.id) {
            Some(mut existing) if existing.value_type == definition.value_type => {
                existing.dirty_flag_trigger = definition.dirty_flag_trigger;
                existing
            }
            previous => match RuntimeOutput::create(definition, factories) {
                Ok(mut output) => {
                    if let Some(previous) = previous {
                        output.links = previous.links;
                    }
                    output
                }
                Err(e) => {
                    tracing::error!(
                        "Skipping output {} on instance {}: {}",
                        definition.name,
                        instance.id,
                        e
                    );
                    continue;
                }
            },
        };
        outputs.insert(definition.id, output);
    }
    for (id, _) in instance.outputs.drain(..) {
        tracing::warn!("Dropping output {} without definition from instance {}", id, instance.id);
    }
    instance.outputs = outputs;
}
