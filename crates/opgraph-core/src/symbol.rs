//! Symbols: graph definitions guarded by a per-symbol creation lock.
//!
//! A [`Symbol`] owns its slot definitions, child placements, ordered
//! connection list and the registry of instances created from it. All of
//! that lives in a [`SymbolState`] behind one non-reentrant
//! `parking_lot::Mutex`.
//!
//! # Locking contract
//!
//! * Methods on [`Symbol`] acquire the lock themselves. Never call them while
//!   holding the guard of the same symbol.
//! * Methods on [`SymbolState`] (the "locked" namespace, many of them suffixed
//!   `_locked`) assume the caller already holds the guard returned by
//!   [`Symbol::lock`].
//! * No method holds two symbol locks at once.

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::connection::{
    insertion_position, multi_input_index_at, position_of_multi_input,
    removal_order, Connection, ConnectionEntry,
};
use crate::error::CoreError;
use crate::id::{ChildId, InstanceId, SymbolId};
use crate::instance::InstanceArena;
use crate::operator::TypeKey;
use crate::slot::{InputDefinition, OutputDefinition};
use crate::type_update::TypeUpdateContext;

/// A placement of another symbol inside this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolChild {
    pub id: ChildId,
    pub symbol_id: SymbolId,
    #[serde(default)]
    pub name: String,
}

impl SymbolChild {
    pub fn new(symbol_id: SymbolId, name: impl Into<String>) -> Self {
        SymbolChild {
            id: ChildId::new(),
            symbol_id,
            name: name.into(),
        }
    }
}

/// Serializable snapshot of a symbol's definition (no runtime state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    pub id: SymbolId,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub instance_type: Option<TypeKey>,
    #[serde(default)]
    pub input_definitions: Vec<InputDefinition>,
    #[serde(default)]
    pub output_definitions: Vec<OutputDefinition>,
    #[serde(default)]
    pub children: Vec<SymbolChild>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// A child placement removed from a symbol, together with what went with it.
#[derive(Debug, Clone)]
pub struct RemovedChild {
    pub child: SymbolChild,
    /// Connections that touched the child, in former list order.
    pub connections: Vec<Connection>,
    /// Child instances detached from the symbol's instances. The caller owns
    /// their disposal.
    pub orphaned_instances: Vec<InstanceId>,
}

/// Everything guarded by a symbol's creation lock.
#[derive(Debug, Default)]
pub struct SymbolState {
    pub name: String,
    pub namespace: String,
    pub instance_type: Option<TypeKey>,
    pub needs_type_update: bool,
    /// Set when a type update took the fast exit and left the definitions
    /// behind the compiled type.
    pub definitions_stale: bool,
    pub input_definitions: Vec<InputDefinition>,
    pub output_definitions: Vec<OutputDefinition>,
    pub connections: Vec<Connection>,
    pub children: IndexMap<ChildId, SymbolChild>,
    pub(crate) instances: IndexSet<InstanceId>,
}

/// A graph definition with stable identity.
#[derive(Debug)]
pub struct Symbol {
    id: SymbolId,
    state: Mutex<SymbolState>,
}

// ---------------------------------------------------------------------------
// Public (locking) surface
// ---------------------------------------------------------------------------

impl Symbol {
    pub fn new(id: SymbolId, name: impl Into<String>) -> Self {
        Symbol {
            id,
            state: Mutex::new(SymbolState {
                name: name.into(),
                ..SymbolState::default()
            }),
        }
    }

    /// Rebuilds a symbol from a persisted definition. The instance registry
    /// starts empty.
    pub fn from_definition(definition: SymbolDefinition) -> Self {
        let children = definition
            .children
            .into_iter()
            .map(|child| (child.id, child))
            .collect();
        Symbol {
            id: definition.id,
            state: Mutex::new(SymbolState {
                name: definition.name,
                namespace: definition.namespace,
                instance_type: definition.instance_type,
                needs_type_update: false,
                definitions_stale: false,
                input_definitions: definition.input_definitions,
                output_definitions: definition.output_definitions,
                connections: definition.connections,
                children,
                instances: IndexSet::new(),
            }),
        }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    /// Acquires the creation lock.
    pub fn lock(&self) -> MutexGuard<'_, SymbolState> {
        self.state.lock()
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn instance_type(&self) -> Option<TypeKey> {
        self.lock().instance_type.clone()
    }

    pub fn needs_type_update(&self) -> bool {
        self.lock().needs_type_update
    }

    pub fn set_needs_type_update(&self, needs_type_update: bool) {
        self.lock().needs_type_update = needs_type_update;
    }

    pub fn definitions_stale(&self) -> bool {
        self.lock().definitions_stale
    }

    pub fn input_definitions(&self) -> Vec<InputDefinition> {
        self.lock().input_definitions.clone()
    }

    pub fn output_definitions(&self) -> Vec<OutputDefinition> {
        self.lock().output_definitions.clone()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.lock().connections.clone()
    }

    pub fn children(&self) -> Vec<SymbolChild> {
        self.lock().children.values().cloned().collect()
    }

    pub fn child(&self, id: ChildId) -> Option<SymbolChild> {
        self.lock().children.get(&id).cloned()
    }

    /// IDs of every live instance created from this symbol.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.lock().instances.iter().copied().collect()
    }

    pub fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }

    pub fn snapshot(&self) -> SymbolDefinition {
        self.lock().snapshot_locked(self.id)
    }

    pub fn register_instance(&self, instance: InstanceId) -> bool {
        self.lock().register_instance_locked(instance)
    }

    pub fn unregister_instance(&self, instance: InstanceId) -> bool {
        self.lock().unregister_instance_locked(instance)
    }

    /// Adds a child placement. Returns `false` if the child ID is taken.
    ///
    /// Live instances do not get an instance for the new placement here;
    /// whoever owns instantiation creates them.
    pub fn add_child(&self, child: SymbolChild) -> bool {
        let mut state = self.lock();
        if state.children.contains_key(&child.id) {
            return false;
        }
        state.children.insert(child.id, child);
        true
    }

    /// Removes a child placement with all connections touching it.
    pub fn remove_child(&self, child: ChildId, arena: &InstanceArena) -> Option<RemovedChild> {
        self.lock().remove_child_locked(child, arena)
    }

    /// Inserts `connection` so that it ends up at `multi_input_index` among
    /// the connections into its target, and wires every live instance.
    /// Returns the list position it was inserted at.
    pub fn insert_connection(
        &self,
        connection: Connection,
        multi_input_index: usize,
        arena: &InstanceArena,
    ) -> usize {
        self.lock()
            .insert_connection_locked(connection, multi_input_index, arena)
    }

    /// Removes the `multi_input_index`-th connection into `connection`'s
    /// target, which must be `connection` itself.
    pub fn remove_connection(
        &self,
        connection: &Connection,
        multi_input_index: usize,
        arena: &InstanceArena,
    ) -> Result<(), CoreError> {
        self.lock()
            .remove_connection_locked(self.id, connection, multi_input_index, arena)
    }

    /// Removes every connection matching `predicate`, in safe batch order.
    pub fn remove_connections_where(
        &self,
        arena: &InstanceArena,
        predicate: impl Fn(&Connection) -> bool,
    ) -> Vec<Connection> {
        self.lock().remove_connections_where_locked(arena, predicate)
    }

    /// Replaces children, connections and slot definitions with those of
    /// `other`, then re-applies the current instance type.
    ///
    /// Children of `self` whose IDs are not in `other` are kept. Instances
    /// are rewired against the new connection list; placements that have no
    /// instance yet are left for the instantiation layer to fill in.
    pub fn replace_with_contents_of(
        &self,
        other: &Symbol,
        ctx: &TypeUpdateContext<'_>,
    ) -> Result<bool, CoreError> {
        if std::ptr::eq(self, other) {
            let instance_type = self.instance_type();
            return self.apply_instance_type(instance_type, ctx);
        }

        let source = other.snapshot();
        let instance_type = {
            let mut state = self.lock();
            for child in source.children {
                state.children.entry(child.id).or_insert(child);
            }
            state.connections = source.connections;
            state.input_definitions = source.input_definitions;
            state.output_definitions = source.output_definitions;
            state.rewire_instances_locked(ctx.instances);
            state.instance_type.clone()
        };

        self.apply_instance_type(instance_type, ctx)
    }

    /// Detaches every instance from the backing type ahead of an unload and
    /// clears the instance type.
    pub fn remove_all_references_to_type(&self, ctx: &TypeUpdateContext<'_>) -> Result<bool, CoreError> {
        {
            let state = self.lock();
            for &instance in &state.instances {
                ctx.instances.with_mut(instance, |i| i.prepare_for_reload());
            }
        }
        self.apply_instance_type(None, ctx)
    }

    /// Swaps the backing type.
    ///
    /// `None` only clears the key. `Some` stores the key, runs a forced type
    /// update and rewires instances that were waiting for a reload.
    pub fn apply_instance_type(
        &self,
        instance_type: Option<TypeKey>,
        ctx: &TypeUpdateContext<'_>,
    ) -> Result<bool, CoreError> {
        let mut state = self.lock();
        let Some(key) = instance_type else {
            state.instance_type = None;
            return Ok(false);
        };

        tracing::debug!("Applying instance type {} to symbol {}", key, self.id);
        state.instance_type = Some(key);
        let outcome = state.reconcile_locked(self.id, true, ctx)?;
        state.finish_reload_locked(ctx.instances);
        Ok(outcome.performed())
    }
}

// ---------------------------------------------------------------------------
// Locked surface: callers hold the creation lock
// ---------------------------------------------------------------------------

impl SymbolState {
    /// Registered instance IDs.
    pub fn instances(&self) -> &IndexSet<InstanceId> {
        &self.instances
    }

    pub fn register_instance_locked(&mut self, instance: InstanceId) -> bool {
        self.instances.insert(instance)
    }

    pub fn unregister_instance_locked(&mut self, instance: InstanceId) -> bool {
        self.instances.shift_remove(&instance)
    }

    pub fn snapshot_locked(&self, id: SymbolId) -> SymbolDefinition {
        SymbolDefinition {
            id,
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            instance_type: self.instance_type.clone(),
            input_definitions: self.input_definitions.clone(),
            output_definitions: self.output_definitions.clone(),
            children: self.children.values().cloned().collect(),
            connections: self.connections.clone(),
        }
    }

    /// See [`Symbol::insert_connection`].
    pub fn insert_connection_locked(
        &mut self,
        connection: Connection,
        multi_input_index: usize,
        arena: &InstanceArena,
    ) -> usize {
        let position = insertion_position(&self.connections, &connection, multi_input_index);
        self.connections.insert(position, connection);
        let index = multi_input_index_at(&self.connections, position);

        for &instance in &self.instances {
            if let Err(e) = arena.connect(instance, &connection, index) {
                tracing::warn!("Could not wire connection in instance {}: {}", instance, e);
            }
        }
        position
    }

    /// See [`Symbol::remove_connection`].
    pub fn remove_connection_locked(
        &mut self,
        symbol_id: SymbolId,
        connection: &Connection,
        multi_input_index: usize,
        arena: &InstanceArena,
    ) -> Result<(), CoreError> {
        let position = position_of_multi_input(&self.connections, connection, multi_input_index)
            .ok_or(CoreError::ConnectionNotFound { symbol: symbol_id })?;
        self.remove_connection_entries_locked(
            [ConnectionEntry {
                connection: *connection,
                multi_input_index,
                position,
            }],
            arena,
        );
        Ok(())
    }

    /// Removes a batch of connections in descending (position, multi-input
    /// index) order and detaches each one from every registered instance.
    ///
    /// Entries that no longer match the list are logged and skipped. Returns
    /// the removed connections in their former list order.
    pub fn remove_connection_entries_locked(
        &mut self,
        entries: impl IntoIterator<Item = ConnectionEntry>,
        arena: &InstanceArena,
    ) -> Vec<Connection> {
        let mut removed = Vec::new();
        for entry in removal_order(entries) {
            if self.connections.get(entry.position) != Some(&entry.connection) {
                tracing::error!("Could not find connection in symbol");
                continue;
            }
            self.connections.remove(entry.position);
            for &instance in &self.instances {
                arena.disconnect(instance, &entry.connection, entry.multi_input_index);
            }
            removed.push(entry.connection);
        }
        removed.reverse();
        removed
    }

    /// Marks and removes every connection matching `predicate` in a single
    /// scan.
    pub fn remove_connections_where_locked(
        &mut self,
        arena: &InstanceArena,
        predicate: impl Fn(&Connection) -> bool,
    ) -> Vec<Connection> {
        let entries: Vec<ConnectionEntry> = self
            .connections
            .iter()
            .enumerate()
            .filter(|(_, con)| predicate(con))
            .map(|(position, con)| ConnectionEntry {
                connection: *con,
                multi_input_index: multi_input_index_at(&self.connections, position),
                position,
            })
            .collect();
        if entries.is_empty() {
            return Vec::new();
        }
        self.remove_connection_entries_locked(entries, arena)
    }

    /// See [`Symbol::remove_child`].
    pub fn remove_child_locked(&mut self, child: ChildId, arena: &InstanceArena) -> Option<RemovedChild> {
        if !self.children.contains_key(&child) {
            return None;
        }
        let connections = self.remove_connections_where_locked(arena, |con| con.touches_child(child));
        let removed = self.children.shift_remove(&child)?;

        let orphaned_instances = self
            .instances
            .iter()
            .filter_map(|&owner| {
                arena
                    .with_mut(owner, |instance| instance.children.shift_remove(&child))
                    .flatten()
            })
            .collect();

        Some(RemovedChild {
            child: removed,
            connections,
            orphaned_instances,
        })
    }

    /// Rewires instances that were waiting for their operator type and
    /// clears their reload flag. Returns how many were reloaded.
    pub fn finish_reload_locked(&self, arena: &InstanceArena) -> usize {
        let reloaded: Vec<InstanceId> = self
            .instances
            .iter()
            .copied()
            .filter(|&id| {
                arena
                    .with_mut(id, |i| std::mem::replace(&mut i.needs_reload, false))
                    .unwrap_or(false)
            })
            .collect();
        for &id in &reloaded {
            arena.rewire(id, &self.connections);
        }
        reloaded.len()
    }

    /// Rebuilds the runtime wiring of every registered instance.
    pub fn rewire_instances_locked(&self, arena: &InstanceArena) {
        for &instance in &self.instances {
            let skipped = arena.rewire(instance, &self.connections);
            if skipped > 0 {
                tracing::debug!("{} connections not materialized in instance {}", skipped, instance);
            }
        }
    }
}
