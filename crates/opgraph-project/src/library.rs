//! The symbol library: every loaded symbol, the live instance tree and the
//! current compiled operator metadata.
//!
//! [`SymbolLibrary`] is the owner-facing layer above `opgraph-core`. It
//! instantiates symbols, applies structural edits (children, connections)
//! to definitions and live instances together, and turns compilation events
//! into type update passes.
//!
//! # Locking
//!
//! Symbols are held as `Arc<Symbol>` in a `DashMap`; lookups clone the `Arc`
//! so no map guard is held while a symbol lock is taken. A thread holds at
//! most one symbol lock at a time. The operator registry is swapped whole
//! under a short `RwLock` write; passes work on a cloned `Arc` of it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use petgraph::graphmap::DiGraphMap;
use rayon::prelude::*;

use opgraph_check::{
    collect_parent_instances, connections_form_cycle, containment_graph, dependents_in,
    validate_connection, would_create_recursive_placement, CheckError, SlotIds,
};
use opgraph_core::{
    ChildId, Connection, CoreError, Instance, InstanceArena, InstanceId, LogMessageSurface,
    MessageSurface, OperatorRegistry, RemovedChild, SlotChangeInfo, SlotId, Symbol, SymbolChild,
    SymbolDefinition, SymbolId, TypeUpdateContext, TypeUpdateOutcome, Value, ValueFactories,
};
use opgraph_core::slot::find_input;

use crate::config::ProjectConfig;
use crate::error::ProjectError;
use crate::file::{PackageFile, ProjectFile};
use crate::fingerprint::{compute_dirty_symbols, fingerprint_all};
use crate::report::{CompilationReport, FailedUpdate};

/// Package name used for symbols added without one.
pub const DEFAULT_PACKAGE: &str = "user";

pub struct SymbolLibrary {
    symbols: DashMap<SymbolId, Arc<Symbol>>,
    packages: DashMap<SymbolId, String>,
    read_only: DashSet<SymbolId>,
    operators: RwLock<Arc<OperatorRegistry>>,
    fingerprints: RwLock<HashMap<SymbolId, blake3::Hash>>,
    factories: Arc<ValueFactories>,
    instances: InstanceArena,
    messages: Arc<dyn MessageSurface>,
    modified: DashSet<SymbolId>,
    config: ProjectConfig,
}

impl std::fmt::Debug for SymbolLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolLibrary")
            .field("symbols", &self.symbols.len())
            .field("instances", &self.instances.len())
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction and lookup
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Creates an empty library with the built-in value factories and
    /// messages going to the log.
    pub fn new(config: ProjectConfig) -> Self {
        SymbolLibrary {
            symbols: DashMap::new(),
            packages: DashMap::new(),
            read_only: DashSet::new(),
            operators: RwLock::new(Arc::new(OperatorRegistry::new())),
            fingerprints: RwLock::new(HashMap::new()),
            factories: Arc::new(ValueFactories::with_builtins()),
            instances: InstanceArena::new(),
            messages: Arc::new(LogMessageSurface),
            modified: DashSet::new(),
            config,
        }
    }

    pub fn with_factories(mut self, factories: ValueFactories) -> Self {
        self.factories = Arc::new(factories);
        self
    }

    pub fn with_messages(mut self, messages: Arc<dyn MessageSurface>) -> Self {
        self.messages = messages;
        self
    }

    /// Builds a library from a saved project. Operator metadata is applied
    /// separately with [`SymbolLibrary::apply_compilation`].
    pub fn from_project(project: ProjectFile, config: ProjectConfig) -> Result<Self, ProjectError> {
        let library = SymbolLibrary::new(config);
        for package in project.packages {
            for definition in package.symbols {
                library.add_symbol(Symbol::from_definition(definition), &package.name, package.read_only)?;
            }
        }
        tracing::info!("Loaded {} symbols", library.symbols.len());
        Ok(library)
    }

    /// Snapshots every symbol into a project file, grouped by package in
    /// name order with symbols sorted by ID.
    pub fn to_project_file(&self, home: Option<SymbolId>) -> ProjectFile {
        let mut grouped: HashMap<String, Vec<SymbolDefinition>> = HashMap::new();
        for symbol in self.all_symbols() {
            let package = self.package_of(symbol.id());
            grouped.entry(package).or_default().push(symbol.snapshot());
        }

        let mut packages: Vec<PackageFile> = grouped
            .into_iter()
            .map(|(name, mut symbols)| {
                symbols.sort_by_key(|s| s.id);
                let read_only = symbols.iter().any(|s| self.read_only.contains(&s.id));
                PackageFile {
                    name,
                    read_only,
                    symbols,
                }
            })
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        ProjectFile { home, packages }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn instances(&self) -> &InstanceArena {
        &self.instances
    }

    pub fn factories(&self) -> &ValueFactories {
        &self.factories
    }

    /// The operator registry of the latest compilation.
    pub fn operators(&self) -> Arc<OperatorRegistry> {
        self.operators.read().clone()
    }

    /// Runs `f` with a type update context over the current registry.
    pub fn with_context<R>(&self, f: impl FnOnce(&TypeUpdateContext<'_>) -> R) -> R {
        let operators = self.operators();
        let ctx = TypeUpdateContext::new(&operators, &self.factories, &self.instances, self.messages.as_ref());
        f(&ctx)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, id: SymbolId) -> Option<Arc<Symbol>> {
        self.symbols.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn require(&self, id: SymbolId) -> Result<Arc<Symbol>, ProjectError> {
        self.symbol(id).ok_or(ProjectError::SymbolNotFound(id))
    }

    /// Every loaded symbol, sorted by ID.
    pub fn all_symbols(&self) -> Vec<Arc<Symbol>> {
        let mut symbols: Vec<Arc<Symbol>> = self.symbols.iter().map(|e| Arc::clone(e.value())).collect();
        symbols.sort_by_key(|s| s.id());
        symbols
    }

    pub fn package_of(&self, id: SymbolId) -> String {
        self.packages
            .get(&id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| DEFAULT_PACKAGE.to_string())
    }

    pub fn is_read_only(&self, id: SymbolId) -> bool {
        self.read_only.contains(&id)
    }

    fn containment(&self) -> DiGraphMap<SymbolId, ()> {
        let symbols = self.all_symbols();
        containment_graph(symbols.iter().map(|s| s.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// Symbol management
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Adds a symbol to a package.
    pub fn add_symbol(&self, symbol: Symbol, package: &str, read_only: bool) -> Result<Arc<Symbol>, ProjectError> {
        let id = symbol.id();
        let symbol = match self.symbols.entry(id) {
            Entry::Occupied(_) => return Err(ProjectError::DuplicateSymbol(id)),
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(symbol)).value()),
        };
        self.packages.insert(id, package.to_string());
        if read_only {
            self.read_only.insert(id);
        }
        Ok(symbol)
    }

    /// Removes a symbol that is not placed anywhere, disposing its instances.
    pub fn remove_symbol(&self, id: SymbolId) -> Result<Arc<Symbol>, ProjectError> {
        let symbol = self.require(id)?;
        let dependents = self.collect_depending_symbols(id);
        if !dependents.is_empty() {
            return Err(ProjectError::SymbolInUse {
                symbol: id,
                dependents: dependents.len(),
            });
        }

        for instance in symbol.instances() {
            if let Err(e) = self.dispose_instance(instance) {
                tracing::warn!("Could not dispose instance {} of symbol {}: {}", instance, id, e);
            }
        }
        self.symbols.remove(&id);
        self.packages.remove(&id);
        self.read_only.remove(&id);
        self.modified.remove(&id);
        Ok(symbol)
    }

    /// Symbols flagged as modified since the last [`SymbolLibrary::clear_modified`].
    pub fn modified_symbols(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.modified.iter().map(|id| *id).collect();
        ids.sort();
        ids
    }

    pub fn is_modified(&self, id: SymbolId) -> bool {
        self.modified.contains(&id)
    }

    pub fn clear_modified(&self) {
        self.modified.clear();
    }

    fn mark_modified(&self, id: SymbolId) {
        if self.read_only.contains(&id) {
            tracing::debug!("Not flagging read-only symbol {} as modified", id);
            return;
        }
        self.modified.insert(id);
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Creates an instance of `symbol_id` with its whole child tree.
    ///
    /// With `parent` set to `(owner, child)` the new instance is attached to
    /// `owner` as the instance of placement `child`. The owner's wiring is
    /// not touched; the caller rewires it once all children exist.
    pub fn create_instance(
        &self,
        symbol_id: SymbolId,
        parent: Option<(InstanceId, ChildId)>,
    ) -> Result<InstanceId, ProjectError> {
        let mut ancestors = Vec::new();
        self.instantiate(symbol_id, parent, &mut ancestors)
    }

    fn instantiate(
        &self,
        symbol_id: SymbolId,
        parent: Option<(InstanceId, ChildId)>,
        ancestors: &mut Vec<SymbolId>,
    ) -> Result<InstanceId, ProjectError> {
        if let Some(&outer) = ancestors.last() {
            if ancestors.contains(&symbol_id) {
                return Err(CheckError::RecursivePlacement {
                    parent: outer,
                    child: symbol_id,
                }
                .into());
            }
        }
        let symbol = self.require(symbol_id)?;
        let id = self.instances.allocate_id();
        let (parent_id, child_id) = match parent {
            Some((owner, child)) => (Some(owner), child),
            None => (None, ChildId::NONE),
        };

        let (children, refreshed) = {
            let mut state = symbol.lock();
            let refreshed = if state.definitions_stale {
                match self.with_context(|ctx| state.refresh_definitions_locked(symbol_id, ctx)) {
                    Ok(report) => Some(report),
                    Err(e) => {
                        tracing::warn!("Instantiating {} with stale definitions: {}", symbol_id, e);
                        None
                    }
                }
            } else {
                None
            };
            self.instances.insert(Instance::new(
                id,
                symbol_id,
                child_id,
                parent_id,
                &state.input_definitions,
                &state.output_definitions,
                &self.factories,
            ));
            state.register_instance_locked(id);
            let children: Vec<SymbolChild> = state.children.values().cloned().collect();
            (children, refreshed)
        };
        if let Some(report) = refreshed {
            self.settle_dependents(symbol_id, &report.changes);
        }

        ancestors.push(symbol_id);
        for child in children {
            if let Err(e) = self.instantiate(child.symbol_id, Some((id, child.id)), ancestors) {
                ancestors.pop();
                if let Err(dispose) = self.dispose_instance(id) {
                    tracing::warn!("Could not dispose partial instance {}: {}", id, dispose);
                }
                return Err(e);
            }
        }
        ancestors.pop();

        {
            let state = symbol.lock();
            let skipped = self.instances.rewire(id, &state.connections);
            if skipped > 0 {
                tracing::warn!("{} connections of symbol {} could not be wired", skipped, symbol_id);
            }
        }

        if let Some((owner, child)) = parent {
            self.instances.with_mut(owner, |o| o.children.insert(child, id));
        }
        tracing::debug!("Created instance {} of symbol {}", id, symbol_id);
        Ok(id)
    }

    /// Disposes an instance and its whole subtree. Returns how many
    /// instances were removed.
    pub fn dispose_instance(&self, id: InstanceId) -> Result<usize, ProjectError> {
        let (parent, child_id) = self
            .instances
            .with(id, |i| (i.parent, i.child_id))
            .ok_or(CoreError::InstanceNotFound { id })?;

        let parent_symbol = parent.and_then(|owner| {
            self.instances.with_mut(owner, |o| {
                if o.children.get(&child_id) == Some(&id) {
                    o.children.shift_remove(&child_id);
                }
                o.symbol_id
            })
        });

        let subtree = self.instances.subtree(id);
        for &member in &subtree {
            let Some(symbol_id) = self.instances.with(member, |i| i.symbol_id) else {
                continue;
            };
            if let Some(symbol) = self.symbol(symbol_id) {
                symbol.unregister_instance(member);
            }
            self.instances.remove(member);
        }

        // Links from siblings to the disposed instance are stale now.
        if let (Some(owner), Some(symbol_id)) = (parent, parent_symbol) {
            if let Some(symbol) = self.symbol(symbol_id) {
                let state = symbol.lock();
                self.instances.rewire(owner, &state.connections);
            }
        }
        Ok(subtree.len())
    }

    /// Assigns an explicit value to an input of a live instance.
    pub fn set_input_value(
        &self,
        instance: InstanceId,
        slot: SlotId,
        value: Value,
    ) -> Result<(), ProjectError> {
        self.instances
            .with_mut(instance, |i| {
                let endpoint = i.child_id;
                let Some(input) = i.inputs.get_mut(&slot) else {
                    return Err(CoreError::SlotNotFound { slot, endpoint });
                };
                input.set_value(value)
            })
            .ok_or(CoreError::InstanceNotFound { id: instance })??;
        Ok(())
    }

    /// Ancestors of a live instance, root first.
    pub fn parent_instances(&self, instance: InstanceId) -> Vec<InstanceId> {
        collect_parent_instances(&self.instances, instance)
    }
}

// ---------------------------------------------------------------------------
// Structure editing
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Places `child` inside `symbol_id` and creates an instance of it in
    /// every live instance of the symbol. Returns the created instances.
    pub fn add_child(&self, symbol_id: SymbolId, child: SymbolChild) -> Result<Vec<InstanceId>, ProjectError> {
        let symbol = self.require(symbol_id)?;
        self.require(child.symbol_id)?;
        if would_create_recursive_placement(&self.containment(), symbol_id, child.symbol_id) {
            return Err(CheckError::RecursivePlacement {
                parent: symbol_id,
                child: child.symbol_id,
            }
            .into());
        }

        let child_id = child.id;
        let child_symbol = child.symbol_id;
        if !symbol.add_child(child) {
            return Err(ProjectError::DuplicateChild {
                symbol: symbol_id,
                child: child_id,
            });
        }

        let mut created = Vec::new();
        for owner in symbol.instances() {
            created.push(self.create_instance(child_symbol, Some((owner, child_id)))?);
        }
        self.mark_modified(symbol_id);
        Ok(created)
    }

    /// Removes a child placement, its connections and its instances.
    pub fn remove_child(&self, symbol_id: SymbolId, child: ChildId) -> Result<RemovedChild, ProjectError> {
        let symbol = self.require(symbol_id)?;
        let removed = symbol
            .remove_child(child, &self.instances)
            .ok_or(CoreError::ChildNotFound {
                symbol: symbol_id,
                child,
            })?;
        for &orphan in &removed.orphaned_instances {
            if let Err(e) = self.dispose_instance(orphan) {
                tracing::warn!("Could not dispose instance {}: {}", orphan, e);
            }
        }
        self.mark_modified(symbol_id);
        Ok(removed)
    }

    /// Adds a connection at the given multi-input index and wires every
    /// live instance. Returns the list position of the new connection.
    ///
    /// A connection into a single input replaces the one already there.
    pub fn add_connection(
        &self,
        symbol_id: SymbolId,
        connection: Connection,
        multi_input_index: usize,
    ) -> Result<usize, ProjectError> {
        let symbol = self.require(symbol_id)?;
        let definition = symbol.snapshot();
        validate_connection(&definition, &connection, |id: SymbolId| {
            self.symbol(id).map(|s| SlotIds::of(&s))
        })?;
        let is_multi_input = self.targets_multi_input(&definition, &connection);

        let mut state = symbol.lock();
        for endpoint in [connection.source_parent_or_child_id, connection.target_parent_or_child_id] {
            if !endpoint.is_none() && !state.children.contains_key(&endpoint) {
                return Err(CheckError::UnknownChild {
                    symbol: symbol_id,
                    child: endpoint,
                }
                .into());
            }
        }
        if connections_form_cycle(&state.connections, &connection) {
            tracing::debug!("This action is not allowed. This connection would create a cycle.");
            return Err(CheckError::CycleDetected {
                symbol: symbol_id,
                from_child: connection.source_parent_or_child_id,
                to_child: connection.target_parent_or_child_id,
            }
            .into());
        }

        let index = if is_multi_input {
            multi_input_index
        } else {
            let replaced = state.remove_connections_where_locked(&self.instances, |c| c.same_target(&connection));
            if !replaced.is_empty() {
                tracing::debug!("Replaced {} connections into a single input", replaced.len());
            }
            0
        };
        let position = state.insert_connection_locked(connection, index, &self.instances);
        drop(state);

        self.mark_modified(symbol_id);
        Ok(position)
    }

    fn targets_multi_input(&self, owner: &SymbolDefinition, connection: &Connection) -> bool {
        if connection.is_connected_to_symbol_output() {
            return false;
        }
        owner
            .children
            .iter()
            .find(|c| c.id == connection.target_parent_or_child_id)
            .and_then(|c| self.symbol(c.symbol_id))
            .is_some_and(|target| {
                let state = target.lock();
                find_input(&state.input_definitions, connection.target_slot_id)
                    .is_some_and(|d| d.is_multi_input)
            })
    }

    /// Removes the `multi_input_index`-th connection into the target of
    /// `connection`.
    pub fn remove_connection(
        &self,
        symbol_id: SymbolId,
        connection: &Connection,
        multi_input_index: usize,
    ) -> Result<(), ProjectError> {
        let symbol = self.require(symbol_id)?;
        symbol.remove_connection(connection, multi_input_index, &self.instances)?;
        self.mark_modified(symbol_id);
        Ok(())
    }

    /// Replaces the contents of `target_id` with those of `source_id` and
    /// brings live instances in line with the new children.
    pub fn replace_symbol_contents(&self, target_id: SymbolId, source_id: SymbolId) -> Result<bool, ProjectError> {
        let target = self.require(target_id)?;
        let source = self.require(source_id)?;

        let graph = self.containment();
        for child in source.children() {
            if would_create_recursive_placement(&graph, target_id, child.symbol_id) {
                return Err(CheckError::RecursivePlacement {
                    parent: target_id,
                    child: child.symbol_id,
                }
                .into());
            }
        }

        let (inputs_before, outputs_before) = {
            let state = target.lock();
            (state.input_definitions.clone(), state.output_definitions.clone())
        };
        let performed = self.with_context(|ctx| target.replace_with_contents_of(&source, ctx))?;
        let changes = {
            let state = target.lock();
            SlotChangeInfo {
                removed_input_definitions: inputs_before
                    .into_iter()
                    .filter(|d| find_input(&state.input_definitions, d.id).is_none())
                    .collect(),
                removed_output_definitions: outputs_before
                    .into_iter()
                    .filter(|d| state.output_definitions.iter().all(|o| o.id != d.id))
                    .collect(),
                latest_input_definitions: state.input_definitions.clone(),
                latest_output_definitions: state.output_definitions.clone(),
            }
        };

        let children = target.children();
        for owner in target.instances() {
            for child in &children {
                if self.instances.child_of(owner, child.id).is_none() {
                    self.create_instance(child.symbol_id, Some((owner, child.id)))?;
                }
            }
        }
        target.lock().rewire_instances_locked(&self.instances);
        self.settle_dependents(target_id, &changes);

        self.mark_modified(target_id);
        Ok(performed)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Every symbol with a child placement of `symbol_id`, sorted.
    pub fn collect_depending_symbols(&self, symbol_id: SymbolId) -> Vec<SymbolId> {
        dependents_in(&self.containment(), symbol_id)
    }

    /// Returns `true` if adding `connection` to `symbol_id` would close a
    /// loop among its children.
    pub fn check_for_cycle(&self, symbol_id: SymbolId, connection: &Connection) -> Result<bool, ProjectError> {
        let symbol = self.require(symbol_id)?;
        Ok(opgraph_check::check_for_cycle(&symbol, connection))
    }
}

// ---------------------------------------------------------------------------
// Compilation events
// ---------------------------------------------------------------------------

impl SymbolLibrary {
    /// Installs freshly compiled operator metadata and updates every symbol
    /// whose slot declarations changed.
    pub fn apply_compilation(&self, registry: OperatorRegistry) -> Result<CompilationReport, ProjectError> {
        let current = fingerprint_all(&registry)?;
        let dirty = compute_dirty_symbols(&current, &self.fingerprints.read());
        tracing::info!(
            "Compilation: {} new, {} changed, {} removed operator types",
            dirty.new.len(),
            dirty.modified.len(),
            dirty.removed.len()
        );

        let registry = Arc::new(registry);
        *self.operators.write() = Arc::clone(&registry);
        *self.fingerprints.write() = current;

        let mut removed_types: Vec<SymbolId> = dirty.removed.iter().copied().collect();
        removed_types.sort();
        for &id in &removed_types {
            if let Some(symbol) = self.symbol(id) {
                self.with_context(|ctx| symbol.remove_all_references_to_type(ctx))?;
            }
        }

        let needs_update = dirty.needs_update();
        for descriptor in registry.iter() {
            let Some(symbol) = self.symbol(descriptor.symbol_id) else {
                continue;
            };
            let mut state = symbol.lock();
            if state.instance_type.as_ref() != Some(&descriptor.type_key) {
                state.instance_type = Some(descriptor.type_key.clone());
            }
            if needs_update.contains(&descriptor.symbol_id) {
                state.needs_type_update = true;
            }
        }

        let mut report = self.update_dirty_symbols();
        report.new_types = sorted(dirty.new);
        report.changed_types = sorted(dirty.modified);
        report.removed_types = removed_types;
        Ok(report)
    }

    /// Runs a type update on every symbol flagged with `needs_type_update`,
    /// then prunes and flags their dependents.
    pub fn update_dirty_symbols(&self) -> CompilationReport {
        let dirty: Vec<Arc<Symbol>> = self
            .all_symbols()
            .into_iter()
            .filter(|s| s.needs_type_update())
            .collect();
        let mut report = CompilationReport::default();
        if dirty.is_empty() {
            return report;
        }

        let operators = self.operators();
        let ctx = TypeUpdateContext::new(&operators, &self.factories, &self.instances, self.messages.as_ref());
        let reconcile = |symbol: &Arc<Symbol>| {
            let mut state = symbol.lock();
            let outcome = state.reconcile_locked(symbol.id(), false, &ctx);
            if outcome.is_ok() {
                state.finish_reload_locked(&self.instances);
            }
            (symbol.id(), outcome)
        };
        let outcomes: Vec<_> = if self.config.parallel_updates {
            dirty.par_iter().map(reconcile).collect()
        } else {
            dirty.iter().map(reconcile).collect()
        };

        let graph = self.containment();
        let mut modified = BTreeSet::new();
        let mut read_only = BTreeSet::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(TypeUpdateOutcome::NotNeeded) => continue,
                Ok(TypeUpdateOutcome::Skipped) => report.skipped.push(id),
                Ok(TypeUpdateOutcome::Updated(update)) => {
                    report.updated.push(id);
                    report.removed_connections += update.removed_connections.len();
                    if self.config.prune_dependents && update.changes.has_removals() {
                        report.pruned_dependent_connections +=
                            self.prune_dependent_connections(id, &update.changes, &graph);
                    }
                }
                Err(e) => {
                    tracing::error!("Type update of symbol {} failed: {}", id, e);
                    report.failed.push(FailedUpdate {
                        symbol: id,
                        error: e.to_string(),
                    });
                    continue;
                }
            }
            if self.config.flag_dependents {
                let (m, r) = self.flag_dependents_in(&graph, id);
                modified.extend(m);
                read_only.extend(r);
            }
        }

        report.modified_dependents = modified.into_iter().collect();
        report.read_only_dependents = read_only.into_iter().collect();
        tracing::info!(
            "Updated {} symbols, skipped {}, {} failed",
            report.updated.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Removes connections in depending symbols that target a removed input
    /// of a placement of `symbol_id`, or come from a removed output of one.
    /// Returns the number of connections removed.
    pub fn prune_dependents(&self, symbol_id: SymbolId, changes: &SlotChangeInfo) -> usize {
        self.prune_dependent_connections(symbol_id, changes, &self.containment())
    }

    fn prune_dependent_connections(
        &self,
        symbol_id: SymbolId,
        changes: &SlotChangeInfo,
        graph: &DiGraphMap<SymbolId, ()>,
    ) -> usize {
        let removed_inputs: HashSet<_> = changes.removed_input_definitions.iter().map(|d| d.id).collect();
        let removed_outputs: HashSet<_> = changes.removed_output_definitions.iter().map(|d| d.id).collect();

        let mut total = 0;
        for dependent in dependents_in(graph, symbol_id) {
            let Some(parent) = self.symbol(dependent) else {
                continue;
            };
            let removed = {
                let mut state = parent.lock();
                let placements: HashSet<ChildId> = state
                    .children
                    .values()
                    .filter(|c| c.symbol_id == symbol_id)
                    .map(|c| c.id)
                    .collect();
                state.remove_connections_where_locked(&self.instances, |c| {
                    (placements.contains(&c.target_parent_or_child_id) && removed_inputs.contains(&c.target_slot_id))
                        || (placements.contains(&c.source_parent_or_child_id)
                            && removed_outputs.contains(&c.source_slot_id))
                })
            };
            if !removed.is_empty() {
                tracing::info!("Removed {} connections to deleted slots in symbol {}", removed.len(), dependent);
                total += removed.len();
            }
        }
        total
    }

    /// Prunes and flags the dependents of a symbol whose definitions changed
    /// outside a compilation pass.
    fn settle_dependents(&self, symbol_id: SymbolId, changes: &SlotChangeInfo) {
        if self.config.prune_dependents && changes.has_removals() {
            self.prune_dependents(symbol_id, changes);
        }
        if self.config.flag_dependents {
            self.flag_dependents_modified(symbol_id);
        }
    }

    /// Flags every symbol placing `symbol_id` as modified. Returns the
    /// flagged symbols and the read-only ones that were left alone.
    pub fn flag_dependents_modified(&self, symbol_id: SymbolId) -> (Vec<SymbolId>, Vec<SymbolId>) {
        self.flag_dependents_in(&self.containment(), symbol_id)
    }

    fn flag_dependents_in(&self, graph: &DiGraphMap<SymbolId, ()>, symbol_id: SymbolId) -> (Vec<SymbolId>, Vec<SymbolId>) {
        let (read_only, modified): (Vec<SymbolId>, Vec<SymbolId>) = dependents_in(graph, symbol_id)
            .into_iter()
            .partition(|id| self.read_only.contains(id));
        for &id in &modified {
            self.modified.insert(id);
        }
        tracing::info!(
            "Modified {} dependent symbols and {} read-only dependent symbols.",
            modified.len(),
            read_only.len()
        );
        (modified, read_only)
    }
}

fn sorted(ids: HashSet<SymbolId>) -> Vec<SymbolId> {
    let mut ids: Vec<SymbolId> = ids.into_iter().collect();
    ids.sort();
    ids
}
