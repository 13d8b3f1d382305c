//! Live instances and the arena that owns them.
//!
//! An [`Instance`] is one runtime instantiation of a symbol. It keeps a
//! runtime input per input definition and a runtime output per output
//! definition, keyed by [`SlotId`]. Instances form a tree: each one is owned
//! by its parent (or is a root) and records the child instances created for
//! its symbol's child placements.
//!
//! All instances live in a single [`InstanceArena`]. Symbols only hold
//! [`InstanceId`]s of the instances created from them, so there is no
//! ownership cycle between a symbol and its instances.
//!
//! Runtime wiring is pull-based: a connection is materialized as an
//! [`InputLink`] stored on the *target* side (a child's input, or the
//! instance's own output for connections into the symbol boundary).

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::connection::Connection;
use crate::error::CoreError;
use crate::factory::ValueFactories;
use crate::id::{ChildId, InstanceId, SlotId, SymbolId};
use crate::slot::{DirtyFlagTrigger, InputDefinition, OutputDefinition};
use crate::value::{Value, ValueType};

/// Where a runtime slot pulls its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InputLink {
    pub source_instance: InstanceId,
    pub source_slot_id: SlotId,
}

/// The runtime side of an input definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeInput {
    pub definition_id: SlotId,
    pub value_type: ValueType,
    pub value: Value,
    /// `true` until a value is assigned explicitly.
    pub is_default: bool,
    pub is_multi_input: bool,
    /// Incoming links; ordered by multi-input index.
    pub links: SmallVec<[InputLink; 1]>,
}

impl RuntimeInput {
    /// A fresh runtime input holding the definition's default value.
    pub fn new(definition: &InputDefinition) -> Self {
        RuntimeInput {
            definition_id: definition.id,
            value_type: definition.value_type(),
            value: definition.default_value.clone(),
            is_default: true,
            is_multi_input: definition.is_multi_input,
            links: SmallVec::new(),
        }
    }

    /// Assigns an explicit value. The value must match the slot's type.
    pub fn set_value(&mut self, value: Value) -> Result<(), CoreError> {
        let actual = value.value_type();
        if actual != self.value_type {
            return Err(CoreError::TypeMismatch {
                slot: self.definition_id,
                expected: self.value_type.clone(),
                actual,
            });
        }
        self.value = value;
        self.is_default = false;
        Ok(())
    }
}

/// The runtime side of an output definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeOutput {
    pub definition_id: SlotId,
    pub value_type: ValueType,
    pub payload: Value,
    pub dirty_flag_trigger: DirtyFlagTrigger,
    /// Set when the output is fed from a child inside the instance.
    pub links: SmallVec<[InputLink; 1]>,
}

impl RuntimeOutput {
    pub fn new(definition: &OutputDefinition, payload: Value) -> Self {
        RuntimeOutput {
            definition_id: definition.id,
            value_type: definition.value_type.clone(),
            payload,
            dirty_flag_trigger: definition.dirty_flag_trigger,
            links: SmallVec::new(),
        }
    }

    /// Builds a runtime output with a fresh payload from `factories`.
    pub fn create(
        definition: &OutputDefinition,
        factories: &ValueFactories,
    ) -> Result<Self, CoreError> {
        let payload = factories.create_output_payload(&definition.value_type)?;
        Ok(RuntimeOutput::new(definition, payload))
    }
}

/// One live instantiation of a symbol.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub id: InstanceId,
    pub symbol_id: SymbolId,
    /// Placement this instance was created for inside its parent's symbol.
    /// [`ChildId::NONE`] for roots.
    pub child_id: ChildId,
    pub parent: Option<InstanceId>,
    pub children: IndexMap<ChildId, InstanceId>,
    pub inputs: IndexMap<SlotId, RuntimeInput>,
    pub outputs: IndexMap<SlotId, RuntimeOutput>,
    /// Set while the backing operator type is unloaded.
    pub needs_reload: bool,
}

impl Instance {
    /// Creates an instance with runtime slots for the given definitions.
    ///
    /// Outputs whose payload cannot be created are left out and logged; the
    /// next successful type update fills them in.
    pub fn new(
        id: InstanceId,
        symbol_id: SymbolId,
        child_id: ChildId,
        parent: Option<InstanceId>,
        inputs: &[InputDefinition],
        outputs: &[OutputDefinition],
        factories: &ValueFactories,
    ) -> Self {
        let inputs = inputs
            .iter()
            .map(|def| (def.id, RuntimeInput::new(def)))
            .collect();

        let mut runtime_outputs = IndexMap::with_capacity(outputs.len());
        for def in outputs {
            match RuntimeOutput::create(def, factories) {
                Ok(output) => {
                    runtime_outputs.insert(def.id, output);
                }
                Err(e) => {
                    tracing::error!("Could not create output {} of instance {}: {}", def.name, id, e);
                }
            }
        }

        Instance {
            id,
            symbol_id,
            child_id,
            parent,
            children: IndexMap::new(),
            inputs,
            outputs: runtime_outputs,
            needs_reload: false,
        }
    }

    /// Returns the link list a connection target resolves to on this
    /// instance: an output when `boundary` is set, an input otherwise.
    fn links_mut(&mut self, slot: SlotId, boundary: bool) -> Option<&mut SmallVec<[InputLink; 1]>> {
        if boundary {
            self.outputs.get_mut(&slot).map(|o| &mut o.links)
        } else {
            self.inputs.get_mut(&slot).map(|i| &mut i.links)
        }
    }

    /// Drops all runtime wiring owned by this instance.
    pub fn clear_output_links(&mut self) {
        for output in self.outputs.values_mut() {
            output.links.clear();
        }
    }

    /// Releases the instance's internal wiring and marks it as waiting for
    /// its operator type to be loaded again. Links into its inputs belong to
    /// the parent and are kept.
    pub fn prepare_for_reload(&mut self) {
        self.clear_output_links();
        self.needs_reload = true;
    }
}

/// Concurrent owner of all live instances.
///
/// Entries are accessed through closures so that no guard escapes; callers
/// must not call back into the arena from inside a closure.
#[derive(Debug, Default)]
pub struct InstanceArena {
    instances: DashMap<InstanceId, Instance>,
    next_id: AtomicU64,
}

impl InstanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fresh instance ID.
    pub fn allocate_id(&self) -> InstanceId {
        InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&self, instance: Instance) {
        self.instances.insert(instance.id, instance);
    }

    pub fn remove(&self, id: InstanceId) -> Option<Instance> {
        self.instances.remove(&id).map(|(_, instance)| instance)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Runs `f` with shared access to an instance.
    pub fn with<R>(&self, id: InstanceId, f: impl FnOnce(&Instance) -> R) -> Option<R> {
        self.instances.get(&id).map(|entry| f(entry.value()))
    }

    /// Runs `f` with exclusive access to an instance.
    pub fn with_mut<R>(&self, id: InstanceId, f: impl FnOnce(&mut Instance) -> R) -> Option<R> {
        self.instances.get_mut(&id).map(|mut entry| f(entry.value_mut()))
    }

    /// Returns a copy of an instance.
    pub fn get(&self, id: InstanceId) -> Option<Instance> {
        self.with(id, Instance::clone)
    }

    /// Returns the instance created for `child` inside `parent`.
    pub fn child_of(&self, parent: InstanceId, child: ChildId) -> Option<InstanceId> {
        self.with(parent, |p| p.children.get(&child).copied()).flatten()
    }

    /// Resolves a connection endpoint relative to the instance that owns
    /// the connection.
    fn resolve_endpoint(&self, owner: InstanceId, parent_or_child: ChildId) -> Result<InstanceId, CoreError> {
        if parent_or_child.is_none() {
            return Ok(owner);
        }
        self.child_of(owner, parent_or_child)
            .ok_or(CoreError::InstanceNotFound { id: owner })
    }

    /// Materializes `connection` inside the instance `owner`.
    ///
    /// Multi-inputs get the link inserted at `multi_input_index`; single
    /// inputs and boundary outputs have their link replaced.
    pub fn connect(
        &self,
        owner: InstanceId,
        connection: &Connection,
        multi_input_index: usize,
    ) -> Result<(), CoreError> {
        let source = self.resolve_endpoint(owner, connection.source_parent_or_child_id)?;
        let target = self.resolve_endpoint(owner, connection.target_parent_or_child_id)?;
        let link = InputLink {
            source_instance: source,
            source_slot_id: connection.source_slot_id,
        };
        let boundary = connection.is_connected_to_symbol_output();
        let slot = connection.target_slot_id;

        self.with_mut(target, |instance| {
            let is_multi_input = !boundary
                && instance
                    .inputs
                    .get(&slot)
                    .is_some_and(|input| input.is_multi_input);
            let links = instance.links_mut(slot, boundary).ok_or(CoreError::SlotNotFound {
                slot,
                endpoint: connection.target_parent_or_child_id,
            })?;
            if is_multi_input {
                let index = multi_input_index.min(links.len());
                links.insert(index, link);
            } else {
                links.clear();
                links.push(link);
            }
            Ok(())
        })
        .unwrap_or(Err(CoreError::InstanceNotFound { id: target }))
    }

    /// Releases the runtime link created for `connection` inside `owner`.
    ///
    /// Multi-inputs drop the entry at `multi_input_index` when it matches the
    /// connection's source; otherwise the first matching link is dropped.
    /// Returns `false` when nothing was detached.
    pub fn disconnect(&self, owner: InstanceId, connection: &Connection, multi_input_index: usize) -> bool {
        let Ok(source) = self.resolve_endpoint(owner, connection.source_parent_or_child_id) else {
            return false;
        };
        let Ok(target) = self.resolve_endpoint(owner, connection.target_parent_or_child_id) else {
            return false;
        };
        let expected = InputLink {
            source_instance: source,
            source_slot_id: connection.source_slot_id,
        };
        let boundary = connection.is_connected_to_symbol_output();

        self.with_mut(target, |instance| {
            let Some(links) = instance.links_mut(connection.target_slot_id, boundary) else {
                return false;
            };
            if links.get(multi_input_index) == Some(&expected) {
                links.remove(multi_input_index);
                return true;
            }
            match links.iter().position(|l| *l == expected) {
                Some(index) => {
                    links.remove(index);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Rebuilds the wiring of `owner` from scratch for the given ordered
    /// connection list. Endpoints that cannot be resolved are skipped and
    /// counted.
    pub fn rewire(&self, owner: InstanceId, connections: &[Connection]) -> usize {
        let Some(children) = self.with_mut(owner, |instance| {
            instance.clear_output_links();
            instance.children.values().copied().collect::<Vec<_>>()
        }) else {
            return connections.len();
        };
        for child in children {
            self.with_mut(child, |c| {
                for input in c.inputs.values_mut() {
                    input.links.clear();
                }
            });
        }

        let mut skipped = 0;
        for (position, connection) in connections.iter().enumerate() {
            let index = crate::connection::multi_input_index_at(connections, position);
            if let Err(e) = self.connect(owner, connection, index) {
                tracing::debug!("Skipped connection while rewiring instance {}: {}", owner, e);
                skipped += 1;
            }
        }
        skipped
    }

    /// Collects `root` and all its descendants, children before parents.
    pub fn subtree(&self, root: InstanceId) -> Vec<InstanceId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(children) = self.with(id, |i| i.children.values().copied().collect::<Vec<_>>()) {
                stack.extend(children.into_iter().map(|c| (c, false)));
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_input(name: &str) -> InputDefinition {
        InputDefinition::new(SlotId::new(), name, Value::Float(0.0))
    }

    fn spawn(arena: &InstanceArena, inputs: &[InputDefinition], outputs: &[OutputDefinition]) -> InstanceId {
        let id = arena.allocate_id();
        let factories = ValueFactories::with_builtins();
        arena.insert(Instance::new(
            id,
            SymbolId::new(),
            ChildId::NONE,
            None,
            inputs,
            outputs,
            &factories,
        ));
        id
    }

    #[test]
    fn set_value_checks_type() {
        let def = float_input("A");
        let mut input = RuntimeInput::new(&def);
        assert!(input.is_default);
        input.set_value(Value::Float(2.0)).unwrap();
        assert!(!input.is_default);
        assert!(matches!(
            input.set_value(Value::Int(1)),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn outputs_without_factory_are_left_out() {
        let arena = InstanceArena::new();
        let good = OutputDefinition::new(SlotId::new(), "Good", ValueType::FLOAT);
        let bad = OutputDefinition::new(SlotId::new(), "Bad", ValueType::named("mystery"));
        let id = spawn(&arena, &[], &[good.clone(), bad.clone()]);

        let instance = arena.get(id).unwrap();
        assert!(instance.outputs.contains_key(&good.id));
        assert!(!instance.outputs.contains_key(&bad.id));
    }

    #[test]
    fn connect_and_disconnect_multi_input() {
        let arena = InstanceArena::new();
        let parent_input = float_input("In");
        let parent = spawn(&arena, &[parent_input.clone()], &[]);

        let layers = float_input("Layers").multi();
        let child = spawn(&arena, &[layers.clone()], &[]);
        let child_id = ChildId::new();
        arena.with_mut(parent, |p| p.children.insert(child_id, child));

        let con = Connection::new(ChildId::NONE, parent_input.id, child_id, layers.id);
        arena.connect(parent, &con, 0).unwrap();
        arena.connect(parent, &con, 1).unwrap();
        assert_eq!(arena.with(child, |c| c.inputs[&layers.id].links.len()), Some(2));

        assert!(arena.disconnect(parent, &con, 1));
        assert_eq!(arena.with(child, |c| c.inputs[&layers.id].links.len()), Some(1));
        assert!(arena.disconnect(parent, &con, 0));
        assert!(!arena.disconnect(parent, &con, 0));
    }

    #[test]
    fn single_input_link_is_replaced() {
        let arena = InstanceArena::new();
        let a = float_input("A");
        let b = float_input("B");
        let parent = spawn(&arena, &[a.clone(), b.clone()], &[]);
        let target = float_input("T");
        let child = spawn(&arena, &[target.clone()], &[]);
        let child_id = ChildId::new();
        arena.with_mut(parent, |p| p.children.insert(child_id, child));

        arena
            .connect(parent, &Connection::new(ChildId::NONE, a.id, child_id, target.id), 0)
            .unwrap();
        arena
            .connect(parent, &Connection::new(ChildId::NONE, b.id, child_id, target.id), 0)
            .unwrap();

        let links = arena.with(child, |c| c.inputs[&target.id].links.clone()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_slot_id, b.id);
    }

    #[test]
    fn connect_to_unknown_child_fails() {
        let arena = InstanceArena::new();
        let a = float_input("A");
        let parent = spawn(&arena, &[a.clone()], &[]);
        let con = Connection::new(ChildId::NONE, a.id, ChildId::new(), SlotId::new());
        assert!(matches!(
            arena.connect(parent, &con, 0),
            Err(CoreError::InstanceNotFound { .. })
        ));
    }

    #[test]
    fn subtree_lists_children_first() {
        let arena = InstanceArena::new();
        let root = spawn(&arena, &[], &[]);
        let child = spawn(&arena, &[], &[]);
        let grandchild = spawn(&arena, &[], &[]);
        arena.with_mut(root, |r| r.children.insert(ChildId::new(), child));
        arena.with_mut(child, |c| c.children.insert(ChildId::new(), grandchild));

        assert_eq!(arena.subtree(root), vec![grandchild, child, root]);
    }
}
