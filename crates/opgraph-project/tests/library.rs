//! Integration tests for the symbol library: instantiation, structural
//! edits on live instances and compilation events.

use opgraph_check::CheckError;
use opgraph_core::{
    ChildId, Connection, InputDefinition, InputLink, OperatorDescriptor, OperatorRegistry,
    OutputDefinition, SlotId, Symbol, SymbolChild, SymbolId, Value, ValueType,
};
use opgraph_project::{ProjectConfig, ProjectError, SymbolLibrary};

struct Leaf {
    id: SymbolId,
    input: InputDefinition,
    output: OutputDefinition,
}

impl Leaf {
    fn add(lib: &SymbolLibrary, name: &str, multi: bool) -> Leaf {
        let symbol = Symbol::new(SymbolId::new(), name);
        let mut input = InputDefinition::new(SlotId::new(), "In", Value::Float(0.0));
        if multi {
            input = input.multi();
        }
        let output = OutputDefinition::new(SlotId::new(), "Out", ValueType::FLOAT);
        {
            let mut state = symbol.lock();
            state.input_definitions = vec![input.clone()];
            state.output_definitions = vec![output.clone()];
        }
        let id = lib.add_symbol(symbol, "user", false).unwrap().id();
        Leaf { id, input, output }
    }

    fn descriptor(&self) -> OperatorDescriptor {
        let descriptor = OperatorDescriptor::new(self.id, "Leaf@1");
        let descriptor = if self.input.is_multi_input {
            descriptor.with_multi_input(self.input.id, &self.input.name, ValueType::FLOAT)
        } else {
            descriptor.with_input(self.input.id, &self.input.name, ValueType::FLOAT)
        };
        descriptor.with_output(self.output.id, &self.output.name, ValueType::FLOAT)
    }

    /// The same operator with its input removed.
    fn descriptor_without_input(&self) -> OperatorDescriptor {
        OperatorDescriptor::new(self.id, "Leaf@2").with_output(self.output.id, &self.output.name, ValueType::FLOAT)
    }
}

/// A parent symbol `P(in) -> A -> B -> P(out)` with two placements of one leaf.
struct Graph {
    lib: SymbolLibrary,
    leaf: Leaf,
    parent: SymbolId,
    p_in: InputDefinition,
    p_out: OutputDefinition,
    a: ChildId,
    b: ChildId,
}

fn registry(descriptors: impl IntoIterator<Item = OperatorDescriptor>) -> OperatorRegistry {
    descriptors.into_iter().collect()
}

fn graph_with(config: ProjectConfig, parent_read_only: bool) -> Graph {
    let lib = SymbolLibrary::new(config);
    let leaf = Leaf::add(&lib, "Leaf", false);

    let parent = Symbol::new(SymbolId::new(), "Parent");
    let p_in = InputDefinition::new(SlotId::new(), "Input", Value::Float(1.0));
    let p_out = OutputDefinition::new(SlotId::new(), "Output", ValueType::FLOAT);
    {
        let mut state = parent.lock();
        state.input_definitions = vec![p_in.clone()];
        state.output_definitions = vec![p_out.clone()];
    }
    let parent = lib.add_symbol(parent, "user", parent_read_only).unwrap().id();

    let a = SymbolChild::new(leaf.id, "A");
    let b = SymbolChild::new(leaf.id, "B");
    assert!(lib.add_child(parent, a.clone()).unwrap().is_empty());
    assert!(lib.add_child(parent, b.clone()).unwrap().is_empty());

    lib.add_connection(parent, Connection::new(ChildId::NONE, p_in.id, a.id, leaf.input.id), 0)
        .unwrap();
    lib.add_connection(parent, Connection::new(a.id, leaf.output.id, b.id, leaf.input.id), 0)
        .unwrap();
    lib.add_connection(parent, Connection::new(b.id, leaf.output.id, ChildId::NONE, p_out.id), 0)
        .unwrap();

    let report = lib.apply_compilation(registry([leaf.descriptor()])).unwrap();
    assert_eq!(report.updated, vec![leaf.id]);
    lib.clear_modified();

    Graph {
        lib,
        leaf,
        parent,
        p_in,
        p_out,
        a: a.id,
        b: b.id,
    }
}

fn graph() -> Graph {
    graph_with(ProjectConfig::default(), false)
}

fn input_links(lib: &SymbolLibrary, instance: opgraph_core::InstanceId, slot: SlotId) -> Vec<InputLink> {
    lib.instances()
        .with(instance, |i| i.inputs[&slot].links.to_vec())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

#[test]
fn instantiation_builds_and_wires_the_tree() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();
    let arena = g.lib.instances();
    assert_eq!(arena.len(), 3);

    let a = arena.child_of(root, g.a).unwrap();
    let b = arena.child_of(root, g.b).unwrap();
    assert_eq!(
        input_links(&g.lib, a, g.leaf.input.id),
        vec![InputLink {
            source_instance: root,
            source_slot_id: g.p_in.id
        }]
    );
    assert_eq!(
        input_links(&g.lib, b, g.leaf.input.id),
        vec![InputLink {
            source_instance: a,
            source_slot_id: g.leaf.output.id
        }]
    );
    let output_links = arena.with(root, |i| i.outputs[&g.p_out.id].links.to_vec()).unwrap();
    assert_eq!(
        output_links,
        vec![InputLink {
            source_instance: b,
            source_slot_id: g.leaf.output.id
        }]
    );

    assert_eq!(g.lib.parent_instances(b), vec![root]);
    assert_eq!(g.lib.symbol(g.leaf.id).unwrap().instance_count(), 2);

    assert_eq!(g.lib.dispose_instance(root).unwrap(), 3);
    assert!(arena.is_empty());
    assert_eq!(g.lib.symbol(g.leaf.id).unwrap().instance_count(), 0);
}

#[test]
fn adding_a_child_instantiates_it_in_live_instances() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();

    let c = SymbolChild::new(g.leaf.id, "C");
    let created = g.lib.add_child(g.parent, c.clone()).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(g.lib.instances().child_of(root, c.id), Some(created[0]));
    assert!(g.lib.is_modified(g.parent));

    assert!(matches!(
        g.lib.add_child(g.parent, c),
        Err(ProjectError::DuplicateChild { .. })
    ));
    assert!(matches!(
        g.lib.add_child(g.leaf.id, SymbolChild::new(g.parent, "Loop")),
        Err(ProjectError::Check(CheckError::RecursivePlacement { .. }))
    ));
}

#[test]
fn stale_definitions_are_refreshed_before_instantiation() {
    let lib = SymbolLibrary::new(ProjectConfig::default());
    let symbol = lib.add_symbol(Symbol::new(SymbolId::new(), "Sink"), "user", false).unwrap();
    let input = SlotId::new();
    let descriptor = OperatorDescriptor::new(symbol.id(), "Sink@1").with_input(input, "Value", ValueType::INT);

    let report = lib.apply_compilation(registry([descriptor])).unwrap();
    assert_eq!(report.skipped, vec![symbol.id()]);
    assert!(symbol.input_definitions().is_empty());
    assert!(symbol.definitions_stale());

    let instance = lib.create_instance(symbol.id(), None).unwrap();
    assert!(!symbol.definitions_stale());
    assert_eq!(symbol.input_definitions()[0].id, input);
    let value = lib.instances().with(instance, |i| i.inputs[&input].value.clone()).unwrap();
    assert_eq!(value, Value::Int(0));
}

/// A sink symbol with one float input, placed once in a parent that feeds
/// it from the parent's own input. Neither symbol has instances.
fn sink_in_parent(lib: &SymbolLibrary) -> (SymbolId, InputDefinition, SymbolId, ChildId) {
    let sink = Symbol::new(SymbolId::new(), "Sink");
    let x = InputDefinition::new(SlotId::new(), "X", Value::Float(0.0));
    sink.lock().input_definitions = vec![x.clone()];
    let sink = lib.add_symbol(sink, "user", false).unwrap().id();

    let parent = Symbol::new(SymbolId::new(), "Parent");
    let p_in = InputDefinition::new(SlotId::new(), "In", Value::Float(1.0));
    parent.lock().input_definitions = vec![p_in.clone()];
    let parent = lib.add_symbol(parent, "user", false).unwrap().id();

    let child = SymbolChild::new(sink, "C");
    lib.add_child(parent, child.clone()).unwrap();
    lib.add_connection(parent, Connection::new(ChildId::NONE, p_in.id, child.id, x.id), 0)
        .unwrap();
    (sink, x, parent, child.id)
}

#[test]
fn refreshing_stale_definitions_prunes_dependents() {
    let lib = SymbolLibrary::new(ProjectConfig::default());
    let (sink, x, parent, _) = sink_in_parent(&lib);

    let v1 = OperatorDescriptor::new(sink, "Sink@1").with_input(x.id, "X", ValueType::FLOAT);
    lib.apply_compilation(registry([v1])).unwrap();
    let v2 = OperatorDescriptor::new(sink, "Sink@2");
    let report = lib.apply_compilation(registry([v2])).unwrap();
    assert_eq!(report.skipped, vec![sink]);
    assert_eq!(report.pruned_dependent_connections, 0);
    assert_eq!(lib.symbol(parent).unwrap().connections().len(), 1);
    lib.clear_modified();

    let root = lib.create_instance(parent, None).unwrap();

    assert!(lib.symbol(sink).unwrap().input_definitions().is_empty());
    assert!(lib.symbol(parent).unwrap().connections().is_empty());
    assert!(lib.is_modified(parent));
    assert_eq!(lib.instances().len(), 2);
    assert!(lib.instances().contains(root));
}

#[test]
fn replacing_contents_prunes_dependents() {
    let lib = SymbolLibrary::new(ProjectConfig::default());
    let (sink, _, parent, _) = sink_in_parent(&lib);
    let empty = lib
        .add_symbol(Symbol::new(SymbolId::new(), "Empty"), "user", false)
        .unwrap()
        .id();
    lib.clear_modified();

    lib.replace_symbol_contents(sink, empty).unwrap();

    assert!(lib.symbol(sink).unwrap().input_definitions().is_empty());
    assert!(lib.symbol(parent).unwrap().connections().is_empty());
    assert!(lib.is_modified(parent));
    assert!(lib.is_modified(sink));
}

// ---------------------------------------------------------------------------
// Connection editing
// ---------------------------------------------------------------------------

#[test]
fn cycles_are_refused() {
    let g = graph();
    let back_edge = Connection::new(g.b, g.leaf.output.id, g.a, g.leaf.input.id);
    assert!(g.lib.check_for_cycle(g.parent, &back_edge).unwrap());

    let err = g.lib.add_connection(g.parent, back_edge, 0).unwrap_err();
    assert!(matches!(err, ProjectError::Check(CheckError::CycleDetected { .. })));
    assert_eq!(g.lib.symbol(g.parent).unwrap().connections().len(), 3);
    assert!(!g.lib.is_modified(g.parent));
}

#[test]
fn connecting_a_single_input_replaces_its_connection() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();
    let b = g.lib.instances().child_of(root, g.b).unwrap();

    let old = Connection::new(g.a, g.leaf.output.id, g.b, g.leaf.input.id);
    let new = Connection::new(ChildId::NONE, g.p_in.id, g.b, g.leaf.input.id);
    g.lib.add_connection(g.parent, new, 0).unwrap();

    let connections = g.lib.symbol(g.parent).unwrap().connections();
    assert_eq!(connections.len(), 3);
    assert!(connections.contains(&new));
    assert!(!connections.contains(&old));
    assert_eq!(
        input_links(&g.lib, b, g.leaf.input.id),
        vec![InputLink {
            source_instance: root,
            source_slot_id: g.p_in.id
        }]
    );
    assert!(g.lib.is_modified(g.parent));
}

#[test]
fn multi_input_connections_follow_the_requested_index() {
    let lib = SymbolLibrary::new(ProjectConfig::default());
    let mixer = Leaf::add(&lib, "Mixer", true);
    let parent = Symbol::new(SymbolId::new(), "Parent");
    let inputs: Vec<InputDefinition> = ["X", "Y", "Z"]
        .into_iter()
        .map(|name| InputDefinition::new(SlotId::new(), name, Value::Float(0.0)))
        .collect();
    parent.lock().input_definitions = inputs.clone();
    let parent = lib.add_symbol(parent, "user", false).unwrap().id();
    let m = SymbolChild::new(mixer.id, "M");
    lib.add_child(parent, m.clone()).unwrap();
    let root = lib.create_instance(parent, None).unwrap();

    let con = |input: &InputDefinition| Connection::new(ChildId::NONE, input.id, m.id, mixer.input.id);
    let (x, y, z) = (con(&inputs[0]), con(&inputs[1]), con(&inputs[2]));
    lib.add_connection(parent, x, 0).unwrap();
    lib.add_connection(parent, y, 1).unwrap();
    lib.add_connection(parent, z, 1).unwrap();

    let m_instance = lib.instances().child_of(root, m.id).unwrap();
    let sources = |lib: &SymbolLibrary| -> Vec<SlotId> {
        input_links(lib, m_instance, mixer.input.id)
            .into_iter()
            .map(|l| l.source_slot_id)
            .collect()
    };
    assert_eq!(sources(&lib), vec![inputs[0].id, inputs[2].id, inputs[1].id]);

    lib.remove_connection(parent, &z, 1).unwrap();
    assert_eq!(sources(&lib), vec![inputs[0].id, inputs[1].id]);
    assert_eq!(lib.symbol(parent).unwrap().connections(), vec![x, y]);
}

#[test]
fn removing_a_child_disposes_its_instances() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();

    let removed = g.lib.remove_child(g.parent, g.a).unwrap();
    assert_eq!(removed.connections.len(), 2);
    assert_eq!(removed.orphaned_instances.len(), 1);
    assert_eq!(g.lib.instances().len(), 2);
    assert!(g.lib.instances().child_of(root, g.a).is_none());

    let b = g.lib.instances().child_of(root, g.b).unwrap();
    assert!(input_links(&g.lib, b, g.leaf.input.id).is_empty());
}

#[test]
fn symbols_in_use_cannot_be_removed() {
    let g = graph();
    g.lib.create_instance(g.parent, None).unwrap();
    assert_eq!(g.lib.collect_depending_symbols(g.leaf.id), vec![g.parent]);

    let err = g.lib.remove_symbol(g.leaf.id).unwrap_err();
    assert!(matches!(err, ProjectError::SymbolInUse { dependents: 1, .. }));

    g.lib.remove_child(g.parent, g.a).unwrap();
    g.lib.remove_child(g.parent, g.b).unwrap();
    g.lib.remove_symbol(g.leaf.id).unwrap();
    assert!(g.lib.symbol(g.leaf.id).is_none());
    assert_eq!(g.lib.instances().len(), 1);
}

#[test]
fn replacing_contents_instantiates_new_children() {
    let g = graph();
    let target = g
        .lib
        .add_symbol(Symbol::new(SymbolId::new(), "Copy"), "user", false)
        .unwrap();
    let root = g.lib.create_instance(target.id(), None).unwrap();

    let performed = g.lib.replace_symbol_contents(target.id(), g.parent).unwrap();
    assert!(!performed);
    assert_eq!(target.children().len(), 2);
    assert_eq!(target.connections().len(), 3);

    let a = g.lib.instances().child_of(root, g.a).unwrap();
    let b = g.lib.instances().child_of(root, g.b).unwrap();
    assert_eq!(
        input_links(&g.lib, b, g.leaf.input.id),
        vec![InputLink {
            source_instance: a,
            source_slot_id: g.leaf.output.id
        }]
    );
    assert!(g.lib.is_modified(target.id()));
}

// ---------------------------------------------------------------------------
// Compilation events
// ---------------------------------------------------------------------------

#[test]
fn removed_input_prunes_dependent_connections() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();

    let report = g
        .lib
        .apply_compilation(registry([g.leaf.descriptor_without_input()]))
        .unwrap();
    assert_eq!(report.changed_types, vec![g.leaf.id]);
    assert_eq!(report.updated, vec![g.leaf.id]);
    assert_eq!(report.removed_connections, 0);
    assert_eq!(report.pruned_dependent_connections, 2);
    assert_eq!(report.modified_dependents, vec![g.parent]);
    assert!(report.failed.is_empty());

    let connections = g.lib.symbol(g.parent).unwrap().connections();
    assert_eq!(
        connections,
        vec![Connection::new(g.b, g.leaf.output.id, ChildId::NONE, g.p_out.id)]
    );
    let a = g.lib.instances().child_of(root, g.a).unwrap();
    assert!(g.lib.instances().with(a, |i| i.inputs.is_empty()).unwrap());
    assert!(g.lib.is_modified(g.parent));
}

#[test]
fn dependent_handling_follows_config() {
    let config = ProjectConfig {
        parallel_updates: false,
        flag_dependents: false,
        prune_dependents: false,
    };
    let g = graph_with(config, false);

    let report = g
        .lib
        .apply_compilation(registry([g.leaf.descriptor_without_input()]))
        .unwrap();
    assert_eq!(report.updated, vec![g.leaf.id]);
    assert_eq!(report.pruned_dependent_connections, 0);
    assert!(report.modified_dependents.is_empty());
    assert_eq!(g.lib.symbol(g.parent).unwrap().connections().len(), 3);
    assert!(!g.lib.is_modified(g.parent));
}

#[test]
fn read_only_dependents_are_reported_not_flagged() {
    let g = graph_with(ProjectConfig::default(), true);

    let report = g
        .lib
        .apply_compilation(registry([g.leaf.descriptor_without_input()]))
        .unwrap();
    assert!(report.modified_dependents.is_empty());
    assert_eq!(report.read_only_dependents, vec![g.parent]);
    assert!(!g.lib.is_modified(g.parent));
}

#[test]
fn unchanged_compilation_updates_nothing() {
    let g = graph();
    let report = g.lib.apply_compilation(registry([g.leaf.descriptor()])).unwrap();
    assert!(report.updated.is_empty());
    assert!(report.new_types.is_empty());
    assert!(report.changed_types.is_empty());
    assert!(g.lib.modified_symbols().is_empty());
}

#[test]
fn unloaded_type_reloads_instances() {
    let g = graph();
    let root = g.lib.create_instance(g.parent, None).unwrap();
    let a = g.lib.instances().child_of(root, g.a).unwrap();
    let leaf = g.lib.symbol(g.leaf.id).unwrap();

    let report = g.lib.apply_compilation(OperatorRegistry::new()).unwrap();
    assert_eq!(report.removed_types, vec![g.leaf.id]);
    assert!(leaf.instance_type().is_none());
    assert_eq!(g.lib.instances().with(a, |i| i.needs_reload), Some(true));

    let report = g.lib.apply_compilation(registry([g.leaf.descriptor()])).unwrap();
    assert_eq!(report.new_types, vec![g.leaf.id]);
    assert_eq!(leaf.instance_type().unwrap().0, "Leaf@1");
    assert_eq!(g.lib.instances().with(a, |i| i.needs_reload), Some(false));
    assert_eq!(
        input_links(&g.lib, a, g.leaf.input.id),
        vec![InputLink {
            source_instance: root,
            source_slot_id: g.p_in.id
        }]
    );
}

#[test]
fn parallel_and_sequential_updates_agree() {
    let run = |parallel_updates: bool| {
        let lib = SymbolLibrary::new(ProjectConfig {
            parallel_updates,
            ..ProjectConfig::default()
        });
        let leaves: Vec<Leaf> = (0..16).map(|i| Leaf::add(&lib, &format!("Leaf{i}"), false)).collect();
        for leaf in &leaves {
            lib.create_instance(leaf.id, None).unwrap();
        }
        lib.apply_compilation(registry(leaves.iter().map(Leaf::descriptor))).unwrap();

        let report = lib
            .apply_compilation(registry(leaves.iter().map(Leaf::descriptor_without_input)))
            .unwrap();
        let mut ids: Vec<SymbolId> = leaves.iter().map(|l| l.id).collect();
        ids.sort();
        assert_eq!(report.updated, ids);
        assert_eq!(report.changed_types, ids);
        for leaf in &leaves {
            assert!(lib.symbol(leaf.id).unwrap().input_definitions().is_empty());
        }
        (report.updated.len(), report.failed.len())
    };

    assert_eq!(run(true), run(false));
}

#[test]
fn missing_operator_info_is_reported_as_failure() {
    let g = graph();
    let parent = g.lib.symbol(g.parent).unwrap();
    parent.set_needs_type_update(true);

    let report = g.lib.update_dirty_symbols();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].symbol, g.parent);
    assert!(report.has_failures());
    assert!(!parent.needs_type_update());
}
