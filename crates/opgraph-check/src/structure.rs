//! Read-only queries over the symbol and instance hierarchy.

use std::collections::HashSet;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use opgraph_core::{InstanceArena, InstanceId, Symbol, SymbolId};

/// Containment graph: an edge `P -> C` for every placement of `C` in `P`.
pub fn containment_graph<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> DiGraphMap<SymbolId, ()> {
    let mut graph = DiGraphMap::new();
    for symbol in symbols {
        let parent = symbol.id();
        graph.add_node(parent);
        let state = symbol.lock();
        for child in state.children.values() {
            graph.add_edge(parent, child.symbol_id, ());
        }
    }
    graph
}

/// Every symbol with at least one child placement of `symbol_id`.
///
/// The result is sorted and free of duplicates.
pub fn collect_depending_symbols<'a>(
    symbol_id: SymbolId,
    symbols: impl IntoIterator<Item = &'a Symbol>,
) -> Vec<SymbolId> {
    let graph = containment_graph(symbols);
    dependents_in(&graph, symbol_id)
}

/// Direct dependents of `symbol_id` in an already built containment graph.
pub fn dependents_in(graph: &DiGraphMap<SymbolId, ()>, symbol_id: SymbolId) -> Vec<SymbolId> {
    if !graph.contains_node(symbol_id) {
        return Vec::new();
    }
    let mut dependents: Vec<SymbolId> = graph
        .neighbors_directed(symbol_id, Direction::Incoming)
        .filter(|&parent| parent != symbol_id)
        .collect();
    dependents.sort();
    dependents.dedup();
    dependents
}

/// Returns `true` if placing `child` inside `parent` would make `parent`
/// contain itself, directly or through nested placements.
pub fn would_create_recursive_placement(
    graph: &DiGraphMap<SymbolId, ()>,
    parent: SymbolId,
    child: SymbolId,
) -> bool {
    if parent == child {
        return true;
    }
    graph.contains_node(parent)
        && graph.contains_node(child)
        && has_path_connecting(graph, child, parent, None)
}

/// The chain of ancestors of `instance`, root first. The instance itself is
/// not included.
pub fn collect_parent_instances(arena: &InstanceArena, instance: InstanceId) -> Vec<InstanceId> {
    let mut parents = Vec::new();
    let mut seen = HashSet::from([instance]);
    let mut current = arena.with(instance, |i| i.parent).flatten();
    while let Some(parent) = current {
        if !seen.insert(parent) {
            break;
        }
        parents.push(parent);
        current = arena.with(parent, |i| i.parent).flatten();
    }
    parents.reverse();
    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgraph_core::{ChildId, Instance, SymbolChild, ValueFactories};

    fn place(parent: &Symbol, child: &Symbol) {
        parent.add_child(SymbolChild::new(child.id(), child.name()));
    }

    #[test]
    fn depending_symbols_are_direct_parents_only() {
        let leaf = Symbol::new(SymbolId::new(), "Leaf");
        let mid = Symbol::new(SymbolId::new(), "Mid");
        let top = Symbol::new(SymbolId::new(), "Top");
        place(&mid, &leaf);
        place(&mid, &leaf);
        place(&top, &mid);

        let symbols = [&leaf, &mid, &top];
        assert_eq!(collect_depending_symbols(leaf.id(), symbols), vec![mid.id()]);
        assert_eq!(collect_depending_symbols(mid.id(), symbols), vec![top.id()]);
        assert!(collect_depending_symbols(top.id(), symbols).is_empty());
        assert!(collect_depending_symbols(SymbolId::new(), symbols).is_empty());
    }

    #[test]
    fn recursive_placement_detection() {
        let leaf = Symbol::new(SymbolId::new(), "Leaf");
        let mid = Symbol::new(SymbolId::new(), "Mid");
        let top = Symbol::new(SymbolId::new(), "Top");
        place(&mid, &leaf);
        place(&top, &mid);
        let graph = containment_graph([&leaf, &mid, &top]);

        assert!(would_create_recursive_placement(&graph, leaf.id(), top.id()));
        assert!(would_create_recursive_placement(&graph, mid.id(), mid.id()));
        assert!(!would_create_recursive_placement(&graph, top.id(), leaf.id()));
        assert!(!would_create_recursive_placement(&graph, top.id(), SymbolId::new()));
    }

    #[test]
    fn parent_chain_is_root_first() {
        let arena = InstanceArena::new();
        let factories = ValueFactories::new();
        let mut parent = None;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = arena.allocate_id();
            arena.insert(Instance::new(id, SymbolId::new(), ChildId::new(), parent, &[], &[], &factories));
            ids.push(id);
            parent = Some(id);
        }

        assert_eq!(collect_parent_instances(&arena, ids[2]), vec![ids[0], ids[1]]);
        assert!(collect_parent_instances(&arena, ids[0]).is_empty());
    }
}
