//! Cycle detection among the children of a symbol.
//!
//! Only child-to-child connections can close a loop. Connections from the
//! symbol's inputs or into its outputs are edges to the boundary, which sits
//! outside the evaluation order of the children.

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use opgraph_core::{ChildId, Connection, Symbol};

/// Builds the child-level dependency graph of a connection list.
pub fn child_graph(connections: &[Connection]) -> DiGraphMap<ChildId, ()> {
    let mut graph = DiGraphMap::new();
    for con in connections {
        if con.is_connected_to_symbol_input() || con.is_connected_to_symbol_output() {
            continue;
        }
        graph.add_edge(con.source_parent_or_child_id, con.target_parent_or_child_id, ());
    }
    graph
}

/// Returns `true` if adding `candidate` to `connections` would create a
/// directed cycle among children.
pub fn connections_form_cycle(connections: &[Connection], candidate: &Connection) -> bool {
    if candidate.is_connected_to_symbol_input() || candidate.is_connected_to_symbol_output() {
        return false;
    }
    let from = candidate.source_parent_or_child_id;
    let to = candidate.target_parent_or_child_id;
    if from == to {
        return true;
    }

    let mut graph = child_graph(connections);
    graph.add_node(from);
    graph.add_node(to);
    has_path_connecting(&graph, to, from, None)
}

/// Returns `true` if adding `candidate` to `symbol` would create a cycle.
///
/// Takes the symbol's creation lock for the duration of the check.
pub fn check_for_cycle(symbol: &Symbol, candidate: &Connection) -> bool {
    let state = symbol.lock();
    connections_form_cycle(&state.connections, candidate)
}
