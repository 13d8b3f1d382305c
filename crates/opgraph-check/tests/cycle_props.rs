use opgraph_check::{child_graph, connections_form_cycle};
use opgraph_core::{ChildId, Connection, SlotId};
use petgraph::algo::is_cyclic_directed;
use proptest::prelude::*;

fn link(from: ChildId, to: ChildId) -> Connection {
    Connection::new(from, SlotId::new(), to, SlotId::new())
}

proptest! {
    #[test]
    fn accepted_connections_keep_children_acyclic(
        child_count in 1..10usize,
        edges in proptest::collection::vec((0..10usize, 0..10usize), 0..40)
    ) {
        let children: Vec<ChildId> = (0..child_count).map(|_| ChildId::new()).collect();
        let mut connections = Vec::new();

        for (from, to) in edges {
            let candidate = link(children[from % child_count], children[to % child_count]);
            let mut with_candidate = connections.clone();
            with_candidate.push(candidate);
            let would_cycle = is_cyclic_directed(&child_graph(&with_candidate))
                || candidate.source_parent_or_child_id == candidate.target_parent_or_child_id;

            // The check agrees with a full cycle search on the extended graph.
            prop_assert_eq!(connections_form_cycle(&connections, &candidate), would_cycle);
            if !would_cycle {
                connections.push(candidate);
            }
        }

        prop_assert!(!is_cyclic_directed(&child_graph(&connections)));
    }

    #[test]
    fn boundary_candidates_are_always_accepted(
        child_count in 1..6usize,
        edges in proptest::collection::vec((0..6usize, 0..6usize), 0..20),
        pick in 0..6usize,
    ) {
        let children: Vec<ChildId> = (0..child_count).map(|_| ChildId::new()).collect();
        let connections: Vec<Connection> = edges
            .into_iter()
            .map(|(from, to)| link(children[from % child_count], children[to % child_count]))
            .collect();
        let child = children[pick % child_count];

        prop_assert!(!connections_form_cycle(&connections, &link(ChildId::NONE, child)));
        prop_assert!(!connections_form_cycle(&connections, &link(child, ChildId::NONE)));
    }
}
