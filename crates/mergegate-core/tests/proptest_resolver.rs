// crates/mergegate-core/tests/proptest_resolver.rs
// ============================================================================
// Module: Dependency Resolver Property-Based Tests
// Description: Property tests for levelization correctness over random
//              acyclic graphs and for cycle detection over random graphs.
// Purpose: Detect panics and invariant violations across wide input ranges.
// ============================================================================

//! Property-based tests for dependency-resolver invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use mergegate_core::Plan;
use mergegate_core::ValidationError;
use mergegate_core::levelize;
use mergegate_core::load_plan;
use proptest::prelude::*;

const NAMES: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h"];

/// Builds a plan whose items are `NAMES[0..n]` and whose deps only point to
/// earlier names in the list, guaranteeing the graph is acyclic by
/// construction.
fn acyclic_plan(edges: &[Vec<bool>]) -> Plan {
    let items_json: Vec<String> = edges
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let deps: Vec<&str> = row.iter().enumerate().take(i).filter(|(_, &has_edge)| has_edge).map(|(j, _)| NAMES[j]).collect();
            let deps_json = serde_json::to_string(&deps).expect("deps serialize");
            format!(r#"{{"name":"{}","deps":{},"gates":[]}}"#, NAMES[i], deps_json)
        })
        .collect();
    let json = format!(r#"{{"schemaVersion":"1.0.0","target":"main","items":[{}]}}"#, items_json.join(","));
    load_plan(json.as_bytes()).expect("constructed plan must be structurally valid")
}

fn edge_matrix_strategy(n: usize) -> impl Strategy<Value = Vec<Vec<bool>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), n), n)
}

proptest! {
    #[test]
    fn levelization_respects_dependency_order(n in 1usize ..= NAMES.len(), seed_edges in edge_matrix_strategy(NAMES.len())) {
        let edges = seed_edges.into_iter().take(n).map(|row| row.into_iter().take(n).collect::<Vec<bool>>()).collect::<Vec<_>>();
        let plan = acyclic_plan(&edges);
        let levels = levelize(&plan).expect("acyclic-by-construction graph must levelize");

        prop_assert_eq!(levels.item_count(), n);

        for (i, row) in edges.iter().enumerate() {
            let item_name = mergegate_core::ItemName::new(NAMES[i]).expect("valid name");
            let item_level = levels.level_of(&item_name).expect("every item has a level");
            for (j, &has_edge) in row.iter().enumerate().take(i) {
                if has_edge {
                    let dep_name = mergegate_core::ItemName::new(NAMES[j]).expect("valid name");
                    let dep_level = levels.level_of(&dep_name).expect("every dep has a level");
                    prop_assert!(dep_level < item_level);
                }
            }
        }
    }

    #[test]
    fn levelization_is_independent_of_item_declaration_order(n in 2usize ..= NAMES.len(), seed_edges in edge_matrix_strategy(NAMES.len())) {
        let edges: Vec<Vec<bool>> = seed_edges.into_iter().take(n).map(|row| row.into_iter().take(n).collect()).collect();
        let forward = acyclic_plan(&edges);
        let forward_levels = levelize(&forward).expect("acyclic-by-construction graph must levelize");

        let mut reversed_items = forward.items.clone();
        reversed_items.reverse();
        let reversed_plan = Plan { items: reversed_items, ..forward.clone() };
        let reversed_levels = levelize(&reversed_plan).expect("reordering items must not affect acyclicity");

        for name_str in NAMES.iter().take(n) {
            let name = mergegate_core::ItemName::new(*name_str).expect("valid name");
            prop_assert_eq!(forward_levels.level_of(&name), reversed_levels.level_of(&name));
        }
    }

    #[test]
    fn a_mutual_back_edge_is_always_reported_as_a_cycle(n in 2usize ..= NAMES.len(), seed_edges in edge_matrix_strategy(NAMES.len())) {
        let edges: Vec<Vec<bool>> = seed_edges.into_iter().take(n).map(|row| row.into_iter().take(n).collect()).collect();
        let plan = acyclic_plan(&edges);

        let mut items = plan.items.clone();
        let last = n - 1;
        // Forcing a direct two-item cycle between the first and last item
        // guarantees a cycle exists no matter what the other random edges
        // happened to be.
        items[0].deps.insert(NAMES[last].to_string());
        items[last].deps.insert(NAMES[0].to_string());
        let cyclic_plan = Plan { items, ..plan };

        let result = levelize(&cyclic_plan);
        prop_assert!(matches!(result, Err(ValidationError::Cycle { .. })));
    }
}
