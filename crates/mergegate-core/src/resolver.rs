// crates/mergegate-core/src/resolver.rs
// ============================================================================
// Module: Dependency Resolver
// Description: Deterministic Kahn-style levelization of the item graph.
// Purpose: Turn a plan's `deps` edges into ordered levels the scheduler can
//          release one at a time.
// Dependencies: crate::errors, crate::identifiers, crate::plan
// ============================================================================

//! ## Overview
//! Levelization assigns every item a level: level 0 holds items with no
//! deps, level N holds items whose deps are all satisfied by levels strictly
//! below N. Within a level, items are ordered lexicographically by name so
//! that two runs over the same plan always see the same schedule order, even
//! though the scheduler itself may complete work within a level out of
//! order. A plan whose graph cannot be fully leveled is a cycle.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::errors::ValidationError;
use crate::identifiers::ItemName;
use crate::plan::Plan;

/// Ordered levels of item names. `levels[0]` has no dependencies; each
/// subsequent level depends only on items in earlier levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Levels {
    levels: Vec<Vec<ItemName>>,
}

impl Levels {
    /// Returns the ordered levels.
    #[must_use]
    pub fn as_slice(&self) -> &[Vec<ItemName>] {
        &self.levels
    }

    /// Returns the total number of items across all levels.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Returns the level index an item belongs to, if present.
    #[must_use]
    pub fn level_of(&self, name: &ItemName) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(name))
    }
}

/// Computes a deterministic level assignment for every item in `plan`.
///
/// # Errors
///
/// Returns [`ValidationError::Cycle`] listing every item that could not be
/// assigned a level because it participates in (or depends on) a cycle.
pub fn levelize(plan: &Plan) -> Result<Levels, ValidationError> {
    let mut remaining_deps: BTreeMap<&str, BTreeSet<&str>> =
        plan.items.iter().map(|item| (item.name.as_str(), item.deps.iter().map(String::as_str).collect())).collect();

    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for item in &plan.items {
        for dep in &item.deps {
            dependents.entry(dep.as_str()).or_default().push(item.name.as_str());
        }
    }

    let name_by_str: BTreeMap<&str, &ItemName> = plan.items.iter().map(|item| (item.name.as_str(), &item.name)).collect();

    let mut levels: Vec<Vec<ItemName>> = Vec::new();

    loop {
        let mut ready: Vec<&str> =
            remaining_deps.iter().filter(|(_, deps)| deps.is_empty()).map(|(name, _)| *name).collect();
        ready.sort_unstable();

        if ready.is_empty() {
            break;
        }

        for name in &ready {
            remaining_deps.remove(name);
        }

        for name in &ready {
            if let Some(children) = dependents.get(name) {
                for child in children {
                    if let Some(child_deps) = remaining_deps.get_mut(child) {
                        child_deps.remove(name);
                    }
                }
            }
        }

        levels.push(ready.into_iter().map(|name| (*name_by_str[name]).clone()).collect());
    }

    if !remaining_deps.is_empty() {
        let mut members: Vec<ItemName> = remaining_deps.keys().map(|name| (*name_by_str[name]).clone()).collect();
        members.sort();
        return Err(ValidationError::Cycle { members });
    }

    Ok(Levels { levels })
}
