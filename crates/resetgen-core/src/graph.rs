use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{ForeignKeyEdge, TableRef};

/// Deletion order for a set of clean tables.
///
/// `order` lists tables children-first. `circular` holds tables that sit on,
/// or hang below, a foreign-key cycle; they are cleared with constraints
/// suspended. Together they cover the clean set exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeletionPlan {
    pub order: Vec<TableRef>,
    pub circular: Vec<TableRef>,
}

impl DeletionPlan {
    /// Every planned table: circular bucket first, then the ordered tables.
    pub fn all_tables(&self) -> impl Iterator<Item = &TableRef> {
        self.circular.iter().chain(self.order.iter())
    }
}

/// Build a deterministic deletion plan for `clean` tables.
///
/// Only edges whose endpoints are both clean count; self references are
/// ignored. Ties are broken by `TableRef` ordering so the output is stable.
pub fn build_deletion_plan(clean: &BTreeSet<TableRef>, edges: &[ForeignKeyEdge]) -> DeletionPlan {
    let (parents, children) = build_adjacency(clean, edges);

    let mut indegree: BTreeMap<&TableRef, usize> = parents
        .iter()
        .map(|(table, targets)| (*table, targets.len()))
        .collect();

    let mut ready: BTreeSet<&TableRef> = indegree
        .iter()
        .filter_map(|(table, count)| if *count == 0 { Some(*table) } else { None })
        .collect();

    // Parents resolve before their children here; reversed at the end.
    let mut resolved: Vec<TableRef> = Vec::with_capacity(clean.len());

    while let Some(table) = ready.pop_last() {
        resolved.push(table.clone());

        if let Some(dependents) = children.get(table) {
            for dependent in dependents {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
    }

    let emitted: BTreeSet<&TableRef> = resolved.iter().collect();
    let circular: Vec<TableRef> = clean
        .iter()
        .filter(|table| !emitted.contains(table))
        .cloned()
        .collect();

    resolved.reverse();

    DeletionPlan {
        order: resolved,
        circular,
    }
}

type Adjacency<'a> = BTreeMap<&'a TableRef, BTreeSet<&'a TableRef>>;

/// Returns `(child -> parents, parent -> children)` restricted to `clean`.
fn build_adjacency<'a>(
    clean: &'a BTreeSet<TableRef>,
    edges: &'a [ForeignKeyEdge],
) -> (Adjacency<'a>, Adjacency<'a>) {
    let mut parents: Adjacency<'a> = clean.iter().map(|table| (table, BTreeSet::new())).collect();
    let mut children: Adjacency<'a> = BTreeMap::new();

    for edge in edges {
        if edge.is_self_reference() {
            continue;
        }
        let (Some(parent), Some(child)) = (clean.get(&edge.parent), clean.get(&edge.child)) else {
            continue;
        };

        parents.entry(child).or_default().insert(parent);
        children.entry(parent).or_default().insert(child);
    }

    (parents, children)
}
