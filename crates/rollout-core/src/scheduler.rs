//! Phase scheduling
//!
//! Turns a dependency map into execution phases with Kahn's algorithm. Each
//! phase holds every node whose prerequisites all live in earlier phases,
//! sorted so the same input always yields the same plan.

use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use tracing::debug;

/// Sort `dependencies` (node -> prerequisites) into phases
///
/// Every prerequisite must itself be a key of the map. A cycle fails the
/// whole sort; no partial plan is returned.
pub fn topological_sort<K>(dependencies: &HashMap<K, Vec<K>>) -> Result<Vec<Vec<K>>>
where
    K: Clone + Ord + Hash + Display,
{
    let mut in_degree: HashMap<&K, usize> = dependencies.keys().map(|node| (node, 0)).collect();
    let mut dependents: HashMap<&K, Vec<&K>> = HashMap::new();

    for (node, prerequisites) in dependencies {
        for prerequisite in prerequisites {
            if !in_degree.contains_key(prerequisite) {
                return Err(Error::DanglingDependency {
                    dependency: prerequisite.to_string(),
                    node: node.to_string(),
                });
            }
            *in_degree.entry(node).or_default() += 1;
            dependents.entry(prerequisite).or_default().push(node);
        }
    }

    let mut queue: VecDeque<&K> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut phases = Vec::new();
    let mut emitted = 0;

    while !queue.is_empty() {
        let mut level = Vec::with_capacity(queue.len());
        for _ in 0..queue.len() {
            let Some(node) = queue.pop_front() else {
                break;
            };
            level.push(node.clone());

            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        level.sort();
        emitted += level.len();
        phases.push(level);
    }

    if emitted != dependencies.len() {
        return Err(Error::Cycle);
    }

    debug!("Sorted {} nodes into {} phases", emitted, phases.len());
    Ok(phases)
}
