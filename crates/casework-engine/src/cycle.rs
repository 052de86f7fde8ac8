//! Cycle detection over the task dependency graph.
//!
//! Pure functions over an edge snapshot; nothing here touches the store.
//! Edge types are ignored: optional edges take part in the walk exactly like
//! required ones, so the whole graph stays acyclic.
//!
//! The adjacency map is rebuilt from the snapshot on every call. Catalogs are
//! tens to low hundreds of templates, so O(V+E) per check is cheap.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use casework_types::{TaskDependency, TaskTemplate};

/// Node -> the nodes it depends on, with neighbors sorted so walks are
/// deterministic regardless of input order.
fn adjacency(edges: &[TaskDependency]) -> BTreeMap<&str, Vec<&str>> {
    let mut adj: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges {
        adj.entry(edge.task_id.as_str())
            .or_default()
            .push(edge.depends_on_task_id.as_str());
    }
    for targets in adj.values_mut() {
        targets.sort_unstable();
        targets.dedup();
    }
    adj
}

/// Find the path `from -> ... -> to` along existing edges, if any.
fn find_path<'a>(adj: &BTreeMap<&'a str, Vec<&'a str>>, from: &'a str, to: &str) -> Option<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut stack = vec![from];

    while let Some(node) = stack.pop() {
        if node == to {
            let mut path = vec![node.to_string()];
            let mut cursor = node;
            while let Some(&prev) = parent.get(cursor) {
                path.push(prev.to_string());
                cursor = prev;
            }
            path.reverse();
            return Some(path);
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(targets) = adj.get(node) {
            // Reverse so the smallest neighbor is explored first.
            for &next in targets.iter().rev() {
                if !visited.contains(next) {
                    parent.entry(next).or_insert(node);
                    stack.push(next);
                }
            }
        }
    }
    None
}

/// Decide whether adding `task_id -> depends_on_task_id` would close a cycle.
///
/// A cycle appears iff `depends_on_task_id` can already reach `task_id`.
/// Returns the full cycle `[depends_on, ..., task, depends_on]` when it would,
/// `None` when the edge is safe. A self edge is reported as `[task, task]`.
pub fn find_cycle(
    edges: &[TaskDependency],
    task_id: &str,
    depends_on_task_id: &str,
) -> Option<Vec<String>> {
    let adj = adjacency(edges);
    let mut path = find_path(&adj, depends_on_task_id, task_id)?;
    path.push(depends_on_task_id.to_string());
    Some(path)
}

/// True when `from` can reach `to` by following dependency edges.
pub fn reaches(edges: &[TaskDependency], from: &str, to: &str) -> bool {
    find_path(&adjacency(edges), from, to).is_some()
}

/// Order templates so every task comes after everything it depends on.
///
/// Kahn's algorithm; ties are broken by catalog order, then id. Edges that
/// mention unknown templates are ignored. On a cyclic graph returns `Err`
/// with the ids that could not be placed.
pub fn topological_order(
    templates: &[TaskTemplate],
    edges: &[TaskDependency],
) -> Result<Vec<String>, Vec<String>> {
    let known: HashMap<&str, &TaskTemplate> =
        templates.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut in_degree: HashMap<&str, usize> = known.keys().map(|id| (*id, 0)).collect();
    let mut unlocks: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for edge in edges {
        let (task, dep) = (edge.task_id.as_str(), edge.depends_on_task_id.as_str());
        if !known.contains_key(task) || !known.contains_key(dep) || !seen.insert((task, dep)) {
            continue;
        }
        *in_degree.entry(task).or_default() += 1;
        unlocks.entry(dep).or_default().push(task);
    }

    let key = |id: &str| {
        let t = known[id];
        Reverse((t.order, t.id.clone()))
    };

    let mut queue: BinaryHeap<Reverse<(i64, String)>> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| key(id))
        .collect();
    let mut ordered = Vec::with_capacity(known.len());

    while let Some(Reverse((_, id))) = queue.pop() {
        if let Some(next) = unlocks.get(id.as_str()) {
            for &task in next {
                if let Some(deg) = in_degree.get_mut(task) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(key(task));
                    }
                }
            }
        }
        ordered.push(id);
    }

    if ordered.len() == known.len() {
        Ok(ordered)
    } else {
        let placed: HashSet<&str> = ordered.iter().map(String::as_str).collect();
        let mut stuck: Vec<String> = known
            .keys()
            .filter(|id| !placed.contains(*id))
            .map(|id| id.to_string())
            .collect();
        stuck.sort();
        Err(stuck)
    }
}
