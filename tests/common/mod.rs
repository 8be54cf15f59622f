//! Shared structural auditing for the end-to-end tree scenarios.

// not every test crate uses every helper
#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt::Debug;

use eternal::NodeStorage;

/// Full structural audit of the stored tree: uniform leaf depth, entry
/// bounds, per-node ordering, and cross-subtree key ordering. Returns the
/// number of nodes and the number of entries reachable from the root.
pub fn audit_tree<K, V, S>(storage: &mut S, a: usize, b: usize) -> (usize, usize)
where
    K: Ord + Clone + Debug,
    S: NodeStorage<K, V>,
{
    let depth = storage.depth();
    let root = storage.root().expect("root must exist");
    let mut visited = HashSet::new();
    let mut entries = 0;
    audit_node(
        storage,
        root.id(),
        1,
        depth,
        a,
        b,
        None,
        None,
        &mut visited,
        &mut entries,
    );
    (visited.len(), entries)
}

#[allow(clippy::too_many_arguments)]
fn audit_node<K, V, S>(
    storage: &mut S,
    id: usize,
    level: usize,
    depth: usize,
    a: usize,
    b: usize,
    min: Option<K>,
    max: Option<K>,
    visited: &mut HashSet<usize>,
    entries: &mut usize,
) where
    K: Ord + Clone + Debug,
    S: NodeStorage<K, V>,
{
    assert!(visited.insert(id), "node {id} visited twice");
    let node = storage
        .get(id)
        .unwrap_or_else(|err| panic!("could not fetch node {id}: {err}"));
    *entries += node.entries().len();

    if node.is_leaf() {
        assert_eq!(level, depth, "leaf {id} sits at depth {level}, not {depth}");
    } else {
        assert_eq!(
            node.children().len(),
            node.entries().len() + 1,
            "node {id} must have one more child than entries"
        );
    }
    assert!(
        node.entries().len() <= b - 1,
        "node {id} holds more than b-1 entries"
    );
    if id != 0 {
        assert!(
            node.entries().len() >= a - 1,
            "node {id} holds fewer than a-1 entries"
        );
    }

    let keys: Vec<&K> = node.entries().iter().map(|entry| &entry.0).collect();
    assert!(
        keys.windows(2).all(|pair| pair[0] < pair[1]),
        "node {id} keys are not strictly sorted"
    );
    if let Some(min) = &min {
        assert!(
            keys.iter().all(|key| *key > min),
            "node {id} violates its lower bound {min:?}"
        );
    }
    if let Some(max) = &max {
        assert!(
            keys.iter().all(|key| *key < max),
            "node {id} violates its upper bound {max:?}"
        );
    }

    let children: Vec<usize> = node.children().to_vec();
    let bounds: Vec<K> = node.entries().iter().map(|entry| entry.0.clone()).collect();
    for (i, child) in children.iter().enumerate() {
        let child_min = if i == 0 {
            min.clone()
        } else {
            Some(bounds[i - 1].clone())
        };
        let child_max = if i == children.len() - 1 {
            max.clone()
        } else {
            Some(bounds[i].clone())
        };
        audit_node(
            storage, *child, level + 1, depth, a, b, child_min, child_max, visited, entries,
        );
    }
}

/// Keys reachable from the root, in tree order.
pub fn collect_keys<K, V, S>(storage: &mut S) -> Vec<K>
where
    K: Ord + Clone + Debug,
    S: NodeStorage<K, V>,
{
    let root = storage.root().expect("root must exist");
    let mut keys = Vec::new();
    collect_node(storage, root.id(), &mut keys);
    keys
}

fn collect_node<K, V, S>(storage: &mut S, id: usize, keys: &mut Vec<K>)
where
    K: Ord + Clone + Debug,
    S: NodeStorage<K, V>,
{
    let node = storage.get(id).expect("reachable node must load");
    let children: Vec<usize> = node.children().to_vec();
    let own: Vec<K> = node.entries().iter().map(|entry| entry.0.clone()).collect();
    if children.is_empty() {
        keys.extend(own);
        return;
    }
    for (i, child) in children.iter().enumerate() {
        collect_node(storage, *child, keys);
        if i < own.len() {
            keys.push(own[i].clone());
        }
    }
}
