//! Insert and node splitting.

use eyre::Result;
use smallvec::SmallVec;

use crate::storage::{NodeStorage, ROOT_ID};

use super::{insert_child_before, Node, Tree};

impl<K: Ord, V, S: NodeStorage<K, V>> Tree<K, V, S> {
    /// Puts `value` under `key`, overwriting any previous value.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        // the path to the leaf is depth nodes, the last one stays in hand
        let mut path: SmallVec<[usize; 8]> =
            SmallVec::with_capacity(self.depth.saturating_sub(1));
        let mut node = self.storage.root()?;
        loop {
            match node.find(&key) {
                Ok(position) => {
                    // the entry count is unchanged, no rebalancing needed
                    node.entries[position] = (key, value);
                    return self.storage.persist(&node);
                }
                Err(position) => {
                    if node.is_leaf() {
                        // the leaf cannot be persisted yet, it may now
                        // exceed the b-1 bound
                        node.entries.insert(position, (key, value));
                        break;
                    }
                    path.push(node.id);
                    let child = node.children[position];
                    node = self.storage.get(child)?;
                }
            }
        }

        loop {
            if node.entries.len() < self.b {
                // either the leaf that took the entry or a parent that
                // took a separator; both fit and end the walk
                return self.storage.persist(&node);
            }
            match path.pop() {
                None => {
                    // the root itself overflowed: split it and grow a new
                    // root at id 0, re-homing the right half
                    let new_id = self.storage.new_id()?;
                    let (new_node, separator) = self.split(new_id, &mut node);
                    let reassigned_id = self.storage.new_id()?;
                    node.id = reassigned_id;

                    let mut new_root = Node::with_capacity(ROOT_ID, self.b);
                    new_root.entries.push(separator);
                    new_root.children.extend([new_node.id, node.id]);

                    self.storage.persist(&new_root)?;
                    self.storage.persist(&node)?;
                    self.storage.persist(&new_node)?;
                    return self.update_depth(self.depth + 1);
                }
                Some(parent_id) => {
                    let mut parent = self.storage.get(parent_id)?;
                    let new_id = self.storage.new_id()?;
                    let (new_node, separator) = self.split(new_id, &mut node);
                    insert_child_before(&mut parent.children, new_node.id, node.id)?;
                    parent.insert_entry(separator);

                    self.storage.persist(&node)?;
                    self.storage.persist(&new_node)?;
                    node = parent;
                }
            }
        }
    }

    /// Splits a full node around its middle entry. The left half moves to
    /// `new_id`, the right half keeps the node's identity, and the
    /// separator is handed up to the caller.
    fn split(&self, new_id: usize, node: &mut Node<K, V>) -> (Node<K, V>, (K, V)) {
        let mid = self.b / 2;
        let separator = node.entries.remove(mid);
        let right_entries = node.entries.split_off(mid);
        let left_entries = std::mem::replace(&mut node.entries, right_entries);
        let left_children = if node.is_leaf() {
            Vec::new()
        } else {
            let right_children = node.children.split_off(mid + 1);
            std::mem::replace(&mut node.children, right_children)
        };

        let new_node = Node {
            id: new_id,
            entries: left_entries,
            children: left_children,
        };
        (new_node, separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn filled_tree(keys: &[u64]) -> Tree<u64, u64, MemoryStorage<u64, u64>> {
        let mut tree = Tree::new(2, 3, MemoryStorage::new()).unwrap();
        for &key in keys {
            tree.insert(key, key * 10).unwrap();
        }
        tree
    }

    #[test]
    fn a_root_split_grows_the_tree() {
        let mut tree = filled_tree(&[1, 2]);
        assert_eq!(tree.depth(), 1);

        tree.insert(3, 30).unwrap();
        assert_eq!(tree.depth(), 2);

        let root = tree.storage_mut().root().unwrap();
        assert_eq!(root.entries(), [(2, 20)]);
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn the_root_keeps_id_zero_across_splits() {
        let mut tree = filled_tree(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.storage_mut().root().unwrap().id(), ROOT_ID);
        for key in 1..=7 {
            assert_eq!(tree.get(&key).unwrap(), Some(key * 10));
        }
    }

    #[test]
    fn split_halves_agree_on_the_leaf_flag() {
        let mut tree = filled_tree(&[1, 2, 3, 4, 5, 6, 7]);
        let root = tree.storage_mut().root().unwrap();
        let left = tree.storage_mut().get(root.children()[0]).unwrap();
        let right = tree.storage_mut().get(root.children()[1]).unwrap();
        assert!(!left.is_leaf());
        assert!(!right.is_leaf());
    }
}
