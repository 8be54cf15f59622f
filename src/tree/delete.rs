//! Delete, predecessor replacement, and borrow/merge rebalancing.

use eyre::{eyre, Result};
use smallvec::SmallVec;

use crate::storage::NodeStorage;

use super::{Node, Tree};

/// One descent step: the visited node and its child position in the parent.
#[derive(Debug, Clone, Copy)]
struct Step {
    node: usize,
    position_in_parent: usize,
}

type Path = SmallVec<[Step; 8]>;

impl<K: Ord, V, S: NodeStorage<K, V>> Tree<K, V, S> {
    /// Removes `key`; absent keys are left alone without error.
    pub fn delete(&mut self, key: &K) -> Result<()> {
        let mut path = Path::with_capacity(self.depth);
        let mut node = self.storage.root()?;
        let mut position_in_parent = 0;
        loop {
            path.push(Step {
                node: node.id,
                position_in_parent,
            });
            match node.find(key) {
                Ok(position) => {
                    if node.is_leaf() {
                        node.entries.remove(position);
                        self.storage.persist(&node)?;
                    } else {
                        // an interior entry is replaced by its in-order
                        // predecessor, which always sits in a leaf; the
                        // descent to it continues the same path so
                        // rebalancing starts at that leaf
                        let left_child = node.children[position];
                        let replacement =
                            self.pop_largest(&mut path, left_child, position)?;
                        node.entries[position] = replacement;
                        self.storage.persist(&node)?;
                    }
                    break;
                }
                Err(position) => {
                    if node.is_leaf() {
                        // key is not in the tree
                        return Ok(());
                    }
                    position_in_parent = position;
                    let child = node.children[position];
                    node = self.storage.get(child)?;
                }
            }
        }

        self.rebalance(path)
    }

    /// Descends to the rightmost leaf under `node_id`, pops its last
    /// entry, and records every visited node on the path.
    fn pop_largest(
        &mut self,
        path: &mut Path,
        mut node_id: usize,
        mut position_in_parent: usize,
    ) -> Result<(K, V)> {
        loop {
            let mut node = self.storage.get(node_id)?;
            path.push(Step {
                node: node.id,
                position_in_parent,
            });
            if node.is_leaf() {
                let entry = node
                    .entries
                    .pop()
                    .ok_or_else(|| eyre!("leaf {} holds no entries", node.id))?;
                self.storage.persist(&node)?;
                return Ok(entry);
            }
            position_in_parent = node.children.len() - 1;
            node_id = node.children[position_in_parent];
        }
    }

    /// Walks the recorded path upward, fixing every node that dropped
    /// below a-1 entries by borrowing from or merging with a sibling.
    fn rebalance(&mut self, mut path: Path) -> Result<()> {
        if path.len() <= 1 {
            // a tree of just the root has no bounds to restore
            return Ok(());
        }
        let mut step = match path.pop() {
            Some(step) => step,
            None => return Ok(()),
        };
        let mut node = self.storage.get(step.node)?;
        loop {
            if node.entries.len() + 1 >= self.a {
                // the node meets its bound again, nothing above can be
                // short
                return Ok(());
            }

            let parent_step = match path.pop() {
                Some(step) => step,
                None => return Ok(()),
            };
            let mut parent = self.storage.get(parent_step.node)?;
            let parent_is_root = path.is_empty();

            if step.position_in_parent == 0 {
                // leftmost child, the only sibling is on the right
                let sibling_id = parent.children[1];
                let mut sibling = self.storage.get(sibling_id)?;
                if sibling.entries.len() >= self.a {
                    // rotate the sibling's first entry through the parent;
                    // the separator sits at the left child's position
                    let from_sibling = sibling.entries.remove(0);
                    let from_parent = std::mem::replace(
                        &mut parent.entries[step.position_in_parent],
                        from_sibling,
                    );
                    node.entries.push(from_parent);
                    if !node.is_leaf() {
                        let child = sibling.children.remove(0);
                        node.children.push(child);
                    }
                    self.storage.persist(&sibling)?;
                    self.storage.persist(&parent)?;
                    self.storage.persist(&node)?;
                } else {
                    self.merge(
                        step.position_in_parent,
                        node,
                        sibling,
                        &mut parent,
                        parent_is_root,
                    )?;
                }
            } else {
                let position = step.position_in_parent - 1;
                let sibling_id = parent.children[position];
                let mut sibling = self.storage.get(sibling_id)?;
                if sibling.entries.len() >= self.a {
                    let last = sibling.entries.len() - 1;
                    let from_sibling = sibling.entries.remove(last);
                    let from_parent =
                        std::mem::replace(&mut parent.entries[position], from_sibling);
                    node.entries.insert(0, from_parent);
                    if !node.is_leaf() {
                        let last = sibling.children.len() - 1;
                        let child = sibling.children.remove(last);
                        node.children.insert(0, child);
                    }
                    self.storage.persist(&sibling)?;
                    self.storage.persist(&parent)?;
                    self.storage.persist(&node)?;
                } else {
                    self.merge(position, sibling, node, &mut parent, parent_is_root)?;
                }
            }

            node = parent;
            step = parent_step;
            if parent_is_root {
                // the root may hold fewer than a-1 entries, and merging
                // into it was already handled
                return Ok(());
            }
        }
    }

    /// Fuses `right` and the separating parent entry into `left`, freeing
    /// `right`'s id. A root emptied by the merge hands its id to the fused
    /// node and the tree loses one level.
    fn merge(
        &mut self,
        separator_position: usize,
        mut left: Node<K, V>,
        right: Node<K, V>,
        parent: &mut Node<K, V>,
        parent_is_root: bool,
    ) -> Result<()> {
        parent.children.remove(separator_position + 1);
        let separator = parent.entries.remove(separator_position);
        let right_id = right.id;
        left.entries.push(separator);
        left.entries.extend(right.entries);
        left.children.extend(right.children);

        if parent_is_root && parent.entries.is_empty() {
            self.storage.remove(left.id)?;
            left.id = parent.id;
            self.update_depth(self.depth - 1)?;
        } else {
            self.storage.persist(parent)?;
        }
        self.storage.remove(right_id)?;
        self.storage.persist(&left)
    }
}
