//! # In-Memory Storage
//!
//! [`MemoryStorage`] realizes the node storage contract over a process-local
//! map. It exists so the tree algorithm can be exercised without a file
//! behind it; it mirrors the persistent store's id discipline (stack of
//! reusable ids, high-water mark) but none of its framing.

use eyre::{ensure, Result};
use hashbrown::HashMap;

use crate::tree::Node;

use super::{NodeStorage, StorageError, ROOT_ID};

/// [`NodeStorage`] over an id-keyed map; the tree's test double.
#[derive(Debug, Clone)]
pub struct MemoryStorage<K, V> {
    nodes: HashMap<usize, Node<K, V>>,
    unused_ids: Vec<usize>,
    id_cap: usize,
    depth: usize,
}

impl<K: Clone, V: Clone> MemoryStorage<K, V> {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID, Node::empty_leaf(ROOT_ID));
        Self {
            nodes,
            unused_ids: Vec::new(),
            id_cap: 1,
            depth: 1,
        }
    }

    /// Number of nodes currently stored, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<K: Clone, V: Clone> Default for MemoryStorage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> NodeStorage<K, V> for MemoryStorage<K, V> {
    fn depth(&self) -> usize {
        self.depth
    }

    fn set_depth(&mut self, depth: usize) -> Result<()> {
        self.depth = depth;
        Ok(())
    }

    fn get(&mut self, id: usize) -> Result<Node<K, V>> {
        match self.nodes.get(&id) {
            Some(node) => Ok(node.clone()),
            None => Err(StorageError::MissingNode(id).into()),
        }
    }

    fn persist(&mut self, node: &Node<K, V>) -> Result<()> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn remove(&mut self, id: usize) -> Result<()> {
        ensure!(id != ROOT_ID, StorageError::RootRemoval);
        if self.nodes.remove(&id).is_none() {
            return Ok(());
        }
        if id + 1 == self.id_cap {
            self.id_cap -= 1;
        } else {
            self.unused_ids.push(id);
        }
        Ok(())
    }

    fn new_id(&mut self) -> Result<usize> {
        match self.unused_ids.pop() {
            Some(id) => Ok(id),
            None => {
                let id = self.id_cap;
                self.id_cap += 1;
                Ok(id)
            }
        }
    }
}
