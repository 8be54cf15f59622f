//! # Node Storage
//!
//! The tree algorithm never touches bytes: it works against the
//! [`NodeStorage`] contract, a pool of identified nodes with explicit
//! lifecycle operations. Two realizations live here:
//!
//! - [`FileStorage`]: the persistent store, a single file with a
//!   codec-framed header, word-sized tree metadata, and a fixed-width,
//!   block-aligned slot per node, plus an in-place defragmentation pass.
//! - [`MemoryStorage`]: the same contract over an in-process map, used to
//!   exercise the tree in isolation from disk.
//!
//! ## Contract
//!
//! | Operation | Guarantee |
//! |-----------|-----------|
//! | `root` | node 0 exists from initialization onward |
//! | `depth` / `set_depth` | starts at 1 for an empty tree |
//! | `get(id)` | returns the node or `StorageError::MissingNode` |
//! | `persist(node)` | a successful persist is visible to a later `get` |
//! | `remove(id)` | frees the id for reuse; the root cannot be removed; freeing a free slot is a no-op |
//! | `new_id()` | never returns an id currently in use, nor the same id twice without an intervening `remove` |
//!
//! No ordering stronger than "persist happens before the get that follows
//! it" is promised. Storages are exclusively owned: one instance, one
//! caller, no interior synchronization.
//!
//! ## Errors
//!
//! Operational failures carry [`eyre`] context; the conditions a caller may
//! need to distinguish programmatically are typed in [`StorageError`] and
//! can be recovered with `Report::downcast_ref`.

mod defrag;
mod file;
mod memory;

use thiserror::Error;

use crate::tree::Node;
use eyre::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Id of the root node; fixed for the lifetime of a storage.
pub const ROOT_ID: usize = 0;

/// Conditions callers can match on, raised through [`eyre::Report`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("node {0} not found")]
    MissingNode(usize),
    #[error("the root node cannot be removed")]
    RootRemoval,
    #[error("node {0} should be free but isn't")]
    NotFree(usize),
    #[error("file is not an eternal data file")]
    Identifier,
    #[error("data file has version {found}, current version is {current}")]
    Version { found: i16, current: i16 },
    #[error("schema signature of the data file differs from the configured codec")]
    Signature,
    #[error("data file was created for a ({file_a},{file_b})-tree, not a ({a},{b})-tree")]
    Bounds {
        file_a: u64,
        file_b: u64,
        a: u64,
        b: u64,
    },
    #[error("data file was created with {file}-bit words, this system uses {host}-bit words")]
    WordSize { file: u8, host: u8 },
    #[error("data file was created with block size {file}, block size {requested} was requested")]
    BlockSize { file: i64, requested: i64 },
}

/// True when `err` is the typed [`StorageError::MissingNode`] condition.
pub(crate) fn is_missing_node(err: &eyre::Report) -> bool {
    matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::MissingNode(_))
    )
}

/// A pool of identified nodes the tree operates on.
pub trait NodeStorage<K, V> {
    /// The node with [`ROOT_ID`]; valid as soon as the storage exists.
    fn root(&mut self) -> Result<Node<K, V>> {
        self.get(ROOT_ID)
    }

    fn depth(&self) -> usize;

    fn set_depth(&mut self, depth: usize) -> Result<()>;

    fn get(&mut self, id: usize) -> Result<Node<K, V>>;

    fn persist(&mut self, node: &Node<K, V>) -> Result<()>;

    fn remove(&mut self, id: usize) -> Result<()>;

    fn new_id(&mut self) -> Result<usize>;
}
