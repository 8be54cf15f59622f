//! # eternal - A Persistent Ordered Map on a Single File
//!
//! `eternal` keeps an ordered key-value map on disk as a generic
//! (a,b)-tree: a balanced multiway search tree whose branching factor stays
//! between `a` and `b`. Callers pick the key and value types, the branching
//! bounds, and a storage back-end; the crate keeps every tree invariant
//! across inserts and deletes and frames every byte it writes through a
//! fixed-size binary codec.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::fs::File;
//! use eternal::{FileStorage, Serializer, Tree};
//!
//! let file = File::options()
//!     .read(true)
//!     .write(true)
//!     .create(true)
//!     .open("./map.eternal")?;
//! let storage = FileStorage::open(
//!     2,
//!     3,
//!     4096,
//!     file,
//!     Serializer::for_str(64)?,
//!     Serializer::<u64>::new()?,
//! )?;
//! let mut tree = Tree::new(2, 3, storage)?;
//!
//! tree.insert("answer".to_owned(), 42)?;
//! assert_eq!(tree.get(&"answer".to_owned())?, Some(42));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------+
//! |         Tree (a,b)-algorithm        |  search / insert / delete
//! +-------------------------------------+
//! |        NodeStorage contract         |  get / persist / remove / new id
//! +------------------+------------------+
//! |   FileStorage    |  MemoryStorage   |  slot file / test double
//! +------------------+------------------+
//! |       Fixed-size binary codec       |  blueprints, schema signature
//! +-------------------------------------+
//! ```
//!
//! ## File Layout
//!
//! One file per tree. Every node occupies a fixed-width, block-aligned
//! slot, so a node's address is a pure function of its id:
//!
//! ```text
//! map.eternal
//! ├── header            identifier, version, block size,
//! │                     schema signature, word bits, a, b
//! ├── depth             one machine word
//! ├── free-list head    one machine word, 0 = empty
//! └── slots             slot i at base + i * padded_node_size
//! ```
//!
//! Removed nodes are freed lazily into an intrusive free list threaded
//! through the vacated slots;
//! [`FileStorage::defragment`](storage::FileStorage::defragment) compacts
//! the file in place when fragmentation is worth reclaiming.
//!
//! ## Module Overview
//!
//! - [`codec`]: blueprint layouts, the [`Schematic`] description trait,
//!   schema signatures
//! - [`storage`]: the [`NodeStorage`] contract, the slot file, the
//!   in-memory double
//! - [`tree`]: the (a,b)-tree algorithm itself
//!
//! ## Scope
//!
//! The crate assumes exclusive, single-threaded access to its backing
//! file: no locking, no transactions, and no crash-recovery guarantees
//! beyond what the host file API provides. A crash mid-operation can leave
//! the file violating tree invariants; callers needing durability must
//! snapshot the file themselves.

pub mod codec;
pub mod storage;
pub mod tree;

pub use codec::{SchemaError, Schematic, Serializer};
pub use storage::{FileStorage, MemoryStorage, NodeStorage, StorageError};
pub use tree::{Node, Tree};
