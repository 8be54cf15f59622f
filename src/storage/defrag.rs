//! # In-Place Defragmentation
//!
//! Lazy deletion leaves free slots scattered through the file. This pass
//! compacts the slot array so live nodes occupy a dense prefix, then resets
//! the free list and truncates the file. Node ids change (never the
//! root's); every rewritten child pointer is persisted in its parent.
//!
//! ## Algorithm
//!
//! One forward sweep over slot ids, with a cursor over runs of free slots:
//!
//! 1. Nothing to do when the free list is empty, or when the file holds
//!    only the root.
//! 2. Find the leftmost free slot and the run of free slots it starts.
//! 3. Visit slots from the root upward, reading only the flag and the
//!    child ids (values are skipped). The first slot that reads as free
//!    ends the sweep: slots below it are dense, and no live node above it
//!    can still be referenced once its parents have been visited.
//! 4. Every child pointer beyond the cursor has its whole slot copied down
//!    into the cursor position, the source slot marked free, and the
//!    pointer rewritten in the visiting parent; the cursor then advances
//!    to the next free slot.
//! 5. Reset the free-list head and truncate the file after the last live
//!    slot.
//!
//! Must not run concurrently with tree operations: it assumes the same
//! exclusive ownership as every other storage call, and ids are reassigned
//! under the caller's feet.

use std::io::{Read, Seek, SeekFrom, Write};

use eyre::{bail, eyre, Result, WrapErr};
use tracing::debug;

use crate::codec::Schematic;

use super::file::FileStorage;
use super::{is_missing_node, StorageError, ROOT_ID};

/// Run of consecutive free slots, `lo..=hi`.
#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    lo: usize,
    hi: usize,
}

impl<K: Schematic, V: Schematic> FileStorage<K, V> {
    /// Compacts the file in place. Callers must guarantee no tree
    /// operation is in flight; node ids other than the root's may change.
    pub fn defragment(&mut self) -> Result<()> {
        if self.free_head() == 0 {
            // an empty free list means no slot below the end of file is
            // unoccupied
            return Ok(());
        }
        let end = self.file_mut().seek(SeekFrom::End(0))?;
        let last_id = ((end - self.base_address()) / self.padded_node_size()) as usize - 1;
        if last_id == 0 {
            // only the root is stored
            return Ok(());
        }

        // slot 0 is the root and can never be free
        let mut block = match self.find_free_block(1, last_id)? {
            Some(block) => block,
            None => bail!("there should be at least one free block"),
        };
        let mut first_empty = None;
        let mut moved = 0usize;

        for id in ROOT_ID..=last_id {
            let mut children = match self.read_children(id) {
                Ok(children) => children,
                Err(err) if is_missing_node(&err) => {
                    // parents are visited before the sweep reaches their
                    // children's old slots, so a free slot here means no
                    // live node remains at this id or beyond
                    first_empty = Some(id);
                    break;
                }
                Err(err) => return Err(err),
            };

            let mut dirty = false;
            let relocated = self.relocate_children(&mut children, &mut block, last_id, &mut dirty);
            if dirty {
                // rewritten pointers must reach the disk even when the
                // sweep is aborting
                moved += 1;
                match (relocated, self.persist_children(id, &children)) {
                    (Ok(()), Ok(())) => {}
                    (Ok(()), Err(err)) => return Err(err),
                    (Err(err), Ok(())) => return Err(err),
                    (Err(err), Err(persist_err)) => {
                        return Err(err.wrap_err(format!(
                            "could not re-persist children of node {id}: {persist_err}"
                        )))
                    }
                }
            } else {
                relocated?;
            }
        }

        let first_empty =
            first_empty.ok_or_else(|| eyre!("no free slot remained after compaction"))?;
        self.reset_free_head()?;
        let new_len = self.offset(first_empty);
        self.file_mut()
            .set_len(new_len)
            .wrap_err("could not truncate defragmented file")?;
        debug!(parents = moved, size = new_len, "defragmented data file");
        Ok(())
    }

    /// Moves every child pointed to from beyond the free-block cursor down
    /// into it, rewriting the pointers in place. `dirty` reports whether
    /// any pointer changed, including on the error path, so the caller can
    /// re-persist what was already rewritten.
    fn relocate_children(
        &mut self,
        children: &mut [usize],
        block: &mut FreeBlock,
        last_id: usize,
        dirty: &mut bool,
    ) -> Result<()> {
        for child in children.iter_mut() {
            // only nodes behind the cursor move, anything before it is
            // already in the dense prefix
            if *child <= block.lo {
                continue;
            }
            self.move_slot(*child, block.lo)?;
            *child = block.lo;
            *dirty = true;

            block.lo += 1;
            if block.lo > block.hi {
                *block = match self.find_free_block(block.hi + 1, last_id)? {
                    Some(next) => next,
                    None => bail!("there should be at least one free block"),
                };
            }
        }
        Ok(())
    }

    /// Copies the slot at `from` over the free slot at `to` and marks the
    /// source free. Only the framed node bytes move; padding is left as is.
    fn move_slot(&mut self, from: usize, to: usize) -> Result<()> {
        let mut slot = vec![0; self.node_size() as usize];
        let from_offset = self.offset(from);
        let to_offset = self.offset(to);

        self.file_mut().seek(SeekFrom::Start(from_offset))?;
        self.file_mut()
            .read_exact(&mut slot)
            .wrap_err_with(|| format!("could not read node {from} for relocation"))?;
        self.file_mut().seek(SeekFrom::Start(to_offset))?;
        self.file_mut()
            .write_all(&slot)
            .wrap_err_with(|| format!("could not relocate node {from} to {to}"))?;

        // the vacated slot must read as free for the rest of the sweep
        self.file_mut().seek(SeekFrom::Start(from_offset))?;
        self.file_mut().write_all(&[0])?;
        Ok(())
    }

    /// Reads a node's child ids, skipping its values. Fails with
    /// [`StorageError::MissingNode`] on a free slot.
    fn read_children(&mut self, id: usize) -> Result<Vec<usize>> {
        let offset = self.offset(id);
        self.file_mut().seek(SeekFrom::Start(offset))?;
        let mut flag = [0u8; 1];
        self.file_mut().read_exact(&mut flag)?;
        eyre::ensure!(flag[0] != 0, StorageError::MissingNode(id));

        let values_size = self.values_size();
        self.file_mut().seek(SeekFrom::Current(values_size as i64))?;
        let mut buf = vec![0; self.children_size() as usize];
        self.file_mut().read_exact(&mut buf)?;
        Ok(self.decode_children(&buf))
    }

    /// Rewrites a node's child ids, leaving its values untouched.
    fn persist_children(&mut self, id: usize, children: &Vec<usize>) -> Result<()> {
        let offset = self.offset(id);
        self.file_mut().seek(SeekFrom::Start(offset))?;
        self.file_mut().write_all(&[1])?;
        let values_size = self.values_size();
        self.file_mut().seek(SeekFrom::Current(values_size as i64))?;
        let buf = self.encode_children(children);
        self.file_mut()
            .write_all(&buf)
            .wrap_err_with(|| format!("could not re-persist children of node {id}"))?;
        Ok(())
    }

    /// Finds the next run of free slots in `start..=last_id`.
    fn find_free_block(&mut self, start: usize, last_id: usize) -> Result<Option<FreeBlock>> {
        let mut id = start;
        let lo = loop {
            if id > last_id {
                return Ok(None);
            }
            if !self.slot_in_use(id)? {
                break id;
            }
            id += 1;
        };

        let mut hi = lo;
        while hi + 1 <= last_id && !self.slot_in_use(hi + 1)? {
            hi += 1;
        }
        Ok(Some(FreeBlock { lo, hi }))
    }

    fn slot_in_use(&mut self, id: usize) -> Result<bool> {
        let offset = self.offset(id);
        self.file_mut().seek(SeekFrom::Start(offset))?;
        let mut flag = [0u8; 1];
        self.file_mut().read_exact(&mut flag)?;
        Ok(flag[0] != 0)
    }
}
