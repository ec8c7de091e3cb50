//! # Block Directory
//!
//! Address-ordered descriptors partitioning the arena. Split and merge are
//! insert/remove at an index, so the whole policy lives in a handful of
//! small methods and one invariant checker.
//!
//! ```text
//! offset: 0        100              300                      1024
//!         [ used:100 ][   used:200    ][         free:724        ]
//! ```

use crate::error::{PoolError, PoolResult};

/// One contiguous sub-range of the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block {
    /// Arena offset of the first byte.
    pub offset: usize,
    /// Length in bytes, never zero.
    pub size: usize,
    /// Free or occupied.
    pub is_free: bool,
    /// Generation stamped by the last allocation of this block.
    pub generation: u64,
}

impl Block {
    /// One past the last byte.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Public snapshot of a block descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// Arena offset of the first byte.
    pub offset: usize,
    /// Length in bytes.
    pub size: usize,
    /// Free or occupied.
    pub is_free: bool,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            offset: block.offset,
            size: block.size,
            is_free: block.is_free,
        }
    }
}

/// The ordered descriptor sequence.
#[derive(Debug)]
pub(crate) struct BlockDirectory {
    blocks: Vec<Block>,
    arena_len: usize,
}

impl BlockDirectory {
    /// A directory holding one free block that spans the arena.
    pub fn new(arena_len: usize) -> Self {
        Self {
            blocks: vec![Block {
                offset: 0,
                size: arena_len,
                is_free: true,
                generation: 0,
            }],
            arena_len,
        }
    }

    /// Number of descriptors.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Descriptors in address order.
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Descriptor at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Index of the descriptor starting exactly at `offset`.
    pub fn index_of(&self, offset: usize) -> Option<usize> {
        self.blocks.binary_search_by_key(&offset, |b| b.offset).ok()
    }

    /// Index of the earliest free descriptor holding at least `size` bytes.
    pub fn find_first_fit(&self, size: usize) -> Option<usize> {
        self.blocks.iter().position(|b| b.is_free && b.size >= size)
    }

    /// First-fit allocation with split.
    ///
    /// The remainder becomes a new free descriptor only if it holds at least
    /// `split_threshold` bytes; otherwise the caller receives the whole block.
    /// Returns the occupied descriptor, or `None` with the directory untouched.
    pub fn allocate(&mut self, size: usize, split_threshold: usize, generation: u64) -> Option<Block> {
        let index = self.find_first_fit(size)?;
        let remainder = self.blocks[index].size - size;

        if remainder > 0 && remainder >= split_threshold {
            let block = &mut self.blocks[index];
            block.size = size;
            let tail = Block {
                offset: block.end(),
                size: remainder,
                is_free: true,
                generation: 0,
            };
            self.blocks.insert(index + 1, tail);
        }

        let block = &mut self.blocks[index];
        block.is_free = false;
        block.generation = generation;
        Some(*block)
    }

    /// Marks the descriptor at `index` free without merging.
    pub fn release(&mut self, index: usize) {
        self.blocks[index].is_free = true;
    }

    /// Merges the free descriptor at `index` with free neighbours on both
    /// sides. Returns the number of descriptors removed.
    pub fn coalesce_at(&mut self, index: usize) -> usize {
        let mut merged = 0;

        while index + 1 < self.blocks.len() && self.blocks[index + 1].is_free {
            let next = self.blocks.remove(index + 1);
            self.blocks[index].size += next.size;
            merged += 1;
        }

        if index > 0 && self.blocks[index - 1].is_free {
            let current = self.blocks.remove(index);
            self.blocks[index - 1].size += current.size;
            merged += 1;
        }

        merged
    }

    /// One sweep merging every run of adjacent free descriptors.
    /// Returns the number of descriptors removed.
    pub fn defragment(&mut self) -> usize {
        let before = self.blocks.len();
        // `later` is removed when it merges into `kept`.
        self.blocks.dedup_by(|later, kept| {
            if later.is_free && kept.is_free {
                kept.size += later.size;
                true
            } else {
                false
            }
        });
        before - self.blocks.len()
    }

    /// Size of the largest free descriptor, zero if none.
    pub fn largest_free(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.is_free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Total bytes in free descriptors.
    pub fn free_bytes(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_free).map(|b| b.size).sum()
    }

    /// Number of free descriptors.
    pub fn free_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_free).count()
    }

    /// Verifies the partition invariants. With `require_coalesced`, also
    /// rejects adjacent free descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CorruptDirectory`] naming the first violation.
    pub fn check(&self, require_coalesced: bool) -> PoolResult<()> {
        let mut expected = 0usize;

        for (index, block) in self.blocks.iter().enumerate() {
            if block.size == 0 {
                return Err(PoolError::CorruptDirectory(format!(
                    "block {index} at offset {} has zero size",
                    block.offset
                )));
            }
            if block.offset != expected {
                return Err(PoolError::CorruptDirectory(format!(
                    "block {index} starts at {} but previous block ends at {expected}",
                    block.offset
                )));
            }
            expected = block.offset.checked_add(block.size).ok_or_else(|| {
                PoolError::CorruptDirectory(format!("block {index} overflows the address space"))
            })?;
        }

        if expected != self.arena_len {
            return Err(PoolError::CorruptDirectory(format!(
                "blocks cover {expected} bytes, arena holds {}",
                self.arena_len
            )));
        }

        if require_coalesced {
            if let Some(pair) = self.blocks.windows(2).find(|w| w[0].is_free && w[1].is_free) {
                return Err(PoolError::CorruptDirectory(format!(
                    "adjacent free blocks at offsets {} and {}",
                    pair[0].offset, pair[1].offset
                )));
            }
        }

        Ok(())
    }
}
