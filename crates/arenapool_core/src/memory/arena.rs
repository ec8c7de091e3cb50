//! # Arena
//!
//! The single fixed-size byte region a pool carves into blocks.

use crate::error::{PoolError, PoolResult};
use std::ops::Range;

/// A contiguous byte region reserved once and never grown.
///
/// The arena knows nothing about blocks. It only guarantees that every
/// range it hands out lies inside the reserved length.
pub struct Arena {
    /// The backing storage.
    storage: Box<[u8]>,
}

impl Arena {
    /// Reserves a zeroed arena of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroSizedPool`] for `size == 0` and
    /// [`PoolError::ArenaReservation`] if the memory cannot be reserved.
    pub fn reserve(size: usize) -> PoolResult<Self> {
        if size == 0 {
            return Err(PoolError::ZeroSizedPool);
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(size)
            .map_err(|source| PoolError::ArenaReservation { size, source })?;
        storage.resize(size, 0);

        Ok(Self {
            storage: storage.into_boxed_slice(),
        })
    }

    /// Returns the arena length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Always false: a reserved arena holds at least one byte.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Borrows `len` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CorruptDirectory`] if the range leaves the arena.
    pub fn slice(&self, start: usize, len: usize) -> PoolResult<&[u8]> {
        let range = self.checked_range(start, len)?;
        Ok(&self.storage[range])
    }

    /// Mutably borrows `len` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CorruptDirectory`] if the range leaves the arena.
    pub fn slice_mut(&mut self, start: usize, len: usize) -> PoolResult<&mut [u8]> {
        let range = self.checked_range(start, len)?;
        Ok(&mut self.storage[range])
    }

    /// Copies `len` bytes from `src` to `dst` inside the arena.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CorruptDirectory`] if either range leaves the arena.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> PoolResult<()> {
        let src_range = self.checked_range(src, len)?;
        self.checked_range(dst, len)?;
        self.storage.copy_within(src_range, dst);
        Ok(())
    }

    fn checked_range(&self, start: usize, len: usize) -> PoolResult<Range<usize>> {
        match start.checked_add(len) {
            Some(end) if end <= self.storage.len() => Ok(start..end),
            _ => Err(PoolError::CorruptDirectory(format!(
                "range {start}+{len} exceeds arena of {} bytes",
                self.storage.len()
            ))),
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena").field("len", &self.len()).finish()
    }
}
