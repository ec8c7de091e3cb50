//! # Pool Allocator
//!
//! Variable-size block allocator over one fixed arena.
//!
//! ## Policy
//!
//! - **First-fit**: the earliest free block large enough wins.
//! - **Split on allocate**: the unused tail becomes a new free block when it
//!   holds at least `split_threshold` bytes.
//! - **Coalesce on free** (eager mode): a freed block absorbs free neighbours
//!   on both sides. Deferred mode leaves that to [`PoolAllocator::defragment`].
//! - **Defragment on request only**: allocate never sweeps the directory.
//!
//! ## Thread Safety
//!
//! One `parking_lot::Mutex` guards the arena and the directory. Every public
//! method takes it once for its whole body; internal steps call the
//! lock-held methods on `PoolState`, never the public ones.

use crate::config::{CoalescePolicy, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::memory::arena::Arena;
use crate::memory::directory::{Block, BlockDirectory, BlockInfo};
use crate::memory::handle::{PoolHandle, PoolId};
use bytemuck::Pod;
use parking_lot::Mutex;
use std::ops::Range;

/// Snapshot of pool usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Arena size in bytes.
    pub pool_size: usize,
    /// Bytes in occupied blocks (including split slack).
    pub used_bytes: usize,
    /// Bytes in free blocks.
    pub free_bytes: usize,
    /// Number of descriptors.
    pub block_count: usize,
    /// Number of free descriptors.
    pub free_block_count: usize,
    /// Largest single free block.
    pub largest_free_block: usize,
    /// Successful allocations (resize moves included).
    pub allocations: u64,
    /// Successful frees (resize moves included).
    pub frees: u64,
    /// Allocations refused for lack of space.
    pub failed_allocations: u64,
    /// Misuse diagnostics reported.
    pub diagnostics: u64,
    /// Descriptors reclaimed by coalescing and defragmentation.
    pub merges: u64,
}

impl PoolStats {
    /// Number of blocks currently handed out.
    #[inline]
    #[must_use]
    pub const fn live_blocks(&self) -> usize {
        self.block_count - self.free_block_count
    }

    /// External fragmentation in `[0, 1)`: the share of free memory that is
    /// not part of the largest free block.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_block as f64 / self.free_bytes as f64
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    allocations: u64,
    frees: u64,
    failed_allocations: u64,
    diagnostics: u64,
    merges: u64,
}

/// Everything the lock protects.
#[derive(Debug)]
struct PoolState {
    arena: Arena,
    directory: BlockDirectory,
    next_generation: u64,
    counters: Counters,
}

impl PoolState {
    /// Counts and logs a failed call, passing the error through.
    fn report(&mut self, err: PoolError) -> PoolError {
        match &err {
            PoolError::OutOfMemory { requested, largest_free } => {
                self.counters.failed_allocations += 1;
                tracing::warn!(
                    "Allocation of {} bytes failed (largest free block: {})",
                    requested,
                    largest_free
                );
            }
            e if e.is_misuse() => {
                self.counters.diagnostics += 1;
                tracing::warn!("Ignored pool misuse: {}", e);
            }
            _ => {}
        }
        err
    }

    /// Resolves a handle to the index of its live block.
    ///
    /// `on_free` builds the error for a handle whose block is currently free.
    fn locate(
        &mut self,
        pool: PoolId,
        handle: PoolHandle,
        on_free: fn(usize) -> PoolError,
    ) -> PoolResult<usize> {
        let offset = handle.offset();
        if handle.pool() != pool {
            return Err(self.report(PoolError::ForeignHandle { offset }));
        }

        let Some((index, block)) = self
            .directory
            .index_of(offset)
            .and_then(|i| self.directory.get(i).map(|b| (i, *b)))
        else {
            return Err(self.report(PoolError::UnknownHandle { offset }));
        };

        if block.is_free {
            return Err(self.report(on_free(offset)));
        }
        if block.generation != handle.generation() {
            return Err(self.report(PoolError::StaleHandle { offset }));
        }
        Ok(index)
    }

    fn allocate(&mut self, config: &PoolConfig, size: usize) -> PoolResult<Block> {
        if size == 0 {
            return Err(self.report(PoolError::ZeroSizedRequest));
        }

        let largest_free = self.directory.largest_free();
        let Some(requested) = config.align_request(size) else {
            return Err(self.report(PoolError::OutOfMemory {
                requested: size,
                largest_free,
            }));
        };

        let generation = self.next_generation;
        match self
            .directory
            .allocate(requested, config.split_threshold, generation)
        {
            Some(block) => {
                self.next_generation += 1;
                self.counters.allocations += 1;
                tracing::debug!(
                    "Allocated {} bytes at offset {} (block size {})",
                    size,
                    block.offset,
                    block.size
                );
                Ok(block)
            }
            None => Err(self.report(PoolError::OutOfMemory {
                requested,
                largest_free,
            })),
        }
    }

    /// Frees the live block at `index`.
    fn release_at(&mut self, config: &PoolConfig, index: usize) {
        self.directory.release(index);
        self.counters.frees += 1;

        if config.coalesce == CoalescePolicy::Eager {
            let merged = self.directory.coalesce_at(index);
            self.counters.merges += merged as u64;
        }
    }

    /// Byte range of the live block behind `handle`.
    fn block_range(&mut self, pool: PoolId, handle: PoolHandle) -> PoolResult<Range<usize>> {
        let index = self.locate(pool, handle, |offset| PoolError::StaleHandle { offset })?;
        let block = self.directory.blocks()[index];
        Ok(block.offset..block.end())
    }

    /// Arena range for `len` bytes at `offset` inside the block of `handle`.
    fn access_range(
        &mut self,
        pool: PoolId,
        handle: PoolHandle,
        offset: usize,
        len: usize,
    ) -> PoolResult<Range<usize>> {
        let block = self.block_range(pool, handle)?;
        let capacity = block.len();

        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(block.start + offset..block.start + end),
            _ => Err(self.report(PoolError::OutOfBounds {
                offset,
                len,
                capacity,
            })),
        }
    }

    fn stats(&self, pool_size: usize) -> PoolStats {
        let free_bytes = self.directory.free_bytes();
        PoolStats {
            pool_size,
            used_bytes: pool_size - free_bytes,
            free_bytes,
            block_count: self.directory.len(),
            free_block_count: self.directory.free_count(),
            largest_free_block: self.directory.largest_free(),
            allocations: self.counters.allocations,
            frees: self.counters.frees,
            failed_allocations: self.counters.failed_allocations,
            diagnostics: self.counters.diagnostics,
            merges: self.counters.merges,
        }
    }
}

/// A first-fit allocator over one fixed arena.
///
/// # Example
///
/// ```rust
/// use arenapool_core::PoolAllocator;
///
/// let pool = PoolAllocator::new(1024);
///
/// let handle = pool.allocate(100)?;
/// pool.write(handle, 0, b"hello")?;
///
/// let handle = pool.resize(handle, 400)?.expect("non-zero size keeps a block");
/// let mut buf = [0u8; 5];
/// pool.read(handle, 0, &mut buf)?;
/// assert_eq!(&buf, b"hello");
///
/// pool.free(handle)?;
/// assert_eq!(pool.stats().largest_free_block, 1024);
/// # Ok::<(), arenapool_core::PoolError>(())
/// ```
#[derive(Debug)]
pub struct PoolAllocator {
    id: PoolId,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl PoolAllocator {
    /// Creates a pool with a `pool_size` byte arena and default policy.
    ///
    /// # Panics
    ///
    /// Panics if the arena cannot be reserved or `pool_size` is zero. An
    /// allocator without its arena is unusable, so this is fatal; release
    /// builds abort. Use [`PoolAllocator::try_new`] to handle the error.
    #[must_use]
    pub fn new(pool_size: usize) -> Self {
        match Self::try_new(pool_size) {
            Ok(pool) => pool,
            Err(err) => {
                tracing::error!("Failed to initialize memory pool: {}", err);
                panic!("failed to initialize memory pool of {pool_size} bytes: {err}");
            }
        }
    }

    /// Creates a pool with a `pool_size` byte arena and default policy.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroSizedPool`] or [`PoolError::ArenaReservation`].
    pub fn try_new(pool_size: usize) -> PoolResult<Self> {
        Self::try_with_config(PoolConfig::with_pool_size(pool_size))
    }

    /// Creates a pool from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error of `config`, or
    /// [`PoolError::ArenaReservation`] if the arena cannot be reserved.
    pub fn try_with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        let arena = Arena::reserve(config.pool_size)?;
        let directory = BlockDirectory::new(arena.len());
        let id = PoolId::next();

        tracing::info!(
            "Memory pool {} initialized: {} bytes, alignment {}, {:?} coalescing",
            id.get(),
            config.pool_size,
            config.alignment,
            config.coalesce
        );

        Ok(Self {
            id,
            config,
            state: Mutex::new(PoolState {
                arena,
                directory,
                next_generation: 1,
                counters: Counters::default(),
            }),
        })
    }

    /// Identity stamped into every handle this pool issues.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PoolId {
        self.id
    }

    /// The configuration the pool was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Arena size in bytes.
    #[inline]
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns true if `handle` was issued by this pool (live or not).
    #[inline]
    #[must_use]
    pub fn owns(&self, handle: PoolHandle) -> bool {
        handle.pool() == self.id
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ZeroSizedRequest`] for `size == 0`
    /// - [`PoolError::OutOfMemory`] if no free block fits; nothing changes
    pub fn allocate(&self, size: usize) -> PoolResult<PoolHandle> {
        let mut state = self.state.lock();
        let block = state.allocate(&self.config, size)?;
        Ok(PoolHandle::new(self.id, block.offset, block.generation))
    }

    /// Returns a block to the pool. `None` is a no-op.
    ///
    /// # Errors
    ///
    /// Misuse diagnostics, with the pool left unchanged:
    /// [`PoolError::ForeignHandle`], [`PoolError::UnknownHandle`],
    /// [`PoolError::DoubleFree`], [`PoolError::StaleHandle`].
    pub fn free(&self, handle: impl Into<Option<PoolHandle>>) -> PoolResult<()> {
        let Some(handle) = handle.into() else {
            return Ok(());
        };

        let mut state = self.state.lock();
        let index = state.locate(self.id, handle, |offset| PoolError::DoubleFree { offset })?;
        state.release_at(&self.config, index);
        tracing::debug!("Freed block at offset {}", handle.offset());
        Ok(())
    }

    /// Grows or shrinks a block.
    ///
    /// - `None` handle: allocates `new_size` bytes.
    /// - `new_size == 0`: frees the block and returns `None`.
    /// - block already holds `new_size` bytes: returns the same handle.
    /// - otherwise moves the contents to a fresh block and frees the old one.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfMemory`] if the fresh block cannot be allocated; the
    /// old handle stays valid and its bytes untouched. Invalid handles yield
    /// the same diagnostics as [`PoolAllocator::free`].
    pub fn resize(
        &self,
        handle: impl Into<Option<PoolHandle>>,
        new_size: usize,
    ) -> PoolResult<Option<PoolHandle>> {
        let Some(handle) = handle.into() else {
            return self.allocate(new_size).map(Some);
        };

        if new_size == 0 {
            self.free(handle)?;
            return Ok(None);
        }

        let mut state = self.state.lock();
        let old = state.block_range(self.id, handle)?;
        if old.len() >= new_size {
            return Ok(Some(handle));
        }

        let fresh = state.allocate(&self.config, new_size)?;
        state.arena.copy_within(old.start, fresh.offset, old.len())?;

        let index = state.directory.index_of(old.start).ok_or_else(|| {
            PoolError::CorruptDirectory(format!("block at {} vanished during resize", old.start))
        })?;
        state.release_at(&self.config, index);

        tracing::debug!(
            "Moved block from offset {} to {} ({} -> {} bytes)",
            old.start,
            fresh.offset,
            old.len(),
            fresh.size
        );
        Ok(Some(PoolHandle::new(self.id, fresh.offset, fresh.generation)))
    }

    /// Merges every run of adjacent free blocks in one sweep.
    ///
    /// Returns the number of descriptors reclaimed. Always zero in eager
    /// mode, and zero on a second call with nothing freed in between.
    pub fn defragment(&self) -> usize {
        let mut state = self.state.lock();
        let merged = state.directory.defragment();
        state.counters.merges += merged as u64;
        tracing::debug!("Defragmentation reclaimed {} descriptors", merged);
        merged
    }

    /// Current capacity of the block behind `handle`.
    ///
    /// # Errors
    ///
    /// Misuse diagnostics for invalid handles.
    pub fn block_size(&self, handle: PoolHandle) -> PoolResult<usize> {
        let mut state = self.state.lock();
        state.block_range(self.id, handle).map(|range| range.len())
    }

    /// Copies `bytes` into the block at `offset`.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfBounds`] if the write crosses the block end, or a
    /// misuse diagnostic for an invalid handle.
    pub fn write(&self, handle: PoolHandle, offset: usize, bytes: &[u8]) -> PoolResult<()> {
        let mut state = self.state.lock();
        let range = state.access_range(self.id, handle, offset, bytes.len())?;
        state
            .arena
            .slice_mut(range.start, range.len())?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Copies bytes from the block at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfBounds`] if the read crosses the block end, or a
    /// misuse diagnostic for an invalid handle.
    pub fn read(&self, handle: PoolHandle, offset: usize, buf: &mut [u8]) -> PoolResult<()> {
        let mut state = self.state.lock();
        let range = state.access_range(self.id, handle, offset, buf.len())?;
        buf.copy_from_slice(state.arena.slice(range.start, range.len())?);
        Ok(())
    }

    /// Runs `f` over the whole block, holding the lock for its duration.
    ///
    /// `f` must not call back into this pool.
    ///
    /// # Errors
    ///
    /// Misuse diagnostics for invalid handles.
    pub fn with_block<R>(&self, handle: PoolHandle, f: impl FnOnce(&[u8]) -> R) -> PoolResult<R> {
        let mut state = self.state.lock();
        let range = state.block_range(self.id, handle)?;
        Ok(f(state.arena.slice(range.start, range.len())?))
    }

    /// Runs `f` over the whole block mutably, holding the lock for its
    /// duration.
    ///
    /// `f` must not call back into this pool.
    ///
    /// # Errors
    ///
    /// Misuse diagnostics for invalid handles.
    pub fn with_block_mut<R>(
        &self,
        handle: PoolHandle,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> PoolResult<R> {
        let mut state = self.state.lock();
        let range = state.block_range(self.id, handle)?;
        Ok(f(state.arena.slice_mut(range.start, range.len())?))
    }

    /// Stores a plain-data value at the start of the block.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfBounds`] if `T` does not fit the block.
    pub fn write_pod<T: Pod>(&self, handle: PoolHandle, value: &T) -> PoolResult<()> {
        self.write(handle, 0, bytemuck::bytes_of(value))
    }

    /// Loads a plain-data value from the start of the block.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfBounds`] if `T` does not fit the block.
    pub fn read_pod<T: Pod>(&self, handle: PoolHandle) -> PoolResult<T> {
        let mut state = self.state.lock();
        let range = state.access_range(self.id, handle, 0, std::mem::size_of::<T>())?;
        let bytes = state.arena.slice(range.start, range.len())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Address-ordered snapshot of the block directory.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockInfo> {
        let state = self.state.lock();
        state.directory.blocks().iter().map(BlockInfo::from).collect()
    }

    /// Verifies the directory invariants: exact partition of the arena,
    /// non-zero sizes and, in eager mode, no adjacent free blocks.
    ///
    /// # Errors
    ///
    /// [`PoolError::CorruptDirectory`] naming the first violation.
    pub fn check_invariants(&self) -> PoolResult<()> {
        let state = self.state.lock();
        state
            .directory
            .check(self.config.coalesce == CoalescePolicy::Eager)
    }

    /// Current usage statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats(self.config.pool_size)
    }

    /// Tears the pool down, releasing the arena and every descriptor.
    ///
    /// Returns the final statistics. Handles still outstanding become
    /// permanently invalid.
    pub fn deinitialize(self) -> PoolStats {
        let stats = self.stats();
        if stats.live_blocks() > 0 {
            tracing::warn!(
                "Memory pool {} torn down with {} blocks ({} bytes) still allocated",
                self.id.get(),
                stats.live_blocks(),
                stats.used_bytes
            );
        }
        tracing::info!("Memory pool {} deinitialized", self.id.get());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deferred(pool_size: usize) -> PoolAllocator {
        PoolAllocator::try_with_config(PoolConfig {
            pool_size,
            coalesce: CoalescePolicy::Deferred,
            ..PoolConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_pool_allocate_free() {
        let pool = PoolAllocator::new(1024);

        let h1 = pool.allocate(100).unwrap();
        assert_eq!(h1.offset(), 0);
        assert_eq!(pool.block_size(h1).unwrap(), 100);
        assert_eq!(pool.stats().live_blocks(), 1);

        pool.free(h1).unwrap();
        assert_eq!(pool.stats().live_blocks(), 0);
        assert_eq!(pool.blocks().len(), 1);
    }

    #[test]
    fn test_try_new_rejects_zero() {
        assert_eq!(PoolAllocator::try_new(0).unwrap_err(), PoolError::ZeroSizedPool);
    }

    #[test]
    fn test_zero_sized_request() {
        let pool = PoolAllocator::new(64);
        assert_eq!(pool.allocate(0), Err(PoolError::ZeroSizedRequest));
        assert_eq!(pool.stats().diagnostics, 1);
        assert_eq!(pool.stats().allocations, 0);
    }

    #[test]
    fn test_pool_full() {
        let pool = PoolAllocator::new(64);
        let _a = pool.allocate(32).unwrap();
        let _b = pool.allocate(32).unwrap();

        assert_eq!(
            pool.allocate(1),
            Err(PoolError::OutOfMemory { requested: 1, largest_free: 0 })
        );
        assert_eq!(pool.stats().failed_allocations, 1);
    }

    #[test]
    fn test_free_none_is_noop() {
        let pool = PoolAllocator::new(64);
        let before = pool.blocks();
        pool.free(None).unwrap();
        assert_eq!(pool.blocks(), before);
        assert_eq!(pool.stats().diagnostics, 0);
    }

    #[test]
    fn test_double_free_reported() {
        let pool = PoolAllocator::new(64);
        let h = pool.allocate(16).unwrap();
        let _keep = pool.allocate(16).unwrap();
        pool.free(h).unwrap();
        let before = pool.blocks();

        assert_eq!(pool.free(h), Err(PoolError::DoubleFree { offset: 0 }));
        assert_eq!(pool.blocks(), before);
        assert_eq!(pool.stats().diagnostics, 1);
    }

    #[test]
    fn test_stale_handle_detected() {
        let pool = PoolAllocator::new(64);
        let old = pool.allocate(16).unwrap();
        pool.free(old).unwrap();
        let new = pool.allocate(16).unwrap();
        assert_eq!(old.offset(), new.offset());

        assert_eq!(pool.free(old), Err(PoolError::StaleHandle { offset: 0 }));
        assert_eq!(pool.block_size(new).unwrap(), 16);
    }

    #[test]
    fn test_unknown_offset() {
        let pool = PoolAllocator::new(64);
        let h = pool.allocate(16).unwrap();
        let inner = PoolHandle::new(pool.id(), 8, h.generation());
        assert_eq!(pool.free(inner), Err(PoolError::UnknownHandle { offset: 8 }));
    }

    #[test]
    fn test_alignment_rounds_requests() {
        let pool = PoolAllocator::try_with_config(PoolConfig {
            pool_size: 64,
            alignment: 8,
            ..PoolConfig::default()
        })
        .unwrap();

        let a = pool.allocate(3).unwrap();
        let b = pool.allocate(9).unwrap();
        assert_eq!(pool.block_size(a).unwrap(), 8);
        assert_eq!(b.offset(), 8);
        assert_eq!(pool.block_size(b).unwrap(), 16);
    }

    #[test]
    fn test_split_threshold_grants_slack() {
        let pool = PoolAllocator::try_with_config(PoolConfig {
            pool_size: 100,
            split_threshold: 16,
            ..PoolConfig::default()
        })
        .unwrap();

        let h = pool.allocate(90).unwrap();
        assert_eq!(pool.block_size(h).unwrap(), 100);
        assert_eq!(pool.blocks().len(), 1);
    }

    #[test]
    fn test_resize_in_place() {
        let pool = PoolAllocator::new(256);
        let h = pool.allocate(64).unwrap();
        pool.write(h, 0, &[7; 64]).unwrap();

        assert_eq!(pool.resize(h, 32).unwrap(), Some(h));
        assert_eq!(pool.resize(h, 64).unwrap(), Some(h));
        assert_eq!(pool.block_size(h).unwrap(), 64);

        let mut buf = [0u8; 64];
        pool.read(h, 0, &mut buf).unwrap();
        assert_eq!(buf, [7; 64]);
    }

    #[test]
    fn test_resize_moves_and_copies() {
        let pool = PoolAllocator::new(256);
        let h = pool.allocate(16).unwrap();
        let _pin = pool.allocate(16).unwrap();
        pool.write(h, 0, b"0123456789abcdef").unwrap();

        let moved = pool.resize(h, 64).unwrap().unwrap();
        assert_ne!(moved, h);
        assert_eq!(moved.offset(), 32);

        let mut buf = [0u8; 16];
        pool.read(moved, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"0123456789abcdef");
        assert_eq!(pool.free(h), Err(PoolError::DoubleFree { offset: 0 }));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_resize_failure_keeps_old_block() {
        let pool = PoolAllocator::new(64);
        let h = pool.allocate(32).unwrap();
        pool.write(h, 0, &[9; 32]).unwrap();
        let before = pool.blocks();

        assert!(matches!(pool.resize(h, 48), Err(PoolError::OutOfMemory { .. })));
        assert_eq!(pool.blocks(), before);

        let mut buf = [0u8; 32];
        pool.read(h, 0, &mut buf).unwrap();
        assert_eq!(buf, [9; 32]);
    }

    #[test]
    fn test_resize_none_and_zero() {
        let pool = PoolAllocator::new(64);
        let h = pool.resize(None, 10).unwrap().unwrap();
        assert_eq!(pool.block_size(h).unwrap(), 10);

        assert_eq!(pool.resize(h, 0).unwrap(), None);
        assert_eq!(pool.stats().live_blocks(), 0);
    }

    #[test]
    fn test_access_bounds() {
        let pool = PoolAllocator::new(64);
        let h = pool.allocate(8).unwrap();

        assert_eq!(
            pool.write(h, 4, &[0; 8]),
            Err(PoolError::OutOfBounds { offset: 4, len: 8, capacity: 8 })
        );
        assert!(pool.read_pod::<u128>(h).is_err());

        pool.write_pod(h, &0xDEAD_BEEF_u64).unwrap();
        assert_eq!(pool.read_pod::<u64>(h).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_with_block_closures() {
        let pool = PoolAllocator::new(64);
        let h = pool.allocate(4).unwrap();

        pool.with_block_mut(h, |bytes| bytes.copy_from_slice(&[1, 2, 3, 4])).unwrap();
        let sum: u32 = pool
            .with_block(h, |bytes| bytes.iter().map(|&b| u32::from(b)).sum())
            .unwrap();
        assert_eq!(sum, 10);
    }

    #[test]
    fn test_deferred_coalescing() {
        let pool = deferred(300);
        let a = pool.allocate(100).unwrap();
        let b = pool.allocate(100).unwrap();
        let c = pool.allocate(100).unwrap();

        pool.free(a).unwrap();
        pool.free(b).unwrap();
        pool.free(c).unwrap();
        assert_eq!(pool.blocks().len(), 3);
        assert!(pool.allocate(300).is_err());

        assert_eq!(pool.defragment(), 2);
        assert_eq!(pool.defragment(), 0);
        pool.check_invariants().unwrap();
        assert!(pool.allocate(300).is_ok());
    }

    #[test]
    fn test_eager_defragment_is_noop() {
        let pool = PoolAllocator::new(128);
        let a = pool.allocate(32).unwrap();
        let _b = pool.allocate(32).unwrap();
        pool.free(a).unwrap();
        assert_eq!(pool.defragment(), 0);
    }

    #[test]
    fn test_fragmentation_ratio() {
        let pool = PoolAllocator::new(400);
        let handles: Vec<_> = (0..4).map(|_| pool.allocate(100).unwrap()).collect();
        pool.free(handles[0]).unwrap();
        pool.free(handles[2]).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.free_bytes, 200);
        assert_eq!(stats.largest_free_block, 100);
        assert!((stats.fragmentation() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deinitialize_reports_final_stats() {
        let pool = PoolAllocator::new(128);
        let _leaked = pool.allocate(40).unwrap();
        let stats = pool.deinitialize();
        assert_eq!(stats.live_blocks(), 1);
        assert_eq!(stats.used_bytes, 40);
    }
}
