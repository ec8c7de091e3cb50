//! # Pool Handles
//!
//! A handle names one allocated block: the pool that minted it, the block's
//! arena offset, and the allocation generation. Handles never point into
//! memory directly, so a handle that outlives its pool is harmless.

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of pool identities. Zero is reserved for the null raw handle.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one pool instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    /// Mints a process-unique id.
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Handle to an allocated block in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    pool: PoolId,
    offset: usize,
    generation: u64,
}

impl PoolHandle {
    pub(crate) const fn new(pool: PoolId, offset: usize, generation: u64) -> Self {
        Self {
            pool,
            offset,
            generation,
        }
    }

    /// The pool that issued this handle.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> PoolId {
        self.pool
    }

    /// Arena offset of the block.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Allocation generation of the block.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Plain-data form, suitable for storing inside pool memory.
    #[must_use]
    pub const fn to_raw(self) -> RawHandle {
        RawHandle {
            pool: self.pool.0,
            offset: self.offset as u64,
            generation: self.generation,
        }
    }

    /// Rebuilds a handle from its plain-data form.
    ///
    /// Returns `None` for the null raw handle or an offset that does not fit
    /// in `usize`. Whether the handle is still live is checked by the pool on
    /// use.
    #[must_use]
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        Some(Self {
            pool: PoolId(raw.pool),
            offset: usize::try_from(raw.offset).ok()?,
            generation: raw.generation,
        })
    }
}

/// `#[repr(C)]` form of a [`PoolHandle`].
///
/// The all-zero value is the null handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RawHandle {
    /// Pool id, zero for null.
    pub pool: u64,
    /// Arena offset.
    pub offset: u64,
    /// Allocation generation.
    pub generation: u64,
}

impl RawHandle {
    /// The null handle.
    pub const NULL: Self = Self {
        pool: 0,
        offset: 0,
        generation: 0,
    };

    /// Returns true for the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.pool == 0
    }
}

impl From<Option<PoolHandle>> for RawHandle {
    fn from(handle: Option<PoolHandle>) -> Self {
        handle.map_or(Self::NULL, PoolHandle::to_raw)
    }
}
