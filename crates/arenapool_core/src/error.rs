//! # Pool Error Types
//!
//! All errors that can occur in the pool allocator.
//!
//! Three classes exist:
//! - **Fatal**: the arena could not be reserved. Only [`crate::PoolAllocator::new`]
//!   turns this into a process-terminating panic.
//! - **Request failure**: nothing large enough is free.
//! - **Misuse**: foreign, stale or already-freed handles and out-of-range
//!   accesses. These are logged and returned, the pool state is untouched.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that can occur in the pool allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A pool of zero bytes cannot hold a single block.
    #[error("pool size must be greater than zero")]
    ZeroSizedPool,

    /// The backing arena could not be reserved.
    #[error("failed to reserve arena of {size} bytes")]
    ArenaReservation {
        /// Requested arena size.
        size: usize,
        /// Reason reported by the allocator.
        #[source]
        source: TryReserveError,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Allocation of zero bytes was requested.
    #[error("allocation size must be greater than zero")]
    ZeroSizedRequest,

    /// No free block is large enough for the request.
    #[error("out of memory: requested {requested} bytes, largest free block is {largest_free}")]
    OutOfMemory {
        /// Bytes requested (after alignment).
        requested: usize,
        /// Largest free block at the time of the request.
        largest_free: usize,
    },

    /// The handle was produced by a different pool.
    #[error("handle at offset {offset} was not allocated from this pool")]
    ForeignHandle {
        /// Offset carried by the handle.
        offset: usize,
    },

    /// The handle offset is not the start of any block.
    #[error("no block starts at offset {offset}")]
    UnknownHandle {
        /// Offset carried by the handle.
        offset: usize,
    },

    /// The block is already free.
    #[error("block at offset {offset} is already free")]
    DoubleFree {
        /// Offset of the block.
        offset: usize,
    },

    /// The block was freed and handed out again since the handle was issued.
    #[error("handle at offset {offset} is stale (block was reallocated)")]
    StaleHandle {
        /// Offset of the block.
        offset: usize,
    },

    /// A read or write would cross the block boundary.
    #[error("access of {len} bytes at {offset} exceeds block capacity {capacity}")]
    OutOfBounds {
        /// Offset inside the block.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Capacity of the block.
        capacity: usize,
    },

    /// The block directory violates one of its invariants.
    #[error("corrupt block directory: {0}")]
    CorruptDirectory(String),
}

impl PoolError {
    /// Returns true for misuse diagnostics: the call was ignored and the
    /// pool is unchanged.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::ZeroSizedRequest
                | Self::ForeignHandle { .. }
                | Self::UnknownHandle { .. }
                | Self::DoubleFree { .. }
                | Self::StaleHandle { .. }
                | Self::OutOfBounds { .. }
        )
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
