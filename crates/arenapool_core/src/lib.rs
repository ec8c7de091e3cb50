//! # ARENAPOOL Core
//!
//! A fixed-arena pool allocator: one byte region, reserved once, carved into
//! variable-size blocks on demand.
//!
//! ## Architecture Rules
//!
//! 1. **One arena** - sized at initialization, never grown
//! 2. **First-fit, split on allocate** - the earliest block that fits wins
//! 3. **Coalesce on free** - adjacent free blocks never linger (eager mode)
//! 4. **Misuse is not fatal** - foreign, stale and double-freed handles are
//!    logged and ignored
//!
//! ## Example
//!
//! ```rust
//! use arenapool_core::{PoolAllocator, PoolError};
//!
//! let pool = PoolAllocator::new(1024);
//! let h1 = pool.allocate(100)?;
//! let h2 = pool.allocate(200)?;
//! pool.free(h1)?;
//!
//! // First-fit reuses the hole left by h1.
//! let h3 = pool.allocate(50)?;
//! assert_eq!(h3.offset(), h1.offset());
//!
//! pool.free(h2)?;
//! pool.free(h3)?;
//! assert!(pool.allocate(1024).is_ok());
//! # Ok::<(), PoolError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;

pub use config::{CoalescePolicy, PoolConfig};
pub use error::{PoolError, PoolResult};
pub use memory::{Arena, BlockInfo, PoolAllocator, PoolHandle, PoolId, PoolStats, RawHandle};
