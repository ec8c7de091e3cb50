//! # Memory Management
//!
//! The arena, the block directory carving it up, and the allocator that
//! guards both.
//!
//! ## Design Philosophy
//!
//! The arena is reserved once at startup. Afterwards:
//! - No growth, no second arena
//! - Blocks are named by offset, never by address
//! - Every byte access is bounds-checked against its block

mod arena;
mod directory;
mod handle;
mod pool;

pub use arena::Arena;
pub use directory::BlockInfo;
pub use handle::{PoolHandle, PoolId, RawHandle};
pub use pool::{PoolAllocator, PoolStats};
