//! # Pool Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! pool_size = 65536
//! alignment = 8
//! split_threshold = 16
//! coalesce = "eager"
//! ```

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// When adjacent free blocks are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoalescePolicy {
    /// Free merges the block with both free neighbours immediately.
    #[default]
    Eager,
    /// Free only marks the block; [`crate::PoolAllocator::defragment`]
    /// repairs adjacency.
    Deferred,
}

/// Configuration for a [`crate::PoolAllocator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Arena size in bytes.
    pub pool_size: usize,
    /// Every request is rounded up to a multiple of this. Power of two.
    pub alignment: usize,
    /// Smallest remainder that gets its own free block on split. Smaller
    /// remainders are handed to the caller with the allocation.
    pub split_threshold: usize,
    /// Coalescing policy.
    pub coalesce: CoalescePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 64 * 1024,
            alignment: 1,
            split_threshold: 1,
            coalesce: CoalescePolicy::Eager,
        }
    }
}

impl PoolConfig {
    /// Default configuration with the given arena size.
    #[must_use]
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] on parse errors or invalid values.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the file cannot be read or
    /// its contents are invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks that the values are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroSizedPool`] for an empty arena and
    /// [`PoolError::InvalidConfig`] for bad alignment or split threshold.
    pub fn validate(&self) -> PoolResult<()> {
        if self.pool_size == 0 {
            return Err(PoolError::ZeroSizedPool);
        }
        if !self.alignment.is_power_of_two() {
            return Err(PoolError::InvalidConfig(format!(
                "alignment {} is not a power of two",
                self.alignment
            )));
        }
        if self.split_threshold == 0 {
            return Err(PoolError::InvalidConfig(
                "split_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Rounds a request up to the configured alignment.
    ///
    /// Returns `None` on overflow.
    #[inline]
    #[must_use]
    pub fn align_request(&self, size: usize) -> Option<usize> {
        size.checked_next_multiple_of(self.alignment)
    }
}
