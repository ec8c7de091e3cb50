//! # List Error Types

use arenapool_core::PoolError;
use thiserror::Error;

/// Errors that can occur in list operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// The backing pool refused or rejected an operation.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// Insertion relative to a missing anchor node.
    #[error("anchor node cannot be null")]
    NullAnchor,

    /// The node does not belong to this list.
    #[error("node at offset {0} is not part of this list")]
    UnknownNode(usize),

    /// Deletion from an empty list.
    #[error("list is empty")]
    EmptyList,

    /// No node holds the value.
    #[error("value {0} not found in the list")]
    ValueNotFound(u16),

    /// Display range outside the list.
    #[error("invalid range {start}..={end} for list of length {len}")]
    InvalidRange {
        /// First position.
        start: usize,
        /// Last position (inclusive).
        end: usize,
        /// List length.
        len: usize,
    },
}

/// Result type for list operations.
pub type ListResult<T> = Result<T, ListError>;
