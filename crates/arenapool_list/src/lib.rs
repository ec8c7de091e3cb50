//! # ARENAPOOL List
//!
//! A singly-linked list of `u16` values whose nodes are allocated from an
//! [`arenapool_core::PoolAllocator`].
//!
//! The list is a plain pool client: one `allocate` per insertion, one
//! `free` per removal, never a node access after its block is freed.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod list;

pub use error::{ListError, ListResult};
pub use list::{NodeRecord, NodeRef, PoolList};
