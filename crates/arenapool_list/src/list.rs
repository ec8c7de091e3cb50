//! # Pool-Backed Linked List
//!
//! Each node is one pool block holding a [`NodeRecord`]. The list owns its
//! nodes: every insertion allocates one block, every removal frees one, and
//! dropping the list frees the rest.
//!
//! ```text
//! head ─► [value | next] ─► [value | next] ─► [value | null]
//!          pool block        pool block        pool block
//! ```

use crate::error::{ListError, ListResult};
use arenapool_core::{PoolAllocator, PoolHandle, RawHandle};
use bytemuck::{Pod, Zeroable};
use std::fmt;

/// On-pool layout of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct NodeRecord {
    /// Link to the next node, null for the tail.
    pub next: RawHandle,
    /// Payload.
    pub value: u16,
    _pad: [u8; 6],
}

impl NodeRecord {
    /// Bytes requested from the pool per node.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    fn new(value: u16, next: Option<PoolHandle>) -> Self {
        Self {
            next: RawHandle::from(next),
            value,
            _pad: [0; 6],
        }
    }

    fn next(&self) -> Option<PoolHandle> {
        PoolHandle::from_raw(self.next)
    }
}

/// Reference to a node of a [`PoolList`]. Invalid once the node is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(PoolHandle);

impl NodeRef {
    /// The pool handle of the node's block.
    #[inline]
    #[must_use]
    pub const fn handle(self) -> PoolHandle {
        self.0
    }
}

/// Singly-linked list of `u16` values stored in a [`PoolAllocator`].
///
/// Mutation takes `&mut self`, so a list is never modified from two threads
/// at once; the pool underneath may still be shared with other clients.
///
/// # Example
///
/// ```rust
/// use arenapool_core::PoolAllocator;
/// use arenapool_list::PoolList;
///
/// let pool = PoolAllocator::new(4096);
/// let mut list = PoolList::new(&pool);
///
/// list.push_back(1)?;
/// let three = list.push_back(3)?;
/// list.insert_before(Some(three), 2)?;
/// assert_eq!(list.to_string(), "[1, 2, 3]");
///
/// list.remove(2)?;
/// assert_eq!(list.render_range(0, 1)?, "[1, 3]");
/// # Ok::<(), arenapool_list::ListError>(())
/// ```
pub struct PoolList<'p> {
    pool: &'p PoolAllocator,
    head: Option<PoolHandle>,
    len: usize,
}

impl<'p> PoolList<'p> {
    /// An empty list allocating from `pool`.
    #[must_use]
    pub const fn new(pool: &'p PoolAllocator) -> Self {
        Self {
            pool,
            head: None,
            len: 0,
        }
    }

    /// Number of nodes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list holds no nodes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The first node.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<NodeRef> {
        self.head.map(NodeRef)
    }

    fn load(&self, node: PoolHandle) -> ListResult<NodeRecord> {
        Ok(self.pool.read_pod(node)?)
    }

    fn store(&self, node: PoolHandle, record: &NodeRecord) -> ListResult<()> {
        Ok(self.pool.write_pod(node, record)?)
    }

    /// Allocates and initializes a node. Nothing is linked yet.
    fn new_node(&self, value: u16, next: Option<PoolHandle>) -> ListResult<PoolHandle> {
        let node = self.pool.allocate(NodeRecord::SIZE)?;
        if let Err(err) = self.store(node, &NodeRecord::new(value, next)) {
            self.pool.free(node)?;
            return Err(err);
        }
        Ok(node)
    }

    /// Finds `target` and its predecessor.
    fn locate(&self, target: PoolHandle) -> ListResult<Option<PoolHandle>> {
        let mut prev = None;
        let mut cursor = self.head;

        while let Some(node) = cursor {
            if node == target {
                return Ok(prev);
            }
            prev = Some(node);
            cursor = self.load(node)?.next();
        }

        Err(ListError::UnknownNode(target.offset()))
    }

    fn require_anchor(anchor: Option<NodeRef>) -> ListResult<PoolHandle> {
        anchor.map(NodeRef::handle).ok_or_else(|| {
            tracing::warn!("Insertion relative to a null node ignored");
            ListError::NullAnchor
        })
    }

    /// Appends `value` at the tail.
    ///
    /// # Errors
    ///
    /// [`ListError::Pool`] if the node cannot be allocated; the list is
    /// unchanged.
    pub fn push_back(&mut self, value: u16) -> ListResult<NodeRef> {
        let mut tail = None;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            tail = Some(node);
            cursor = self.load(node)?.next();
        }

        let node = self.new_node(value, None)?;
        match tail {
            Some(tail) => {
                let mut record = self.load(tail)?;
                record.next = node.to_raw();
                self.store(tail, &record)?;
            }
            None => self.head = Some(node),
        }

        self.len += 1;
        Ok(NodeRef(node))
    }

    /// Inserts `value` right after `anchor`.
    ///
    /// # Errors
    ///
    /// - [`ListError::NullAnchor`] for a `None` anchor (logged, list unchanged)
    /// - [`ListError::UnknownNode`] if the anchor is not in this list
    /// - [`ListError::Pool`] if the node cannot be allocated
    pub fn insert_after(&mut self, anchor: Option<NodeRef>, value: u16) -> ListResult<NodeRef> {
        let anchor = Self::require_anchor(anchor)?;
        self.locate(anchor)?;

        let mut record = self.load(anchor)?;
        let node = self.new_node(value, record.next())?;
        record.next = node.to_raw();
        self.store(anchor, &record)?;

        self.len += 1;
        Ok(NodeRef(node))
    }

    /// Inserts `value` right before `anchor`.
    ///
    /// # Errors
    ///
    /// Same as [`PoolList::insert_after`].
    pub fn insert_before(&mut self, anchor: Option<NodeRef>, value: u16) -> ListResult<NodeRef> {
        let anchor = Self::require_anchor(anchor)?;
        let prev = self.locate(anchor)?;

        let node = self.new_node(value, Some(anchor))?;
        match prev {
            Some(prev) => {
                let mut record = self.load(prev)?;
                record.next = node.to_raw();
                self.store(prev, &record)?;
            }
            None => self.head = Some(node),
        }

        self.len += 1;
        Ok(NodeRef(node))
    }

    /// Removes the first node holding `value` and frees its block.
    ///
    /// # Errors
    ///
    /// [`ListError::EmptyList`] or [`ListError::ValueNotFound`].
    pub fn remove(&mut self, value: u16) -> ListResult<()> {
        if self.head.is_none() {
            tracing::debug!("Delete of {} from empty list", value);
            return Err(ListError::EmptyList);
        }

        let mut prev: Option<PoolHandle> = None;
        let mut cursor = self.head;

        while let Some(node) = cursor {
            let record = self.load(node)?;
            if record.value == value {
                match prev {
                    Some(prev) => {
                        let mut prev_record = self.load(prev)?;
                        prev_record.next = record.next;
                        self.store(prev, &prev_record)?;
                    }
                    None => self.head = record.next(),
                }
                self.pool.free(node)?;
                self.len -= 1;
                return Ok(());
            }
            prev = Some(node);
            cursor = record.next();
        }

        tracing::debug!("Value {} not found in list", value);
        Err(ListError::ValueNotFound(value))
    }

    /// First node holding `value`.
    ///
    /// # Errors
    ///
    /// [`ListError::Pool`] if a node cannot be read.
    pub fn find(&self, value: u16) -> ListResult<Option<NodeRef>> {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            let record = self.load(node)?;
            if record.value == value {
                return Ok(Some(NodeRef(node)));
            }
            cursor = record.next();
        }
        Ok(None)
    }

    /// Value stored in `node`.
    ///
    /// # Errors
    ///
    /// [`ListError::Pool`] if the node was removed.
    pub fn value(&self, node: NodeRef) -> ListResult<u16> {
        Ok(self.load(node.0)?.value)
    }

    /// All values, head to tail.
    ///
    /// # Errors
    ///
    /// [`ListError::Pool`] if a node cannot be read.
    pub fn values(&self) -> ListResult<Vec<u16>> {
        let mut values = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(node) = cursor {
            let record = self.load(node)?;
            values.push(record.value);
            cursor = record.next();
        }
        Ok(values)
    }

    /// Renders positions `start..=end` as `[a, b, c]`.
    ///
    /// # Errors
    ///
    /// [`ListError::InvalidRange`] if `start > end` or `end` is past the tail.
    pub fn render_range(&self, start: usize, end: usize) -> ListResult<String> {
        if start > end || end >= self.len {
            return Err(ListError::InvalidRange {
                start,
                end,
                len: self.len,
            });
        }

        let values = self.values()?;
        Ok(render(&values[start..=end]))
    }

    /// Removes every node, returning the blocks to the pool.
    ///
    /// # Errors
    ///
    /// [`ListError::Pool`] if a node cannot be read or freed. The nodes
    /// already freed stay freed and the list is emptied.
    pub fn clear(&mut self) -> ListResult<()> {
        let mut cursor = self.head.take();
        self.len = 0;

        while let Some(node) = cursor {
            cursor = self.load(node)?.next();
            self.pool.free(node)?;
        }
        Ok(())
    }
}

fn render(values: &[u16]) -> String {
    let items: Vec<String> = values.iter().map(u16::to_string).collect();
    format!("[{}]", items.join(", "))
}

impl fmt::Display for PoolList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values().map_err(|_| fmt::Error)?;
        f.write_str(&render(&values))
    }
}

impl fmt::Debug for PoolList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolList")
            .field("pool", &self.pool.id())
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for PoolList<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            tracing::warn!("List cleanup failed: {}", err);
        }
    }
}
