use std::ops::{Index, IndexMut};

use log::trace;


/// Handle to a node slot. Stable for the lifetime of the node (slots are
/// only recycled after the node they held has been erased).
pub type NodeId = u32;

/// Slot 0 of every arena: the shared "nil" node standing in for every absent
/// child and for the parent of the root. Always black, never carries a key,
/// never handed out to callers.
pub(crate) const SENTINEL: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// Errors from the storage collaborator.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    OutOfMemory,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::OutOfMemory => write!(f, "node arena allocation failed"),
        }
    }
}

impl std::error::Error for TreeError {}

/// One node record. `key` is `None` only for the sentinel and for slots
/// sitting on the free list; every live node has a key.
#[derive(Debug)]
pub(crate) struct Node<K> {
    pub key: Option<K>,
    pub color: Color,
    pub left: NodeId,
    pub right: NodeId,
    pub parent: NodeId,
}

/// Fixed-size-slot storage for tree nodes.
///
/// The tree never owns nodes through references; parent/child links are
/// `NodeId` indices into this arena, so upward and sideways navigation during
/// fixup is plain index lookup. Erased slots are chained into a free list
/// (through their `right` link) and recycled by later allocations.
pub(crate) struct NodeArena<K> {
    slots: Vec<Node<K>>,
    // head of the free-slot chain; SENTINEL means the chain is empty,
    // since slot 0 itself is never freed
    free_head: NodeId,
    live: usize,
}

impl<K> NodeArena<K> {
    /// Create an arena holding just the sentinel. The only failure is the
    /// initial allocation; nothing is left behind if it fails.
    pub fn new() -> Result<Self, TreeError> {
        Self::with_capacity(0)
    }

    /// Create an arena with room for `extra` nodes beyond the sentinel.
    pub fn with_capacity(extra: usize) -> Result<Self, TreeError> {
        let mut slots = Vec::new();
        slots
            .try_reserve(extra.saturating_add(1))
            .map_err(|_| TreeError::OutOfMemory)?;
        slots.push(Node {
            key: None,
            color: Color::Black,
            left: SENTINEL,
            right: SENTINEL,
            parent: SENTINEL,
        });
        Ok(Self { slots, free_head: SENTINEL, live: 0 })
    }

    /// Allocate a slot for a new red leaf, reusing a freed slot if one is
    /// available.
    pub fn alloc(&mut self, key: K) -> Result<NodeId, TreeError> {
        let id = if self.free_head != SENTINEL {
            let id = self.free_head;
            let slot = &mut self.slots[id as usize];
            debug_assert!(slot.key.is_none(), "free-list slot still holds a key");
            self.free_head = slot.right;
            slot.key = Some(key);
            slot.color = Color::Red;
            slot.left = SENTINEL;
            slot.right = SENTINEL;
            slot.parent = SENTINEL;
            id
        } else {
            if self.slots.len() == self.slots.capacity() {
                trace!("node arena full at {} slots, growing", self.slots.len());
                self.slots.try_reserve(1).map_err(|_| TreeError::OutOfMemory)?;
            }
            let id = self.slots.len() as NodeId;
            self.slots.push(Node {
                key: Some(key),
                color: Color::Red,
                left: SENTINEL,
                right: SENTINEL,
                parent: SENTINEL,
            });
            id
        };
        self.live += 1;
        Ok(id)
    }

    /// Release a slot back to the free list, returning the key it held.
    ///
    /// `id` must be a live, non-sentinel slot; this is the caller's contract
    /// and only checked in debug builds.
    pub fn free(&mut self, id: NodeId) -> K {
        debug_assert_ne!(id, SENTINEL, "attempted to free the sentinel");
        let slot = &mut self.slots[id as usize];
        let key = slot.key.take().expect("attempted to free a slot twice");
        slot.right = self.free_head;
        self.free_head = id;
        self.live -= 1;
        key
    }

    /// Number of live (non-sentinel, non-freed) nodes.
    pub fn live(&self) -> usize {
        self.live
    }
}

impl<K> Index<NodeId> for NodeArena<K> {
    type Output = Node<K>;

    fn index(&self, id: NodeId) -> &Node<K> {
        &self.slots[id as usize]
    }
}

impl<K> IndexMut<NodeId> for NodeArena<K> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<K> {
        &mut self.slots[id as usize]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_black_and_keyless() {
        let arena = NodeArena::<i32>::new().unwrap();
        assert_eq!(arena[SENTINEL].color, Color::Black);
        assert!(arena[SENTINEL].key.is_none());
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn alloc_free_recycles_slots() {
        let mut arena = NodeArena::new().unwrap();
        let a = arena.alloc(1).unwrap();
        let b = arena.alloc(2).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.free(a), 1);
        assert_eq!(arena.live(), 1);

        // the freed slot comes back before the vec grows again
        let c = arena.alloc(3).unwrap();
        assert_eq!(c, a);
        assert_eq!(arena[c].key, Some(3));
        assert_eq!(arena[c].color, Color::Red);
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn new_nodes_are_red_leaves() {
        let mut arena = NodeArena::new().unwrap();
        let id = arena.alloc(7).unwrap();
        assert_eq!(arena[id].color, Color::Red);
        assert_eq!(arena[id].left, SENTINEL);
        assert_eq!(arena[id].right, SENTINEL);
        assert_eq!(arena[id].parent, SENTINEL);
    }
}
