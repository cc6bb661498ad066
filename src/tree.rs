//! Self-balancing ordered multiset, implemented as a classic red-black tree
//! (CLRS chapter 13) over an index arena.
//!
//! The usual pointer formulation is replaced by `NodeId` indices into a
//! [`NodeArena`], so parent back-links (which both fixup loops and successor
//! lookup lean on) are plain lookups instead of shared ownership. A single
//! always-black sentinel slot stands in for every leaf and for the parent of
//! the root, which keeps the rotation and fixup code free of boundary
//! branches.
//!
//! Balance invariants, restored before every mutating call returns:
//! 1. every node is red or black; the sentinel is black
//! 2. the root is black
//! 3. a red node never has a red child
//! 4. every root-to-leaf path crosses the same number of black nodes
//! 5. an in-order walk visits keys in non-decreasing order

use log::debug;

use crate::arena::{Color, Node, NodeArena, NodeId, SENTINEL, TreeError};

/// Ordered multiset keyed by `K`. Equal keys are kept (ties descend right),
/// not rejected or overwritten.
pub struct RbTree<K> {
    arena: NodeArena<K>,
    root: NodeId,
}

impl<K: Ord> RbTree<K> {
    /// Create an empty tree. Fails only if the arena's initial allocation
    /// fails, in which case nothing is leaked.
    pub fn new() -> Result<Self, TreeError> {
        Ok(Self { arena: NodeArena::new()?, root: SENTINEL })
    }

    /// Create an empty tree with room for `capacity` nodes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self, TreeError> {
        Ok(Self { arena: NodeArena::with_capacity(capacity)?, root: SENTINEL })
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.arena.live()
    }

    pub fn is_empty(&self) -> bool {
        self.root == SENTINEL
    }

    /// Handle of the root node, if the tree is non-empty.
    pub fn root(&self) -> Option<NodeId> {
        (self.root != SENTINEL).then_some(self.root)
    }

    /// The key held by `id`, or `None` if the handle does not name a live
    /// node (e.g. it was already erased).
    pub fn key(&self, id: NodeId) -> Option<&K> {
        self.arena[id].key.as_ref()
    }

    // ------------------------------------------------------------------
    // link accessors: fixup code reads much closer to the textbook with
    // these than with arena indexing spelled out at every step
    // ------------------------------------------------------------------

    fn node(&self, id: NodeId) -> &Node<K> {
        &self.arena[id]
    }

    fn color(&self, id: NodeId) -> Color {
        self.arena[id].color
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        self.arena[id].color = color;
    }

    fn left(&self, id: NodeId) -> NodeId {
        self.arena[id].left
    }

    fn right(&self, id: NodeId) -> NodeId {
        self.arena[id].right
    }

    fn parent(&self, id: NodeId) -> NodeId {
        self.arena[id].parent
    }

    /// Key of a live node. The sentinel is never the target of a key
    /// comparison, so this cannot observe an empty slot.
    fn key_of(&self, id: NodeId) -> &K {
        self.arena[id].key.as_ref().expect("key comparison against the sentinel")
    }

    // ------------------------------------------------------------------
    // rotations
    // ------------------------------------------------------------------

    /// Promote `x`'s right child into `x`'s position. Requires
    /// `x.right != SENTINEL`. Touches only links, never colors.
    fn left_rotate(&mut self, x: NodeId) {
        let y = self.right(x);
        debug_assert_ne!(y, SENTINEL, "left_rotate with no right child");

        // y's left subtree becomes x's right subtree
        let beta = self.left(y);
        self.arena[x].right = beta;
        if beta != SENTINEL {
            self.arena[beta].parent = x;
        }

        // y takes x's place under x's parent
        let p = self.parent(x);
        self.arena[y].parent = p;
        if p == SENTINEL {
            self.root = y;
        } else if x == self.left(p) {
            self.arena[p].left = y;
        } else {
            self.arena[p].right = y;
        }

        self.arena[y].left = x;
        self.arena[x].parent = y;
    }

    /// Mirror of [`Self::left_rotate`]. Requires `y.left != SENTINEL`.
    fn right_rotate(&mut self, y: NodeId) {
        let x = self.left(y);
        debug_assert_ne!(x, SENTINEL, "right_rotate with no left child");

        let beta = self.right(x);
        self.arena[y].left = beta;
        if beta != SENTINEL {
            self.arena[beta].parent = y;
        }

        let p = self.parent(y);
        self.arena[x].parent = p;
        if p == SENTINEL {
            self.root = x;
        } else if y == self.right(p) {
            self.arena[p].right = x;
        } else {
            self.arena[p].left = x;
        }

        self.arena[x].right = y;
        self.arena[y].parent = x;
    }

    // ------------------------------------------------------------------
    // insertion
    // ------------------------------------------------------------------

    /// Insert `key`, keeping duplicates (an equal key descends right, so
    /// duplicates land in the right subtree of their peers). Returns the
    /// handle of the new node. The only failure is arena allocation.
    pub fn insert(&mut self, key: K) -> Result<NodeId, TreeError> {
        // standard BST descent; remember the last real node visited
        let mut parent = SENTINEL;
        let mut cursor = self.root;
        while cursor != SENTINEL {
            parent = cursor;
            cursor = if key < *self.key_of(cursor) {
                self.left(cursor)
            } else {
                self.right(cursor)
            };
        }

        let less_than_parent = parent != SENTINEL && key < *self.key_of(parent);
        let z = self.arena.alloc(key)?;
        self.arena[z].parent = parent;

        if parent == SENTINEL {
            self.root = z;
        } else if less_than_parent {
            self.arena[parent].left = z;
        } else {
            self.arena[parent].right = z;
        }

        self.insert_fixup(z);
        Ok(z)
    }

    /// Restore the no-red-red invariant after linking a red leaf `z`.
    ///
    /// Loop invariant: only invariant 3 may be violated, and only between
    /// `z` and its parent. The sentinel parent of the root is black, so the
    /// loop also terminates when `z` reaches the root.
    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.color(self.parent(z)) == Color::Red {
            let p = self.parent(z);
            let g = self.parent(p);

            if p == self.left(g) {
                let uncle = self.right(g);
                if self.color(uncle) == Color::Red {
                    // case 1: red uncle, push the violation two levels up
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if z == self.right(p) {
                        // case 2: zig-zag, straighten into case 3
                        z = p;
                        self.left_rotate(z);
                    }
                    // case 3: recolor and rotate the grandparent; the new
                    // subtree root is black, so the loop exits next check
                    let p = self.parent(z);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.right_rotate(g);
                }
            } else {
                // mirror image, left and right swapped
                let uncle = self.left(g);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if z == self.left(p) {
                        z = p;
                        self.right_rotate(z);
                    }
                    let p = self.parent(z);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.left_rotate(g);
                }
            }
        }

        // case 1 can paint the root red on its way up
        self.set_color(self.root, Color::Black);
    }

    // ------------------------------------------------------------------
    // lookup and traversal
    // ------------------------------------------------------------------

    /// Find a node holding `key`. Absence is a normal outcome, reported as
    /// `None`. With duplicates present this returns the first match on the
    /// descent path, not necessarily the in-order first.
    pub fn find(&self, key: &K) -> Option<NodeId> {
        let mut cursor = self.root;
        while cursor != SENTINEL {
            cursor = match key.cmp(self.key_of(cursor)) {
                std::cmp::Ordering::Equal => return Some(cursor),
                std::cmp::Ordering::Less => self.left(cursor),
                std::cmp::Ordering::Greater => self.right(cursor),
            };
        }
        None
    }

    /// Handle of the smallest key, or `None` on an empty tree.
    pub fn minimum(&self) -> Option<NodeId> {
        (self.root != SENTINEL).then(|| self.min_from(self.root))
    }

    /// Handle of the largest key, or `None` on an empty tree.
    pub fn maximum(&self) -> Option<NodeId> {
        (self.root != SENTINEL).then(|| self.max_from(self.root))
    }

    fn min_from(&self, mut id: NodeId) -> NodeId {
        while self.left(id) != SENTINEL {
            id = self.left(id);
        }
        id
    }

    fn max_from(&self, mut id: NodeId) -> NodeId {
        while self.right(id) != SENTINEL {
            id = self.right(id);
        }
        id
    }

    /// In-order successor of `id`: the minimum of its right subtree if one
    /// exists, otherwise the nearest ancestor of which `id` lies in the left
    /// subtree. `None` if `id` holds the maximum.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if self.right(id) != SENTINEL {
            return Some(self.min_from(self.right(id)));
        }
        let mut z = id;
        let mut up = self.parent(z);
        while up != SENTINEL && z == self.right(up) {
            z = up;
            up = self.parent(up);
        }
        (up != SENTINEL).then_some(up)
    }

    /// Fill `out` with up to `out.len()` keys in ascending order and return
    /// how many were written. A buffer smaller than the tree truncates the
    /// walk; it never overruns.
    pub fn export_ordered(&self, out: &mut [K]) -> usize
    where
        K: Clone,
    {
        let mut written = 0;
        let mut stack = Vec::new();
        let mut cursor = self.root;
        while written < out.len() && (cursor != SENTINEL || !stack.is_empty()) {
            while cursor != SENTINEL {
                stack.push(cursor);
                cursor = self.left(cursor);
            }
            // stack is non-empty here: the outer condition guarantees it
            // whenever cursor was the sentinel
            let id = stack.pop().expect("in-order walk stack underflow");
            out[written] = self.key_of(id).clone();
            written += 1;
            cursor = self.right(id);
        }
        written
    }

    // ------------------------------------------------------------------
    // deletion
    // ------------------------------------------------------------------

    /// Replace the subtree rooted at `u` with the one rooted at `v` in u's
    /// parent. `v` may be the sentinel; its parent link is written
    /// regardless (delete-fixup navigates from it).
    fn transplant(&mut self, u: NodeId, v: NodeId) {
        let p = self.parent(u);
        if p == SENTINEL {
            self.root = v;
        } else if u == self.left(p) {
            self.arena[p].left = v;
        } else {
            self.arena[p].right = v;
        }
        self.arena[v].parent = p;
    }

    /// Erase the node `id` and return its key. The slot becomes reusable.
    ///
    /// `id` must be a live handle obtained from this tree; passing a stale
    /// or foreign handle is a contract violation, caught only by debug
    /// assertions.
    pub fn erase(&mut self, id: NodeId) -> K {
        debug_assert!(self.arena[id].key.is_some(), "erase of a dead handle");
        let z = id;

        // y is the node physically spliced out: z itself when z has at most
        // one real child, z's in-order successor otherwise. x is whatever
        // takes y's vacated position, possibly the sentinel.
        let mut y_color = self.color(z);
        let x;

        if self.left(z) == SENTINEL {
            x = self.right(z);
            self.transplant(z, x);
        } else if self.right(z) == SENTINEL {
            x = self.left(z);
            self.transplant(z, x);
        } else {
            let y = self.min_from(self.right(z));
            y_color = self.color(y);
            x = self.right(y);

            if self.parent(y) == z {
                // x may be the sentinel; fixup will read this link
                self.arena[x].parent = y;
            } else {
                self.transplant(y, x);
                let zr = self.right(z);
                self.arena[y].right = zr;
                self.arena[zr].parent = y;
            }

            self.transplant(z, y);
            let zl = self.left(z);
            self.arena[y].left = zl;
            self.arena[zl].parent = y;
            // y inherits z's color so black-heights outside y's old
            // position are undisturbed
            let zc = self.color(z);
            self.set_color(y, zc);
        }

        // splicing out a red node cannot unbalance anything; splicing out a
        // black one leaves x carrying an extra black that must be resolved
        if y_color == Color::Black {
            self.delete_fixup(x);
        }

        self.arena.free(z)
    }

    /// Resolve the "doubly black" node `x` left behind by erasing a black
    /// node, pushing the extra black up the tree or absorbing it with a
    /// rotation. The six cases of the textbook analysis (three per side,
    /// mirrored) all funnel into a terminal rotation or into moving `x` one
    /// level up.
    fn delete_fixup(&mut self, mut x: NodeId) {
        while x != self.root && self.color(x) == Color::Black {
            let p = self.parent(x);

            if x == self.left(p) {
                let mut w = self.right(p);

                if self.color(w) == Color::Red {
                    // red sibling: rotate it above the parent so the
                    // remaining cases see a black sibling
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.left_rotate(p);
                    w = self.right(p);
                }

                if self.color(self.left(w)) == Color::Black
                    && self.color(self.right(w)) == Color::Black
                {
                    // both nephews black: drop one black from this level
                    // and push the extra black to the parent
                    self.set_color(w, Color::Red);
                    x = p;
                } else {
                    if self.color(self.right(w)) == Color::Black {
                        // near nephew red, far nephew black: rotate the
                        // sibling so the red ends up far
                        let wl = self.left(w);
                        self.set_color(wl, Color::Black);
                        self.set_color(w, Color::Red);
                        self.right_rotate(w);
                        w = self.right(p);
                    }
                    // far nephew red: one rotation retires the extra black
                    let pc = self.color(p);
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    let wr = self.right(w);
                    self.set_color(wr, Color::Black);
                    self.left_rotate(p);
                    x = self.root;
                }
            } else {
                // mirror image, left and right swapped
                let mut w = self.left(p);

                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.right_rotate(p);
                    w = self.left(p);
                }

                if self.color(self.right(w)) == Color::Black
                    && self.color(self.left(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = p;
                } else {
                    if self.color(self.left(w)) == Color::Black {
                        let wr = self.right(w);
                        self.set_color(wr, Color::Black);
                        self.set_color(w, Color::Red);
                        self.left_rotate(w);
                        w = self.left(p);
                    }
                    let pc = self.color(p);
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    let wl = self.left(w);
                    self.set_color(wl, Color::Black);
                    self.right_rotate(p);
                    x = self.root;
                }
            }
        }

        // x is the root or red: it absorbs the extra black
        self.set_color(x, Color::Black);
    }

    // ------------------------------------------------------------------
    // teardown
    // ------------------------------------------------------------------

    /// Release every node and leave the tree empty and reusable.
    ///
    /// The walk is post-order with an explicit stack (children released
    /// before their parent) so teardown depth is bounded by heap, not by
    /// the call stack.
    pub fn clear(&mut self) {
        if self.root == SENTINEL {
            return;
        }

        // two-stack post-order: `visit` pops in root-right-left order, so
        // `order` reversed is left-right-root
        let mut visit = vec![self.root];
        let mut order = Vec::new();
        while let Some(id) = visit.pop() {
            if self.left(id) != SENTINEL {
                visit.push(self.left(id));
            }
            if self.right(id) != SENTINEL {
                visit.push(self.right(id));
            }
            order.push(id);
        }

        let released = order.len();
        for id in order.into_iter().rev() {
            self.arena.free(id);
        }
        self.root = SENTINEL;
        debug!("cleared tree, released {released} nodes");
    }

    // ------------------------------------------------------------------
    // auditing
    // ------------------------------------------------------------------

    /// Verify the full red-black contract: colors, root blackness, no
    /// red-red edges, uniform black-height, in-order key order, and
    /// parent/child link consistency. Intended for tests and debugging;
    /// costs a full O(n) walk.
    pub fn check_invariants(&self) -> bool {
        if self.color(SENTINEL) != Color::Black {
            return false;
        }
        if self.root == SENTINEL {
            return true;
        }
        if self.color(self.root) != Color::Black || self.parent(self.root) != SENTINEL {
            return false;
        }
        self.black_height(self.root).is_some()
    }

    /// Black-height of the subtree at `id` (counting the sentinel level),
    /// or `None` if any invariant is broken below `id`.
    fn black_height(&self, id: NodeId) -> Option<u32> {
        if id == SENTINEL {
            return Some(1);
        }

        let node = self.node(id);
        let (l, r) = (node.left, node.right);

        if node.color == Color::Red
            && (self.color(l) == Color::Red || self.color(r) == Color::Red)
        {
            return None;
        }
        if l != SENTINEL && (self.parent(l) != id || self.key_of(l) > self.key_of(id)) {
            return None;
        }
        if r != SENTINEL && (self.parent(r) != id || self.key_of(r) < self.key_of(id)) {
            return None;
        }

        let lh = self.black_height(l)?;
        let rh = self.black_height(r)?;
        if lh != rh {
            return None;
        }
        Some(lh + (node.color == Color::Black) as u32)
    }
}
