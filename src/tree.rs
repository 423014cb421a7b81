//! Flat node storage.
//!
//! A tree is a single growable array of fixed-size node records plus one
//! arena. Nodes are addressed by index; removal threads freed slots into a
//! free list (through the `next_sibling` field) for reuse, so node identity
//! is a stable integer for the node's live lifetime and nothing is ever
//! heap-allocated per node.
//!
//! Misuse of this API (indices out of range, illegal shape changes, reading
//! a key from a keyless node) is a programming error and panics; malformed
//! input never reaches this layer.

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::span::{SpanKind, StrSpan};

/// Index of a node within a [`Tree`].
pub type NodeId = usize;

/// Reserved sentinel index: "no node".
pub const NONE: NodeId = usize::MAX;

// ============================================================================
// NodeType
// ============================================================================

/// Bitmask describing a node's shape and attributes.
///
/// Exactly one of VAL/MAP/SEQ describes the shape; DOC/STREAM and the
/// tag/anchor/ref bits are orthogonal attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeType(pub u16);

impl NodeType {
    pub const NOTYPE: NodeType = NodeType(0);
    /// Leaf node with a (possibly empty) value.
    pub const VAL: NodeType = NodeType(1 << 0);
    /// Member of a map; has a key.
    pub const KEY: NodeType = NodeType(1 << 1);
    /// Parent of keyed children.
    pub const MAP: NodeType = NodeType(1 << 2);
    /// Parent of unkeyed children.
    pub const SEQ: NodeType = NodeType(1 << 3);
    /// A document.
    pub const DOC: NodeType = NodeType(1 << 4);
    /// A stream: a seq of docs.
    pub const STREAM: NodeType = NodeType((1 << 5) | (1 << 3));
    /// The key is a `*reference` to an anchor.
    pub const KEYREF: NodeType = NodeType(1 << 6);
    /// The val is a `*reference` to an anchor.
    pub const VALREF: NodeType = NodeType(1 << 7);
    /// The key has an `&anchor`.
    pub const KEYANCH: NodeType = NodeType(1 << 8);
    /// The val has an `&anchor`.
    pub const VALANCH: NodeType = NodeType(1 << 9);
    /// The key has an explicit tag.
    pub const KEYTAG: NodeType = NodeType(1 << 10);
    /// The val has an explicit tag.
    pub const VALTAG: NodeType = NodeType(1 << 11);
    /// Internal: node was inserted by merge-key expansion. Set by
    /// `resolve()`, consumed and cleared by `reorder()`.
    pub(crate) const MERGED: NodeType = NodeType(1 << 12);

    pub const KEYVAL: NodeType = NodeType(Self::KEY.0 | Self::VAL.0);

    #[inline]
    pub fn any(self, f: NodeType) -> bool {
        self.0 & f.0 != 0
    }

    #[inline]
    pub fn all(self, f: NodeType) -> bool {
        self.0 & f.0 == f.0
    }

    #[inline]
    pub fn add(&mut self, f: NodeType) {
        self.0 |= f.0;
    }

    #[inline]
    pub fn rem(&mut self, f: NodeType) {
        self.0 &= !f.0;
    }

    pub fn is_stream(self) -> bool {
        self.all(Self::STREAM)
    }
    pub fn is_doc(self) -> bool {
        self.any(Self::DOC)
    }
    pub fn is_container(self) -> bool {
        self.any(NodeType(Self::MAP.0 | Self::SEQ.0 | Self::STREAM.0 | Self::DOC.0))
    }
    pub fn is_map(self) -> bool {
        self.any(Self::MAP)
    }
    pub fn is_seq(self) -> bool {
        self.any(Self::SEQ)
    }
    pub fn has_val(self) -> bool {
        self.any(Self::VAL)
    }
    pub fn has_key(self) -> bool {
        self.any(Self::KEY)
    }
    pub fn is_val(self) -> bool {
        self.0 & Self::KEYVAL.0 == Self::VAL.0
    }
    pub fn is_keyval(self) -> bool {
        self.all(Self::KEYVAL)
    }
    pub fn has_key_tag(self) -> bool {
        self.all(NodeType(Self::KEY.0 | Self::KEYTAG.0))
    }
    pub fn has_val_tag(self) -> bool {
        self.any(Self::VALTAG) && self.any(NodeType(Self::VAL.0 | Self::MAP.0 | Self::SEQ.0))
    }
    pub fn has_key_anchor(self) -> bool {
        self.any(Self::KEYANCH)
    }
    pub fn has_val_anchor(self) -> bool {
        self.any(Self::VALANCH)
    }
    pub fn is_key_ref(self) -> bool {
        self.any(Self::KEYREF)
    }
    pub fn is_val_ref(self) -> bool {
        self.any(Self::VALREF)
    }
    pub fn is_ref(self) -> bool {
        self.any(NodeType(Self::KEYREF.0 | Self::VALREF.0))
    }
}

impl std::ops::BitOr for NodeType {
    type Output = NodeType;
    #[inline]
    fn bitor(self, rhs: NodeType) -> NodeType {
        NodeType(self.0 | rhs.0)
    }
}

// ============================================================================
// NodeData
// ============================================================================

/// One node record. Fixed size; lives in the tree's flat array.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeData {
    pub ty: NodeType,
    pub key: StrSpan,
    pub key_tag: StrSpan,
    pub key_anchor: StrSpan,
    pub val: StrSpan,
    pub val_tag: StrSpan,
    pub val_anchor: StrSpan,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Default for NodeData {
    fn default() -> Self {
        NodeData {
            ty: NodeType::NOTYPE,
            key: StrSpan::MISSING,
            key_tag: StrSpan::MISSING,
            key_anchor: StrSpan::MISSING,
            val: StrSpan::MISSING,
            val_tag: StrSpan::MISSING,
            val_anchor: StrSpan::MISSING,
            parent: NONE,
            first_child: NONE,
            last_child: NONE,
            prev_sibling: NONE,
            next_sibling: NONE,
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// A parsed (or hand-built) document tree.
///
/// The tree owns its node array and arena exclusively; the source buffer is
/// borrowed for `'s`. Scalars that needed no transformation during parsing
/// are spans into the source; transformed ones live in the arena. Cloning
/// deep-copies both buffers — spans are offsets, so the copy needs no
/// fixups and no partially-copied state is ever observable.
#[derive(Debug, Clone)]
pub struct Tree<'s> {
    nodes: Vec<NodeData>,
    size: usize,
    free_head: NodeId,
    free_tail: NodeId,
    arena: Arena,
    pub(crate) source: &'s [u8],
}

impl Default for Tree<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Tree<'s> {
    pub fn new() -> Self {
        Self::with_capacity(16, 0)
    }

    /// Pre-size node and arena storage for a known workload.
    pub fn with_capacity(node_capacity: usize, arena_capacity: usize) -> Self {
        let mut t = Tree {
            nodes: Vec::new(),
            size: 0,
            free_head: NONE,
            free_tail: NONE,
            arena: Arena::with_capacity(arena_capacity),
            source: &[],
        };
        t.reserve(node_capacity.max(1));
        let root = t.claim();
        debug_assert_eq!(root, 0);
        t
    }

    // ------------------------------------------------------------------
    // capacity
    // ------------------------------------------------------------------

    /// Grow the node array to at least `cap` slots, preserving content
    /// and indices.
    pub fn reserve(&mut self, cap: usize) {
        if cap <= self.nodes.len() {
            return;
        }
        let first_new = self.nodes.len();
        self.nodes.resize(cap, NodeData::default());
        for i in first_new..cap {
            self.free_push_tail(i);
        }
    }

    /// Live node count.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Node array length.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Free-list length: `capacity() - size()`.
    #[inline]
    pub fn slack(&self) -> usize {
        debug_assert!(self.nodes.len() >= self.size);
        self.nodes.len() - self.size
    }

    pub fn arena_size(&self) -> usize {
        self.arena.pos()
    }
    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }
    pub fn arena_slack(&self) -> usize {
        self.arena.slack()
    }

    pub fn reserve_arena(&mut self, cap: usize) {
        self.arena.reserve(cap);
    }

    /// Reset to a single empty root node. Keeps node capacity; does NOT
    /// clear the arena (see [`clear_arena`](Tree::clear_arena)).
    pub fn clear(&mut self) {
        let cap = self.nodes.len();
        self.size = 0;
        self.free_head = NONE;
        self.free_tail = NONE;
        for i in 0..cap {
            self.nodes[i] = NodeData::default();
            self.free_push_tail(i);
        }
        self.source = &[];
        let root = self.claim();
        debug_assert_eq!(root, 0);
    }

    /// Reset the arena's used length, keeping its allocation. All
    /// previously issued arena spans are semantically dead afterwards.
    #[inline]
    pub fn clear_arena(&mut self) {
        self.arena.clear();
    }

    // ------------------------------------------------------------------
    // free list / slot lifecycle
    // ------------------------------------------------------------------

    fn free_push_tail(&mut self, id: NodeId) {
        self.nodes[id].next_sibling = NONE;
        if self.free_tail != NONE {
            self.nodes[self.free_tail].next_sibling = id;
        } else {
            self.free_head = id;
        }
        self.free_tail = id;
    }

    fn claim(&mut self) -> NodeId {
        if self.free_head == NONE {
            let cap = (self.nodes.len() * 2).max(16);
            self.reserve(cap);
        }
        let id = self.free_head;
        self.free_head = self.nodes[id].next_sibling;
        if self.free_head == NONE {
            self.free_tail = NONE;
        }
        self.nodes[id] = NodeData::default();
        self.size += 1;
        id
    }

    /// Freed slots go to the head so the next claim reuses them while the
    /// never-used tail stays cold.
    fn release(&mut self, id: NodeId) {
        debug_assert!(id != NONE && id < self.nodes.len());
        self.nodes[id] = NodeData::default();
        self.nodes[id].next_sibling = self.free_head;
        if self.free_head == NONE {
            self.free_tail = id;
        }
        self.free_head = id;
        self.size -= 1;
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        assert!(id != NONE, "invalid node index");
        &self.nodes[id]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        assert!(id != NONE, "invalid node index");
        &mut self.nodes[id]
    }

    // ------------------------------------------------------------------
    // strings
    // ------------------------------------------------------------------

    /// Resolve a span issued by this tree to its bytes.
    pub fn span_bytes(&self, s: StrSpan) -> &[u8] {
        match s.kind {
            SpanKind::Missing => b"",
            SpanKind::Source => &self.source[s.off as usize..s.off as usize + s.len as usize],
            SpanKind::Arena => self.arena.get(s),
        }
    }

    fn span_str(&self, s: StrSpan) -> &str {
        std::str::from_utf8(self.span_bytes(s)).expect("scalar is not valid utf-8")
    }

    /// Copy a string into this tree's arena and return its span. This is
    /// how string content from outside the source buffer enters the tree.
    pub fn to_arena(&mut self, s: &str) -> StrSpan {
        self.arena.copy_in(s.as_bytes())
    }

    pub(crate) fn arena_copy(&mut self, bytes: &[u8]) -> StrSpan {
        self.arena.copy_in(bytes)
    }

    fn import_span(&mut self, src: &Tree<'_>, s: StrSpan) -> StrSpan {
        if s.is_missing() {
            return StrSpan::MISSING;
        }
        // never share buffers between trees
        let start = self.arena.pos();
        match s.kind {
            SpanKind::Missing => unreachable!(),
            SpanKind::Source => self
                .arena
                .extend(&src.source[s.off as usize..s.off as usize + s.len as usize]),
            SpanKind::Arena => self.arena.extend(src.arena.get(s)),
        }
        self.arena.span_from(start)
    }

    // ------------------------------------------------------------------
    // predicates and getters
    // ------------------------------------------------------------------

    #[inline]
    pub fn root_id(&self) -> NodeId {
        0
    }

    pub fn ty(&self, id: NodeId) -> NodeType {
        self.node(id).ty
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.node(id).parent == NONE
    }
    pub fn is_stream(&self, id: NodeId) -> bool {
        self.node(id).ty.is_stream()
    }
    pub fn is_doc(&self, id: NodeId) -> bool {
        self.node(id).ty.is_doc()
    }
    pub fn is_container(&self, id: NodeId) -> bool {
        self.node(id).ty.is_container()
    }
    pub fn is_map(&self, id: NodeId) -> bool {
        self.node(id).ty.is_map()
    }
    pub fn is_seq(&self, id: NodeId) -> bool {
        self.node(id).ty.is_seq()
    }
    pub fn has_val(&self, id: NodeId) -> bool {
        self.node(id).ty.has_val()
    }
    pub fn has_key(&self, id: NodeId) -> bool {
        self.node(id).ty.has_key()
    }
    pub fn is_val(&self, id: NodeId) -> bool {
        self.node(id).ty.is_val()
    }
    pub fn is_keyval(&self, id: NodeId) -> bool {
        self.node(id).ty.is_keyval()
    }
    pub fn has_key_tag(&self, id: NodeId) -> bool {
        self.node(id).ty.has_key_tag()
    }
    pub fn has_val_tag(&self, id: NodeId) -> bool {
        self.node(id).ty.has_val_tag()
    }
    pub fn has_key_anchor(&self, id: NodeId) -> bool {
        self.node(id).ty.has_key_anchor()
    }
    pub fn has_val_anchor(&self, id: NodeId) -> bool {
        self.node(id).ty.has_val_anchor()
    }
    pub fn is_key_ref(&self, id: NodeId) -> bool {
        self.node(id).ty.is_key_ref()
    }
    pub fn is_val_ref(&self, id: NodeId) -> bool {
        self.node(id).ty.is_val_ref()
    }
    pub fn is_ref(&self, id: NodeId) -> bool {
        self.node(id).ty.is_ref()
    }

    /// The node's key text. Panics if the node has no key.
    pub fn key(&self, id: NodeId) -> &str {
        assert!(self.has_key(id), "node has no key");
        self.span_str(self.node(id).key)
    }
    pub fn key_tag(&self, id: NodeId) -> &str {
        assert!(self.has_key_tag(id), "node has no key tag");
        self.span_str(self.node(id).key_tag)
    }
    pub fn key_anchor(&self, id: NodeId) -> &str {
        self.span_str(self.node(id).key_anchor)
    }

    /// The node's value text. Panics if the node has no value; a null
    /// value reads as `""` — use [`val_is_null`](Tree::val_is_null) to
    /// tell null from a present empty scalar.
    pub fn val(&self, id: NodeId) -> &str {
        assert!(self.has_val(id), "node has no val");
        self.span_str(self.node(id).val)
    }
    pub fn val_tag(&self, id: NodeId) -> &str {
        assert!(self.has_val_tag(id), "node has no val tag");
        self.span_str(self.node(id).val_tag)
    }
    pub fn val_anchor(&self, id: NodeId) -> &str {
        self.span_str(self.node(id).val_anchor)
    }

    /// True when the node's value is absent (`key:`, `key: ~`, `key: null`),
    /// as opposed to a present zero-length scalar (`key: ''`).
    pub fn val_is_null(&self, id: NodeId) -> bool {
        assert!(self.has_val(id), "node has no val");
        self.node(id).val.is_missing()
    }

    // ------------------------------------------------------------------
    // hierarchy
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> NodeId {
        self.node(id).parent
    }
    pub fn first_child(&self, id: NodeId) -> NodeId {
        self.node(id).first_child
    }
    pub fn last_child(&self, id: NodeId) -> NodeId {
        self.node(id).last_child
    }
    pub fn prev_sibling(&self, id: NodeId) -> NodeId {
        self.node(id).prev_sibling
    }
    pub fn next_sibling(&self, id: NodeId) -> NodeId {
        self.node(id).next_sibling
    }
    pub fn has_parent(&self, id: NodeId) -> bool {
        self.node(id).parent != NONE
    }
    pub fn has_children(&self, id: NodeId) -> bool {
        self.node(id).first_child != NONE
    }

    /// O(number of children).
    pub fn num_children(&self, id: NodeId) -> usize {
        let mut n = 0;
        let mut ch = self.first_child(id);
        while ch != NONE {
            n += 1;
            ch = self.next_sibling(ch);
        }
        n
    }

    /// Child at ordinal position `pos` (linear scan), or `NONE`.
    pub fn child(&self, id: NodeId, pos: usize) -> NodeId {
        let mut ch = self.first_child(id);
        let mut i = 0;
        while ch != NONE && i < pos {
            ch = self.next_sibling(ch);
            i += 1;
        }
        ch
    }

    /// First child whose key equals `key` (linear scan), or `NONE`.
    pub fn find_child(&self, id: NodeId, key: &str) -> NodeId {
        let mut ch = self.first_child(id);
        while ch != NONE {
            if self.has_key(ch) && self.span_bytes(self.node(ch).key) == key.as_bytes() {
                return ch;
            }
            ch = self.next_sibling(ch);
        }
        NONE
    }

    pub fn has_child(&self, id: NodeId, key: &str) -> bool {
        self.find_child(id, key) != NONE
    }

    /// An iterator over a node's children.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut ch = self.first_child(id);
        std::iter::from_fn(move || {
            if ch == NONE {
                return None;
            }
            let cur = ch;
            ch = self.next_sibling(ch);
            Some(cur)
        })
    }

    // ------------------------------------------------------------------
    // structure mutation
    // ------------------------------------------------------------------

    /// Allocate a node and link it as a child of `parent`, after sibling
    /// `after` (`NONE` inserts as first child).
    pub fn insert_child(&mut self, parent: NodeId, after: NodeId) -> NodeId {
        assert!(parent != NONE, "invalid parent");
        assert!(
            self.is_container(parent) || self.is_root(parent) || self.ty(parent) == NodeType::NOTYPE,
            "parent cannot hold children"
        );
        assert!(after == NONE || self.parent(after) == parent);
        let child = self.claim();
        self.set_hierarchy(child, parent, after);
        child
    }

    pub fn append_child(&mut self, parent: NodeId) -> NodeId {
        let last = self.last_child(parent);
        self.insert_child(parent, last)
    }

    pub fn prepend_child(&mut self, parent: NodeId) -> NodeId {
        self.insert_child(parent, NONE)
    }

    pub fn insert_sibling(&mut self, node: NodeId, after: NodeId) -> NodeId {
        assert!(!self.is_root(node), "root has no siblings");
        self.insert_child(self.parent(node), after)
    }

    fn set_hierarchy(&mut self, child: NodeId, parent: NodeId, after: NodeId) {
        let (prev, next) = if after != NONE {
            (after, self.nodes[after].next_sibling)
        } else {
            (NONE, self.nodes[parent].first_child)
        };
        {
            let c = &mut self.nodes[child];
            c.parent = parent;
            c.prev_sibling = prev;
            c.next_sibling = next;
        }
        if prev != NONE {
            self.nodes[prev].next_sibling = child;
        } else {
            self.nodes[parent].first_child = child;
        }
        if next != NONE {
            self.nodes[next].prev_sibling = child;
        } else {
            self.nodes[parent].last_child = child;
        }
    }

    fn rem_hierarchy(&mut self, node: NodeId) {
        let (parent, prev, next) = {
            let n = &self.nodes[node];
            (n.parent, n.prev_sibling, n.next_sibling)
        };
        if prev != NONE {
            self.nodes[prev].next_sibling = next;
        } else if parent != NONE {
            self.nodes[parent].first_child = next;
        }
        if next != NONE {
            self.nodes[next].prev_sibling = prev;
        } else if parent != NONE {
            self.nodes[parent].last_child = prev;
        }
        let n = &mut self.nodes[node];
        n.parent = NONE;
        n.prev_sibling = NONE;
        n.next_sibling = NONE;
    }

    /// Detach `node` and return it and all its descendants to the free
    /// list. Freed indices are reused by later allocations.
    pub fn remove(&mut self, node: NodeId) {
        assert!(!self.is_root(node), "cannot remove the root");
        self.remove_children(node);
        self.rem_hierarchy(node);
        self.release(node);
    }

    /// Remove all of `node`'s children, keeping the node.
    pub fn remove_children(&mut self, node: NodeId) {
        let mut ch = self.first_child(node);
        while ch != NONE {
            let next = self.next_sibling(ch);
            self.remove_children(ch);
            self.rem_hierarchy(ch);
            self.release(ch);
            ch = next;
        }
    }

    /// Change the node's position among its siblings.
    pub fn move_node(&mut self, node: NodeId, after: NodeId) {
        let parent = self.parent(node);
        assert!(parent != NONE);
        assert!(after == NONE || (after != node && self.parent(after) == parent));
        self.rem_hierarchy(node);
        self.set_hierarchy(node, parent, after);
    }

    /// Change the node's parent and position.
    pub fn move_to(&mut self, node: NodeId, new_parent: NodeId, after: NodeId) {
        assert!(node != NONE && new_parent != NONE);
        assert!(after == NONE || self.parent(after) == new_parent);
        self.rem_hierarchy(node);
        self.set_hierarchy(node, new_parent, after);
    }

    // ------------------------------------------------------------------
    // shape mutators
    // ------------------------------------------------------------------

    fn set_shape(&mut self, id: NodeId, ty: NodeType) {
        // changing shape must not silently drop children
        if ty.any(NodeType::VAL) {
            assert!(!self.has_children(id), "cannot set a value on a node with children");
        }
        self.node_mut(id).ty = ty;
    }

    pub fn to_val(&mut self, id: NodeId, val: StrSpan) {
        self.set_shape(id, NodeType::VAL);
        self.node_mut(id).val = val;
    }

    pub fn to_keyval(&mut self, id: NodeId, key: StrSpan, val: StrSpan) {
        self.set_shape(id, NodeType::KEYVAL);
        let n = self.node_mut(id);
        n.key = key;
        n.val = val;
    }

    pub fn to_map(&mut self, id: NodeId) {
        assert!(!self.has_val(id), "cannot turn a val into a map");
        self.set_shape(id, NodeType::MAP);
    }

    pub fn to_map_with_key(&mut self, id: NodeId, key: StrSpan) {
        assert!(!self.has_val(id), "cannot turn a val into a map");
        self.set_shape(id, NodeType::KEY | NodeType::MAP);
        self.node_mut(id).key = key;
    }

    pub fn to_seq(&mut self, id: NodeId) {
        assert!(!self.has_val(id), "cannot turn a val into a seq");
        self.set_shape(id, NodeType::SEQ);
    }

    pub fn to_seq_with_key(&mut self, id: NodeId, key: StrSpan) {
        assert!(!self.has_val(id), "cannot turn a val into a seq");
        self.set_shape(id, NodeType::KEY | NodeType::SEQ);
        self.node_mut(id).key = key;
    }

    pub fn to_doc(&mut self, id: NodeId) {
        self.node_mut(id).ty.add(NodeType::DOC);
    }

    pub fn to_stream(&mut self, id: NodeId) {
        self.node_mut(id).ty.add(NodeType::STREAM);
    }

    pub fn set_key(&mut self, id: NodeId, key: StrSpan) {
        self.node_mut(id).key = key;
        self.node_mut(id).ty.add(NodeType::KEY);
    }

    pub fn set_val(&mut self, id: NodeId, val: StrSpan) {
        assert!(!self.has_children(id), "cannot set a value on a node with children");
        self.node_mut(id).val = val;
        self.node_mut(id).ty.add(NodeType::VAL);
    }

    pub fn set_key_tag(&mut self, id: NodeId, tag: StrSpan) {
        self.node_mut(id).key_tag = tag;
        self.node_mut(id).ty.add(NodeType::KEYTAG);
    }

    pub fn set_val_tag(&mut self, id: NodeId, tag: StrSpan) {
        self.node_mut(id).val_tag = tag;
        self.node_mut(id).ty.add(NodeType::VALTAG);
    }

    pub fn set_key_anchor(&mut self, id: NodeId, anchor: StrSpan) {
        assert!(!self.is_key_ref(id));
        self.node_mut(id).key_anchor = anchor;
        self.node_mut(id).ty.add(NodeType::KEYANCH);
    }

    pub fn set_val_anchor(&mut self, id: NodeId, anchor: StrSpan) {
        assert!(!self.is_val_ref(id));
        self.node_mut(id).val_anchor = anchor;
        self.node_mut(id).ty.add(NodeType::VALANCH);
    }

    pub fn set_key_ref(&mut self, id: NodeId, reference: StrSpan) {
        assert!(!self.has_key_anchor(id));
        self.node_mut(id).key_anchor = reference;
        self.node_mut(id).ty.add(NodeType::KEYREF);
    }

    pub fn set_val_ref(&mut self, id: NodeId, reference: StrSpan) {
        assert!(!self.has_val_anchor(id));
        self.node_mut(id).val_anchor = reference;
        self.node_mut(id).ty.add(NodeType::VALREF);
    }

    fn rem_anchor_ref(&mut self, id: NodeId) {
        let n = self.node_mut(id);
        n.key_anchor = StrSpan::MISSING;
        n.val_anchor = StrSpan::MISSING;
        n.ty.rem(NodeType::KEYANCH | NodeType::VALANCH | NodeType::KEYREF | NodeType::VALREF);
    }

    // ------------------------------------------------------------------
    // duplication
    // ------------------------------------------------------------------

    /// Recursively duplicate `node` (same tree) under `new_parent`, after
    /// sibling `after`. Spans are shared; both copies read the same string
    /// storage.
    pub fn duplicate(&mut self, node: NodeId, new_parent: NodeId, after: NodeId) -> NodeId {
        assert!(node != NONE && new_parent != NONE);
        assert!(!self.is_root(node), "cannot duplicate the root");
        let copy = self.insert_child(new_parent, after);
        self.copy_props(copy, node);
        let mut prev = NONE;
        let mut ch = self.first_child(node);
        while ch != NONE {
            prev = self.duplicate(ch, copy, prev);
            ch = self.next_sibling(ch);
        }
        copy
    }

    fn copy_props(&mut self, dst: NodeId, src: NodeId) {
        let s = *self.node(src);
        let d = self.node_mut(dst);
        d.ty = s.ty;
        d.key = s.key;
        d.key_tag = s.key_tag;
        d.key_anchor = s.key_anchor;
        d.val = s.val;
        d.val_tag = s.val_tag;
        d.val_anchor = s.val_anchor;
    }

    /// Duplicate the children of `node` (not the node) into `parent`,
    /// after `after`. Returns the last duplicated child.
    pub fn duplicate_children(&mut self, node: NodeId, parent: NodeId, after: NodeId) -> NodeId {
        let mut prev = after;
        let mut ch = self.first_child(node);
        while ch != NONE {
            prev = self.duplicate(ch, parent, prev);
            ch = self.next_sibling(ch);
        }
        prev
    }

    /// Like [`duplicate_children`](Tree::duplicate_children), but omits
    /// repetitions by key (in maps): a key already present in `parent`
    /// keeps its value and its place.
    pub fn duplicate_children_no_rep(
        &mut self,
        node: NodeId,
        parent: NodeId,
        after: NodeId,
    ) -> NodeId {
        self.duplicate_children_override(node, parent, after, false)
    }

    /// The override rule behind `<<` merge-key expansion: an explicitly
    /// written key always outranks a merged-in one and stays where it is,
    /// while a key merged in by an earlier source is overridden by a
    /// later source.
    fn duplicate_children_override(
        &mut self,
        node: NodeId,
        parent: NodeId,
        after: NodeId,
        mark_merged: bool,
    ) -> NodeId {
        let mut prev = after;
        let mut ch = self.first_child(node);
        while ch != NONE {
            let next = self.next_sibling(ch);
            if self.is_seq(parent) {
                prev = self.duplicate(ch, parent, prev);
                if mark_merged {
                    self.node_mut(prev).ty.add(NodeType::MERGED);
                }
            } else {
                debug_assert!(self.is_map(parent));
                // look for an existing child with the same key
                let mut rep = NONE;
                let mut j = self.first_child(parent);
                while j != NONE {
                    if self.has_key(j)
                        && self.span_bytes(self.node(j).key) == self.span_bytes(self.node(ch).key)
                    {
                        rep = j;
                        break;
                    }
                    j = self.next_sibling(j);
                }
                if rep == NONE {
                    prev = self.duplicate(ch, parent, prev);
                    if mark_merged {
                        self.node_mut(prev).ty.add(NodeType::MERGED);
                    }
                } else if self.node(rep).ty.any(NodeType::MERGED) {
                    // merged in by an earlier source: the later source wins
                    if rep == prev {
                        prev = self.prev_sibling(rep);
                    }
                    self.remove(rep);
                    prev = self.duplicate(ch, parent, prev);
                    if mark_merged {
                        self.node_mut(prev).ty.add(NodeType::MERGED);
                    }
                }
                // otherwise the key was written explicitly: it wins,
                // and keeps its place
            }
            ch = next;
        }
        prev
    }

    /// Copy `src`'s value side (and children) into `node`, keeping
    /// `node`'s key side intact.
    fn duplicate_contents(&mut self, src: NodeId, node: NodeId) {
        let s = *self.node(src);
        {
            let d = self.node_mut(node);
            // keep the key side of `node`
            let keep = NodeType(
                d.ty.0
                    & (NodeType::KEY.0
                        | NodeType::KEYTAG.0
                        | NodeType::KEYANCH.0
                        | NodeType::KEYREF.0),
            );
            let take = NodeType(
                s.ty.0
                    & (NodeType::VAL.0
                        | NodeType::MAP.0
                        | NodeType::SEQ.0
                        | NodeType::VALTAG.0),
            );
            d.ty = NodeType(keep.0 | take.0);
            d.val = s.val;
            d.val_tag = s.val_tag;
        }
        if !s.ty.has_val() {
            self.duplicate_children(src, node, self.last_child(node));
        }
    }

    // ------------------------------------------------------------------
    // resolve / reorder
    // ------------------------------------------------------------------

    /// Resolve aliases and merge keys.
    ///
    /// This is a second pass over the built tree, separate from scanning:
    /// it walks the whole tree in serialization order gathering anchors
    /// and references, resolving each reference to the most recent prior
    /// definition of its anchor, then substitutes the anchored subtrees —
    /// plain aliases become copies, `<<` entries expand into the
    /// containing map with explicit keys taking precedence (and, among
    /// merge sources, the last one winning).
    pub fn resolve(&mut self) -> Result<()> {
        if self.size == 0 {
            return Ok(());
        }

        #[derive(Debug, Clone, Copy)]
        struct RefData {
            node: NodeId,
            target: NodeId,
            /// set when the node is an element of a `<<: [*a, *b]` seq
            parent_ref: NodeId,
            is_key_ref: bool,
        }

        let mut refs: Vec<RefData> = Vec::new();
        let mut anchored: Vec<NodeId> = Vec::new();
        {
            // anchor name -> most recent defining node, in visit order
            let mut anchors: IndexMap<&[u8], NodeId> = IndexMap::new();

            fn lookup(
                anchors: &IndexMap<&[u8], NodeId>,
                tree: &Tree<'_>,
                name: StrSpan,
            ) -> Result<NodeId> {
                let name = tree.span_bytes(name);
                anchors.get(name).copied().ok_or_else(|| Error::UndefinedAnchor {
                    name: String::from_utf8_lossy(name).into_owned(),
                })
            }

            fn walk<'a>(
                tree: &'a Tree<'_>,
                n: NodeId,
                anchors: &mut IndexMap<&'a [u8], NodeId>,
                refs: &mut Vec<RefData>,
                anchored: &mut Vec<NodeId>,
            ) -> Result<()> {
                let nd = tree.node(n);
                if nd.ty.has_key_anchor() || nd.ty.has_val_anchor() {
                    anchored.push(n);
                    if nd.ty.has_key_anchor() {
                        anchors.insert(tree.span_bytes(nd.key_anchor), n);
                    }
                    if nd.ty.has_val_anchor() {
                        anchors.insert(tree.span_bytes(nd.val_anchor), n);
                    }
                }
                let is_merge_key = nd.ty.has_key() && tree.span_bytes(nd.key) == b"<<";
                if nd.ty.is_key_ref() {
                    refs.push(RefData {
                        node: n,
                        target: lookup(anchors, tree, nd.key_anchor)?,
                        parent_ref: NONE,
                        is_key_ref: true,
                    });
                }
                if nd.ty.is_val_ref() || (is_merge_key && nd.ty.is_seq()) {
                    if nd.ty.is_seq() {
                        // <<: [*a, *b] -- each element is a reference
                        let mut ch = tree.first_child(n);
                        while ch != NONE {
                            let cd = tree.node(ch);
                            refs.push(RefData {
                                node: ch,
                                target: lookup(anchors, tree, cd.val_anchor)?,
                                parent_ref: n,
                                is_key_ref: false,
                            });
                            ch = tree.next_sibling(ch);
                        }
                        return Ok(());
                    }
                    refs.push(RefData {
                        node: n,
                        target: lookup(anchors, tree, nd.val_anchor)?,
                        parent_ref: NONE,
                        is_key_ref: false,
                    });
                    return Ok(());
                }
                let mut ch = tree.first_child(n);
                while ch != NONE {
                    walk(tree, ch, anchors, refs, anchored)?;
                    ch = tree.next_sibling(ch);
                }
                Ok(())
            }

            walk(self, self.root_id(), &mut anchors, &mut refs, &mut anchored)?;
        }

        if refs.is_empty() && anchored.is_empty() {
            return Ok(());
        }

        // strip anchor/ref marks first, so expanded copies come out clean
        for &n in &anchored {
            self.rem_anchor_ref(n);
        }

        let mut removals: Vec<NodeId> = Vec::new();
        let mut prev_parent_ref = NONE;
        let mut prev_after = NONE;
        for rd in &refs {
            if rd.parent_ref != NONE {
                // element of a merge list; expand after the `<<` entry,
                // each source after the previous one, later sources
                // overriding keys merged in by earlier ones
                let p = self.parent(rd.parent_ref);
                let after = if prev_parent_ref != rd.parent_ref {
                    rd.parent_ref
                } else {
                    prev_after
                };
                prev_parent_ref = rd.parent_ref;
                prev_after = self.duplicate_children_override(rd.target, p, after, true);
                if !removals.contains(&rd.parent_ref) {
                    removals.push(rd.parent_ref);
                }
            } else if rd.is_key_ref {
                let t = *self.node(rd.target);
                let key = if t.ty.has_val() { t.val } else { t.key };
                self.node_mut(rd.node).key = key;
                self.node_mut(rd.node).ty.rem(NodeType::KEYREF);
                self.node_mut(rd.node).key_anchor = StrSpan::MISSING;
            } else if self.has_key(rd.node) && self.span_bytes(self.node(rd.node).key) == b"<<" {
                // <<: *a
                let p = self.parent(rd.node);
                let after = self.prev_sibling(rd.node);
                self.duplicate_children_override(rd.target, p, after, true);
                self.remove(rd.node);
            } else {
                // plain alias: substitute a copy of the anchored subtree
                self.node_mut(rd.node).ty.rem(NodeType::VALREF);
                self.node_mut(rd.node).val_anchor = StrSpan::MISSING;
                self.node_mut(rd.node).val = StrSpan::MISSING;
                self.node_mut(rd.node).ty.rem(NodeType::VAL);
                self.duplicate_contents(rd.target, rd.node);
            }
        }
        for n in removals {
            self.remove(n);
        }
        Ok(())
    }

    /// Normalize merged maps: within every map touched by merge-key
    /// expansion, reorder children so explicit keys come first in their
    /// original order, followed by merged-in keys in merge-list order.
    /// Makes merged and hand-written equivalents structurally equal.
    pub fn reorder(&mut self) {
        self.reorder_node(self.root_id());
    }

    fn reorder_node(&mut self, n: NodeId) {
        if self.is_map(n) {
            let children: Vec<NodeId> = self.children(n).collect();
            let (merged, explicit): (Vec<NodeId>, Vec<NodeId>) = children
                .iter()
                .copied()
                .partition(|&c| self.node(c).ty.any(NodeType::MERGED));
            if !merged.is_empty() {
                let mut prev = NONE;
                for &c in explicit.iter().chain(&merged) {
                    self.move_node(c, prev);
                    prev = c;
                }
                for &c in &merged {
                    self.node_mut(c).ty.rem(NodeType::MERGED);
                }
            }
        }
        let mut ch = self.first_child(n);
        while ch != NONE {
            let next = self.next_sibling(ch);
            self.reorder_node(ch);
            ch = next;
        }
    }

    // ------------------------------------------------------------------
    // tree merging
    // ------------------------------------------------------------------

    /// Deep-merge another tree into this one at the root: scalar values
    /// override (last applied wins), maps merge recursively, sequences
    /// concatenate. All incoming strings are copied into this tree's
    /// arena; no buffer is ever shared between trees.
    pub fn merge_with(&mut self, src: &Tree<'_>) {
        self.merge_node(src, src.root_id(), self.root_id());
    }

    fn merge_node(&mut self, src: &Tree<'_>, sn: NodeId, dn: NodeId) {
        if src.has_val(sn) {
            if !self.has_val(dn) && self.has_children(dn) {
                self.remove_children(dn);
            }
            let val = self.import_span(src, src.node(sn).val);
            let val_tag = self.import_span(src, src.node(sn).val_tag);
            let d = self.node_mut(dn);
            d.ty.rem(NodeType::MAP | NodeType::SEQ);
            d.ty.add(NodeType::VAL);
            d.val = val;
            d.val_tag = val_tag;
            if src.node(sn).val_tag.is_present() {
                self.node_mut(dn).ty.add(NodeType::VALTAG);
            }
            if src.is_keyval(sn) {
                let key = self.import_span(src, src.node(sn).key);
                self.node_mut(dn).key = key;
                self.node_mut(dn).ty.add(NodeType::KEY);
            }
        } else if src.is_seq(sn) {
            if !self.is_seq(dn) {
                if self.has_children(dn) {
                    self.remove_children(dn);
                }
                let d = self.node_mut(dn);
                d.ty.rem(NodeType::MAP | NodeType::VAL);
                d.val = StrSpan::MISSING;
                d.ty.add(NodeType::SEQ);
            }
            let mut sch = src.first_child(sn);
            while sch != NONE {
                let dch = self.append_child(dn);
                self.merge_node(src, sch, dch);
                sch = src.next_sibling(sch);
            }
        } else if src.is_map(sn) {
            if !self.is_map(dn) {
                if self.has_children(dn) {
                    self.remove_children(dn);
                }
                let d = self.node_mut(dn);
                d.ty.rem(NodeType::SEQ | NodeType::VAL);
                d.val = StrSpan::MISSING;
                d.ty.add(NodeType::MAP);
            }
            let mut sch = src.first_child(sn);
            while sch != NONE {
                let skey = src.key(sch);
                let mut dch = self.find_child(dn, skey);
                if dch == NONE {
                    dch = self.append_child(dn);
                    let key = self.import_span(src, src.node(sch).key);
                    self.node_mut(dch).key = key;
                    self.node_mut(dch).ty.add(NodeType::KEY);
                }
                self.merge_node(src, sch, dch);
                sch = src.next_sibling(sch);
            }
        }
    }
}

// ============================================================================
// structural equality
// ============================================================================

/// Two trees compare equal iff every node pair in matching tree order has
/// the same shape and flag bits, the same presence and content of
/// key/value/tag/anchor strings, and the same children, recursively.
/// Which buffer a string lives in (source vs arena) does not matter.
impl PartialEq for Tree<'_> {
    fn eq(&self, other: &Self) -> bool {
        eq_subtree(self, self.root_id(), other, other.root_id())
    }
}

impl Eq for Tree<'_> {}

fn eq_subtree(a: &Tree<'_>, an: NodeId, b: &Tree<'_>, bn: NodeId) -> bool {
    let x = a.node(an);
    let y = b.node(bn);
    if NodeType(x.ty.0 & !NodeType::MERGED.0) != NodeType(y.ty.0 & !NodeType::MERGED.0) {
        return false;
    }
    let spans = [
        (x.key, y.key),
        (x.key_tag, y.key_tag),
        (x.key_anchor, y.key_anchor),
        (x.val, y.val),
        (x.val_tag, y.val_tag),
        (x.val_anchor, y.val_anchor),
    ];
    for (sa, sb) in spans {
        if sa.is_missing() != sb.is_missing() {
            return false;
        }
        if a.span_bytes(sa) != b.span_bytes(sb) {
            return false;
        }
    }
    let mut ca = a.first_child(an);
    let mut cb = b.first_child(bn);
    while ca != NONE && cb != NONE {
        if !eq_subtree(a, ca, b, cb) {
            return false;
        }
        ca = a.next_sibling(ca);
        cb = b.next_sibling(cb);
    }
    ca == NONE && cb == NONE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyval<'s>(t: &mut Tree<'s>, parent: NodeId, k: &str, v: &str) -> NodeId {
        let id = t.append_child(parent);
        let k = t.to_arena(k);
        let v = t.to_arena(v);
        t.to_keyval(id, k, v);
        id
    }

    #[test]
    fn test_capacity_invariant() {
        let mut t = Tree::new();
        assert_eq!(t.size() + t.slack(), t.capacity());
        let root = t.root_id();
        t.to_map(root);
        for i in 0..40 {
            keyval(&mut t, root, &format!("k{}", i), "v");
            assert_eq!(t.size() + t.slack(), t.capacity());
        }
        let victim = t.find_child(root, "k7");
        t.remove(victim);
        assert_eq!(t.size() + t.slack(), t.capacity());
    }

    #[test]
    fn test_append_and_find() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        keyval(&mut t, 0, "a", "1");
        keyval(&mut t, 0, "b", "2");
        keyval(&mut t, 0, "c", "3");
        assert_eq!(t.num_children(0), 3);
        let b = t.find_child(0, "b");
        assert!(b != NONE);
        assert_eq!(t.val(b), "2");
        assert_eq!(t.find_child(0, "zzz"), NONE);
        assert_eq!(t.child(0, 2), t.find_child(0, "c"));
    }

    #[test]
    fn test_sibling_links_consistent() {
        let mut t = Tree::new();
        t.to_seq(t.root_id());
        let a = t.append_child(0);
        let b = t.append_child(0);
        let c = t.append_child(0);
        assert_eq!(t.first_child(0), a);
        assert_eq!(t.last_child(0), c);
        assert_eq!(t.next_sibling(a), b);
        assert_eq!(t.prev_sibling(c), b);
        assert_eq!(t.prev_sibling(b), a);
        assert_eq!(t.next_sibling(b), c);
        t.remove(b);
        assert_eq!(t.next_sibling(a), c);
        assert_eq!(t.prev_sibling(c), a);
    }

    #[test]
    fn test_insert_child_positions() {
        let mut t = Tree::new();
        t.to_seq(t.root_id());
        let a = t.append_child(0);
        let c = t.append_child(0);
        let b = t.insert_child(0, a);
        assert_eq!(t.next_sibling(a), b);
        assert_eq!(t.next_sibling(b), c);
        let first = t.prepend_child(0);
        assert_eq!(t.first_child(0), first);
    }

    #[test]
    fn test_remove_recycles_slots() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        let a = keyval(&mut t, 0, "a", "1");
        let size_before = t.size();
        let cap_before = t.capacity();
        t.remove(a);
        assert_eq!(t.size(), size_before - 1);
        let b = keyval(&mut t, 0, "b", "2");
        // freed index was reused, no growth
        assert_eq!(b, a);
        assert_eq!(t.capacity(), cap_before);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        for i in 0..50 {
            keyval(&mut t, 0, &format!("k{}", i), "v");
        }
        let cap = t.capacity();
        t.clear();
        assert_eq!(t.size(), 1); // just the root
        assert_eq!(t.capacity(), cap);
        assert_eq!(t.size() + t.slack(), t.capacity());
    }

    #[test]
    fn test_null_vs_empty_val() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        let a = t.append_child(0);
        let k = t.to_arena("a");
        t.to_keyval(a, k, StrSpan::MISSING);
        let b = t.append_child(0);
        let k = t.to_arena("b");
        let v = t.to_arena("");
        t.to_keyval(b, k, v);
        assert!(t.val_is_null(a));
        assert!(!t.val_is_null(b));
        assert_eq!(t.val(a), "");
        assert_eq!(t.val(b), "");
    }

    #[test]
    #[should_panic(expected = "cannot set a value on a node with children")]
    fn test_to_val_with_children_panics() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        keyval(&mut t, 0, "a", "1");
        let v = t.to_arena("x");
        t.to_val(0, v);
    }

    #[test]
    fn test_duplicate_subtree() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        let m = t.append_child(0);
        let k = t.to_arena("m");
        t.to_map_with_key(m, k);
        keyval(&mut t, m, "x", "1");
        keyval(&mut t, m, "y", "2");
        let copy = t.duplicate(m, 0, m);
        assert_eq!(t.num_children(0), 2);
        assert_eq!(t.num_children(copy), 2);
        let x = t.find_child(copy, "x");
        assert_eq!(t.val(x), "1");
    }

    #[test]
    fn test_structural_equality_ignores_buffers() {
        let mut a = Tree::new();
        a.to_map(a.root_id());
        keyval(&mut a, 0, "k", "v");
        let mut b = Tree::new();
        b.to_map(b.root_id());
        keyval(&mut b, 0, "k", "v");
        assert_eq!(a, b);
        keyval(&mut b, 0, "extra", "1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_merge_with_scalar_override() {
        let mut acc = Tree::new();
        acc.to_map(acc.root_id());
        keyval(&mut acc, 0, "a", "0");

        let mut src = Tree::new();
        src.to_map(src.root_id());
        keyval(&mut src, 0, "a", "1");
        keyval(&mut src, 0, "b", "1");

        acc.merge_with(&src);
        assert_eq!(acc.num_children(0), 2);
        assert_eq!(acc.val(acc.find_child(0, "a")), "1");
        assert_eq!(acc.val(acc.find_child(0, "b")), "1");
    }

    #[test]
    fn test_merge_with_seq_concat() {
        let mut acc = Tree::new();
        acc.to_seq(acc.root_id());
        for v in ["0", "1", "2"] {
            let c = acc.append_child(0);
            let v = acc.to_arena(v);
            acc.to_val(c, v);
        }
        let mut src = Tree::new();
        src.to_seq(src.root_id());
        for v in ["1", "2", "3"] {
            let c = src.append_child(0);
            let v = src.to_arena(v);
            src.to_val(c, v);
        }
        acc.merge_with(&src);
        let vals: Vec<String> = acc.children(0).map(|c| acc.val(c).to_string()).collect();
        assert_eq!(vals, ["0", "1", "2", "1", "2", "3"]);
    }

    #[test]
    fn test_merge_with_nested_maps() {
        let mut acc = Tree::new();
        acc.to_map(acc.root_id());
        let m = acc.append_child(0);
        let k = acc.to_arena("nested");
        acc.to_map_with_key(m, k);
        keyval(&mut acc, m, "x", "1");

        let mut src = Tree::new();
        src.to_map(src.root_id());
        let m2 = src.append_child(0);
        let k = src.to_arena("nested");
        src.to_map_with_key(m2, k);
        keyval(&mut src, m2, "y", "2");

        acc.merge_with(&src);
        let m = acc.find_child(0, "nested");
        assert_eq!(acc.num_children(m), 2);
        assert_eq!(acc.val(acc.find_child(m, "x")), "1");
        assert_eq!(acc.val(acc.find_child(m, "y")), "2");
    }

    #[test]
    fn test_arena_independence_after_merge() {
        let mut src = Tree::new();
        src.to_map(src.root_id());
        keyval(&mut src, 0, "k", "value");
        let mut acc = Tree::new();
        acc.to_map(acc.root_id());
        acc.merge_with(&src);
        drop(src);
        // acc must have copied the strings, not shared them
        assert_eq!(acc.val(acc.find_child(0, "k")), "value");
    }

    #[test]
    fn test_resolve_simple_alias() {
        // base: &B hello
        // other: *B
        let mut t = Tree::new();
        t.to_map(t.root_id());
        let base = keyval(&mut t, 0, "base", "hello");
        let anch = t.to_arena("B");
        t.set_val_anchor(base, anch);
        let other = t.append_child(0);
        let k = t.to_arena("other");
        t.to_keyval(other, k, StrSpan::MISSING);
        let r = t.to_arena("B");
        t.set_val_ref(other, r);

        t.resolve().unwrap();
        assert_eq!(t.val(t.find_child(0, "other")), "hello");
        assert!(!t.has_val_anchor(t.find_child(0, "base")));
    }

    #[test]
    fn test_resolve_undefined_anchor() {
        let mut t = Tree::new();
        t.to_map(t.root_id());
        let n = t.append_child(0);
        let k = t.to_arena("x");
        t.to_keyval(n, k, StrSpan::MISSING);
        let r = t.to_arena("nope");
        t.set_val_ref(n, r);
        match t.resolve() {
            Err(Error::UndefinedAnchor { name }) => assert_eq!(name, "nope"),
            other => panic!("expected UndefinedAnchor, got {:?}", other),
        }
    }
}
