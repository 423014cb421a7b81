//! # yamltree
//!
//! Low-allocation YAML document trees with a flat, index-addressed node
//! store and arena-backed scalars.
//!
//! ## Module Organization
//!
//! - [`tree`] - The document tree: node storage, hierarchy editing,
//!   reference resolution, tree merging
//! - [`parse`] - Single-pass YAML parser (borrowed and in-place modes)
//! - [`emit`] - Block-style YAML and compact JSON emitters
//! - [`span`] - Offset/length string spans and byte-slice helpers
//! - [`arena`] - Append-only byte arena for filtered scalars
//!
//! ## Quick Start
//!
//! ```
//! use yamltree::parse;
//!
//! let tree = parse("name: doc\nitems:\n  - 1\n  - 2").unwrap();
//! let root = tree.root_id();
//! assert_eq!(tree.val(tree.find_child(root, "name")), "doc");
//!
//! let items = tree.find_child(root, "items");
//! let vals: Vec<&str> = tree.children(items).map(|c| tree.val(c)).collect();
//! assert_eq!(vals, ["1", "2"]);
//! ```
//!
//! ## Design
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`] (an index;
//! [`NONE`] is the null id). Scalars are [`StrSpan`]s - offset/length pairs
//! into either the source text or the tree's arena, so a parsed tree holds
//! no per-scalar allocations. Anchors and aliases survive parsing as
//! reference nodes; [`Tree::resolve`] expands them in a second pass, and
//! [`Tree::reorder`] moves keys expanded from `<<` merge keys after the
//! explicitly written ones.
//!
//! Both parse modes are zero-copy for unfiltered scalars. [`parse`] borrows
//! an immutable source and commits filtered scalars (escapes, folded
//! breaks) to the arena; [`parse_in_place`] takes a mutable buffer and
//! writes filtered scalars back over their source bytes, which never grows
//! them.

// =============================================================================
// Modules
// =============================================================================

/// Append-only byte arena for filtered scalar storage.
pub mod arena;

/// Block-style YAML and compact JSON emitters.
pub mod emit;

/// Parse errors.
pub mod error;

/// Single-pass YAML parser.
pub mod parse;

/// String spans and byte-slice helpers.
pub mod span;

/// The document tree.
pub mod tree;

// =============================================================================
// Public re-exports
// =============================================================================

pub use arena::Arena;
pub use emit::{emit_json, emit_yaml, write_json, write_yaml};
pub use error::{Error, Result};
pub use parse::{parse, parse_in_place, Parser};
pub use span::{SpanKind, StrSpan};
pub use tree::{NodeId, NodeType, Tree, NONE};
