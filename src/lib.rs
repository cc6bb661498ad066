//! An ordered multiset built on a sentinel-based red-black tree.
//!
//! Nodes live in an index arena ([`arena`]), so the structure is safe Rust
//! throughout: parent/child links are slot indices, and a shared always-black
//! sentinel slot replaces null checks at every leaf and root boundary.

#![deny(unsafe_op_in_unsafe_fn)]

// node storage
pub mod arena;

// the balancing engine
pub mod tree;

pub use arena::{Color, NodeId, TreeError};
pub use tree::RbTree;
