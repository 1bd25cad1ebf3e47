//! Arbor Tree - Tree Invariant Engine
//!
//! Keeps every document's `Depth` equal to the height of its subtree,
//! bounds `height + Depth` by the configured nesting level, and deletes
//! whole subtrees when a child is removed. [`DocumentService`] is the
//! entry point; [`TreeMutation`] carries one transaction's worth of
//! structural writes.

pub mod diff;
pub mod engine;
pub mod service;

pub use diff::{child_diff, find_duplicate, ChildDiff};
pub use engine::TreeMutation;
pub use service::{DocumentService, Placement};
