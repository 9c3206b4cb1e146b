//! Lazy tree/commit builder over a content-addressed object store.
//!
//! `twig` is the in-memory object model of a git-style object graph: callers
//! build a directory tree path-by-path ([`objects::tree::Tree::update`] /
//! [`objects::tree::Tree::remove`]) and the model materializes it into the
//! object database only on demand, rewriting as few objects as possible.
//! Commits wrap a tree (optionally a subtree selected by a path prefix) plus
//! parent commits; branches are named refs recorded as small files.
//!
//! The entry point is [`areas::repository::Repository`], the explicit context
//! object that constructs trees, commits, blobs, and branches and owns every
//! filesystem side effect.

pub mod areas;
pub mod errors;
pub mod objects;
