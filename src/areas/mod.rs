//! Storage-facing components
//!
//! - `database`: content-addressed object store (hashing, compression,
//!   write-if-absent, read-back parsing)
//! - `refs`: ref-file filesystem side effects
//! - `repository`: the context object tying the model to its storage

pub mod database;
pub mod refs;
pub mod repository;
