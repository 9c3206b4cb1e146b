//! Object model: identities, entry modes, and the blob/tree/commit/branch
//! types built on top of them.
//!
//! All persisted objects share the framing `<kind> <size>\0<content>` and are
//! identified by the SHA-1 of that framed form:
//!
//! - `blob`: raw file content
//! - `tree`: sorted `<mode> <name>\0<20-byte id>` entries
//! - `commit`: tree id, parent ids, author/committer, message

pub mod blob;
pub mod branch;
pub mod commit;
pub mod entry_mode;
pub mod object;
pub mod object_id;
pub mod object_kind;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;
