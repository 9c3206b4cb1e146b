//! Failure classes of the object model.
//!
//! Every fallible operation returns `anyhow::Result`; errors that originate
//! in this crate carry a [`ModelError`] so callers can tell a caller bug from
//! a corrupted store with `err.downcast_ref::<ModelError>()`. Filesystem
//! failures surface as `std::io::Error` wrapped with context.

/// Errors raised by the tree/commit model itself.
///
/// A `Contract` error means the caller violated an API precondition (for
/// example writing a commit with no tree, or a leaf object whose name does
/// not match its path). The operation aborts immediately and the object must
/// not be reused.
///
/// A `Store` error means the persisted image and the in-memory model
/// disagree. There is no rollback: a failed update/write leaves the dirty
/// flags indeterminate and the caller must rebuild from scratch.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("object store inconsistency: {0}")]
    Store(String),
}

impl ModelError {
    pub fn contract(message: impl Into<String>) -> anyhow::Error {
        ModelError::Contract(message.into()).into()
    }

    pub fn store(message: impl Into<String>) -> anyhow::Error {
        ModelError::Store(message.into()).into()
    }
}
