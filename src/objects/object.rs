//! Serialization traits and the tree-entry payload variant.

use crate::objects::blob::Blob;
use crate::objects::entry_mode::EntryMode;
use crate::objects::object_id::ObjectId;
use crate::objects::object_kind::ObjectKind;
use crate::objects::tree::TreeRef;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Write};

pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    /// Deserialize the object content; the framing header has already been
    /// consumed by [`ObjectKind::parse_header`].
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// A persistable object: framed content tagged with its kind. The identity
/// is derived from the serialized form by the database at store time.
pub trait Storable: Packable {
    fn kind(&self) -> ObjectKind;
}

/// Wrap object content in the shared `<kind> <size>\0` framing.
pub(crate) fn frame(kind: ObjectKind, content: &[u8]) -> Result<Bytes> {
    let mut framed = Vec::with_capacity(content.len() + 16);
    write!(framed, "{} {}\0", kind.as_str(), content.len())?;
    framed.write_all(content)?;
    Ok(Bytes::from(framed))
}

/// The payload of an in-memory tree entry.
///
/// A closed variant instead of downcast-based polymorphism: blobs are owned
/// values (their content is already persisted), subtrees are shared handles
/// so that forked commits can alias the same tree.
#[derive(Debug, Clone)]
pub enum Object {
    Blob(Blob),
    Tree(TreeRef),
}

impl Object {
    pub fn name(&self) -> String {
        match self {
            Object::Blob(blob) => blob.name().to_string(),
            Object::Tree(tree) => tree.borrow().name().to_string(),
        }
    }

    pub fn mode(&self) -> EntryMode {
        match self {
            Object::Blob(blob) => blob.mode(),
            Object::Tree(_) => EntryMode::Directory,
        }
    }

    /// The persisted identity, if the object has one yet. Blobs always do;
    /// a tree only after its last write.
    pub fn oid(&self) -> Option<ObjectId> {
        match self {
            Object::Blob(blob) => Some(blob.oid().clone()),
            Object::Tree(tree) => tree.borrow().oid().cloned(),
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Object::Blob(_))
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Object::Tree(_))
    }

    pub fn as_tree(&self) -> Option<TreeRef> {
        match self {
            Object::Tree(tree) => Some(tree.clone()),
            Object::Blob(_) => None,
        }
    }
}
