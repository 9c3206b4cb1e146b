//! Leaf object holding opaque file content.
//!
//! Blobs enter the model through [`Repository::create_blob`], which persists
//! their content immediately: a blob inside a tree therefore always carries
//! its identity, which is what makes the tree-entry patch fast path possible.
//!
//! [`Repository::create_blob`]: crate::areas::repository::Repository::create_blob

use crate::objects::entry_mode::EntryMode;
use crate::objects::object::{Packable, Storable, Unpackable, frame};
use crate::objects::object_id::ObjectId;
use crate::objects::object_kind::ObjectKind;
use bytes::Bytes;
use std::io::BufRead;

/// An identified leaf object: entry name, file mode, content, and the
/// identity of the persisted content.
#[derive(Debug, Clone)]
pub struct Blob {
    name: String,
    mode: EntryMode,
    content: Bytes,
    oid: ObjectId,
}

impl Blob {
    pub(crate) fn new(name: String, mode: EntryMode, content: Bytes, oid: ObjectId) -> Self {
        Blob {
            name,
            mode,
            content,
            oid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }
}

/// Serialized form of blob content, before it is tied to a name inside a
/// tree. This is the unit the database stores and parses back.
#[derive(Debug, Clone)]
pub struct BlobData(pub Bytes);

impl Packable for BlobData {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(ObjectKind::Blob, &self.0)
    }
}

impl Unpackable for BlobData {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        Ok(BlobData(Bytes::from(content)))
    }
}

impl Storable for BlobData {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Blob
    }
}
