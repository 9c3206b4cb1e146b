//! Content-addressed object database.
//!
//! Objects are stored zlib-compressed under `objects/<first-2>/<rest-38>` of
//! their SHA-1 identity. Writes are if-absent (identical content is already
//! durable under the same path) and atomic: content lands in a temp file
//! that is renamed into place.

use crate::objects::blob::BlobData;
use crate::objects::commit::CommitImage;
use crate::objects::object::{Storable, Unpackable};
use crate::objects::object_id::ObjectId;
use crate::objects::object_kind::ObjectKind;
use crate::objects::tree::{TreeEntry, TreeImage};
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Canonicalize and persist an object, returning its content-derived
    /// identity. Writing the same content twice is a no-op.
    pub fn store(&self, object: &impl Storable) -> anyhow::Result<ObjectId> {
        let content = object.serialize()?;
        let oid = ObjectId::hash(&content);
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            std::fs::create_dir_all(
                object_path
                    .parent()
                    .context(format!("invalid object path {}", object_path.display()))?,
            )
            .context(format!(
                "unable to create object directory {}",
                object_path.display()
            ))?;

            self.write_object(object_path, content)
                .context(format!("unable to store {} object {oid}", object.kind()))?;
        }

        Ok(oid)
    }

    /// Retrieve and decompress a previously written object.
    pub fn load(&self, oid: &ObjectId) -> anyhow::Result<Bytes> {
        self.read_object(self.path.join(oid.to_path()))
    }

    /// Load an object and consume its framing header, returning the kind and
    /// a reader positioned at the content.
    pub fn open_object(&self, oid: &ObjectId) -> anyhow::Result<(ObjectKind, impl BufRead)> {
        let content = self.load(oid)?;
        let mut reader = Cursor::new(content);
        let kind = ObjectKind::parse_header(&mut reader)?;
        Ok((kind, reader))
    }

    pub fn parse_blob(&self, oid: &ObjectId) -> anyhow::Result<Option<BlobData>> {
        let (kind, reader) = self.open_object(oid)?;
        match kind {
            ObjectKind::Blob => Ok(Some(BlobData::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_tree(&self, oid: &ObjectId) -> anyhow::Result<Option<TreeImage>> {
        let (kind, reader) = self.open_object(oid)?;
        match kind {
            ObjectKind::Tree => Ok(Some(TreeImage::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_commit(&self, oid: &ObjectId) -> anyhow::Result<Option<CommitImage>> {
        let (kind, reader) = self.open_object(oid)?;
        match kind {
            ObjectKind::Commit => Ok(Some(CommitImage::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    /// Resolve a slash-delimited path against a stored tree, walking stored
    /// subtrees as needed. `Ok(None)` when any segment is missing or a
    /// non-directory appears mid-path.
    pub fn entry_at(&self, tree_oid: &ObjectId, path: &str) -> anyhow::Result<Option<TreeEntry>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(None);
        }

        let mut current = tree_oid.clone();
        for (index, segment) in segments.iter().enumerate() {
            let Some(image) = self.parse_tree(&current)? else {
                return Ok(None);
            };
            let Some(entry) = image
                .entries()
                .iter()
                .find(|entry| entry.name() == *segment)
                .cloned()
            else {
                return Ok(None);
            };

            if index == segments.len() - 1 {
                return Ok(Some(entry));
            }
            if !entry.mode().is_directory() {
                return Ok(None);
            }
            current = entry
                .oid()
                .cloned()
                .context("stored tree entry has no identity")?;
        }

        unreachable!("loop returns on the final segment")
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let content = std::fs::read(&object_path).context(format!(
            "unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(content.into())
    }

    fn write_object(&self, object_path: PathBuf, content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let content = Self::compress(content)?;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_object_path)
            .context(format!(
                "unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&content).context(format!(
            "unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(Bytes::from)
            .context("unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("unable to decompress object content")?;

        Ok(decompressed.into())
    }

    fn generate_temp_name() -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos())
            .unwrap_or_default();
        format!("tmp-obj-{}-{nanos}", std::process::id())
    }
}
