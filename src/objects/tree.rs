//! Tree objects and the lazy, minimal-rewrite persistence engine.
//!
//! A [`Tree`] keeps two views of a directory: the in-memory entry map that
//! path edits are routed through, and a [`TreeImage`], the persisted-form
//! entry list that mirrors what the object database holds (or will hold) for
//! this tree. Edits decide per case whether the image can be patched in
//! place — a blob content change, a rename — or whether the whole tree must
//! be rebuilt and rehashed: any change to the entry set, or the replacement
//! of a subtree, whose identity depends recursively on its own content.
//!
//! ## Dirty flags
//!
//! - `modified`: entries changed since the last write; cleared by `write`.
//! - `written`: the persisted object still mirrors the image entry-for-entry,
//!   so a write may reuse the patched image instead of rebuilding it.
//! - `sort_needed`: an in-place patch changed an entry's canonical sort key.
//!
//! Empty trees are never persisted and are elided from their parents.

use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::errors::ModelError;
use crate::objects::entry_mode::EntryMode;
use crate::objects::object::{Object, Packable, Storable, Unpackable, frame};
use crate::objects::object_id::ObjectId;
use crate::objects::object_kind::ObjectKind;
use anyhow::{Context, Result};
use bytes::Bytes;
use derive_new::new;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

/// Shared handle to a tree. Forked commits alias the same tree through this
/// handle; sharing is read-only by caller contract.
pub type TreeRef = Rc<RefCell<Tree>>;

/// A persisted tree entry: the (name, mode, identity) triple.
///
/// The identity is deferred (`None`) for a subtree that has not been written
/// yet; it is filled in when the owning tree is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    name: String,
    mode: EntryMode,
    oid: Option<ObjectId>,
}

impl TreeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn oid(&self) -> Option<&ObjectId> {
        self.oid.as_ref()
    }

    /// Directories sort as if their name had a trailing slash, which is how
    /// persisted trees order entries.
    fn canonical_key(&self) -> String {
        if self.mode.is_directory() {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// The persisted form of a tree under construction.
///
/// This is the entry-level mutation surface of the object store: entries can
/// be added, removed, renamed, and have their identity or mode patched
/// without touching their siblings. The owning [`Tree`] keeps the image's
/// name set mirrored with its entry map at all times, so a miss in any of
/// the patch operations signals a store inconsistency rather than an
/// expected absence.
#[derive(Debug, Default, Clone)]
pub struct TreeImage {
    entries: Vec<TreeEntry>,
}

impl TreeImage {
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    pub fn add_entry(&mut self, entry: TreeEntry) {
        self.entries.push(entry);
    }

    pub fn remove_entry(&mut self, name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ModelError::store(format!("no persisted entry named {name} to remove")))?;
        self.entries.remove(index);
        Ok(())
    }

    pub fn set_entry_id(&mut self, name: &str, oid: ObjectId) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ModelError::store(format!("no persisted entry named {name} to patch")))?;
        self.entries[index].oid = Some(oid);
        Ok(())
    }

    pub fn set_entry_mode(&mut self, name: &str, mode: EntryMode) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ModelError::store(format!("no persisted entry named {name} to patch")))?;
        self.entries[index].mode = mode;
        Ok(())
    }

    pub fn rename_entry(&mut self, name: &str, new_name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ModelError::store(format!("no persisted entry named {name} to rename")))?;
        self.entries[index].name = new_name.to_string();
        Ok(())
    }

    /// Canonical persisted order; applied at persistence time, not on edit.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by_key(|entry| entry.canonical_key());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Packable for TreeImage {
    fn serialize(&self) -> Result<Bytes> {
        let mut content = Vec::new();
        for entry in &self.entries {
            let oid = entry.oid.as_ref().ok_or_else(|| {
                ModelError::store(format!("entry {} has no identity to serialize", entry.name))
            })?;

            write!(content, "{} {}\0", entry.mode.as_str(), entry.name)?;
            oid.write_raw_to(&mut content)?;
        }

        frame(ObjectKind::Tree, &content)
    }
}

impl Unpackable for TreeImage {
    fn deserialize(reader: impl BufRead) -> Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if *mode_bytes.last().unwrap() != b' ' {
                anyhow::bail!("unexpected EOF in mode");
            }
            mode_bytes.pop(); // drop the space

            let mode = EntryMode::try_from(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || *name_bytes.last().unwrap() != b'\0' {
                anyhow::bail!("unexpected EOF in name");
            }
            name_bytes.pop(); // drop NUL
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_raw_from(&mut reader).context("unexpected EOF in object id")?;

            entries.push(TreeEntry::new(name, mode, Some(oid)));
        }

        Ok(TreeImage { entries })
    }
}

impl Storable for TreeImage {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Tree
    }
}

/// An ordered mapping of name to entry, with path-scoped edits and lazy,
/// minimal-diff persistence.
#[derive(Debug)]
pub struct Tree {
    name: String,
    entries: BTreeMap<String, Object>,
    image: TreeImage,
    oid: Option<ObjectId>,
    written: bool,
    modified: bool,
    sort_needed: bool,
}

impl Tree {
    pub(crate) fn new(name: &str) -> Self {
        Tree {
            name: name.to_string(),
            entries: BTreeMap::new(),
            image: TreeImage::default(),
            oid: None,
            written: false,
            modified: false,
            sort_needed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when nothing under this tree would survive persistence: no
    /// entries at all, or only subtrees that are themselves hollow.
    pub(crate) fn is_hollow(&self) -> bool {
        self.entries
            .values()
            .all(|object| object.as_tree().is_some_and(|t| t.borrow().is_hollow()))
    }

    /// The identity from the last write; stale whenever `written` is false.
    pub fn oid(&self) -> Option<&ObjectId> {
        self.oid.as_ref()
    }

    pub fn written(&self) -> bool {
        self.written
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Insert or replace `object` at a slash-delimited `path` relative to
    /// this tree, creating intermediate subtrees through the repository as
    /// needed.
    pub fn update(&mut self, repo: &Repository, path: &str, object: Object) -> Result<()> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(ModelError::contract("cannot update a tree at an empty path"));
        }
        self.do_update(repo, &segments, object)
    }

    fn do_update(&mut self, repo: &Repository, segments: &[&str], object: Object) -> Result<()> {
        let name = segments[0];
        self.modified = true;

        if segments.len() == 1 {
            if self.entries.contains_key(name) {
                self.replace_entry(name, object)
            } else {
                self.insert_entry(name, object)
            }
        } else {
            let subtree = match self.entries.get(name) {
                Some(Object::Tree(subtree)) => subtree.clone(),
                Some(Object::Blob(_)) => {
                    return Err(ModelError::contract(format!(
                        "cannot descend through blob entry {name}"
                    )));
                }
                None => {
                    let subtree = repo.create_tree(name);
                    self.image
                        .add_entry(TreeEntry::new(name.to_string(), EntryMode::Directory, None));
                    self.entries
                        .insert(name.to_string(), Object::Tree(subtree.clone()));
                    subtree
                }
            };

            subtree.borrow_mut().do_update(repo, &segments[1..], object)?;

            // A descendant's identity changed, so ours is stale too.
            self.written = false;
            Ok(())
        }
    }

    fn insert_entry(&mut self, name: &str, object: Object) -> Result<()> {
        if object.name() != name {
            return Err(ModelError::contract(format!(
                "object named {} inserted at path segment {name}",
                object.name()
            )));
        }

        // The persisted entry count changes: force a full rewrite.
        self.written = false;
        self.image
            .add_entry(TreeEntry::new(name.to_string(), object.mode(), object.oid()));
        self.entries.insert(name.to_string(), object);
        Ok(())
    }

    fn replace_entry(&mut self, name: &str, object: Object) -> Result<()> {
        match object {
            // A blob can be patched into the persisted entry in place; the
            // tree object itself only needs a shallow rewrite on the next
            // write, not a rebuild.
            Object::Blob(blob) => {
                let was_directory = self
                    .entries
                    .get(name)
                    .is_some_and(|existing| existing.is_tree());

                self.image.set_entry_id(name, blob.oid().clone())?;
                self.image.set_entry_mode(name, blob.mode())?;

                if blob.name() != name {
                    // Rename: re-key the entry, keep the persisted identity.
                    // Renaming onto an existing sibling displaces it; the
                    // entry count changes, so the image can no longer be
                    // patched shallowly.
                    if self.entries.contains_key(blob.name()) {
                        self.entries.remove(blob.name());
                        self.image.remove_entry(blob.name())?;
                        self.written = false;
                    }
                    self.sort_needed = true;
                    self.image.rename_entry(name, blob.name())?;
                    self.entries.remove(name);
                    self.entries
                        .insert(blob.name().to_string(), Object::Blob(blob));
                } else {
                    if was_directory {
                        // The canonical key loses its trailing slash.
                        self.sort_needed = true;
                    }
                    self.entries.insert(name.to_string(), Object::Blob(blob));
                }
                Ok(())
            }
            // Subtrees are never metadata-patched: their identity depends
            // recursively on their content, so replacing one rewrites us.
            object @ Object::Tree(_) => {
                if object.name() != name {
                    return Err(ModelError::contract(format!(
                        "subtree named {} replacing entry {name}",
                        object.name()
                    )));
                }
                self.written = false;
                self.entries.insert(name.to_string(), object);
                Ok(())
            }
        }
    }

    /// Remove the entry at `path` if present, pruning subtrees that become
    /// empty. Removing a path that was never added is a no-op (`Ok(false)`)
    /// that leaves every dirty flag untouched: the caller may legitimately
    /// remove a directory that was conceptually empty and never materialized.
    pub fn remove(&mut self, path: &str) -> Result<bool> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Ok(false);
        }
        self.do_remove(&segments)
    }

    fn do_remove(&mut self, segments: &[&str]) -> Result<bool> {
        let name = segments[0];
        let Some(existing) = self.entries.get(name) else {
            return Ok(false);
        };

        if segments.len() == 1 {
            self.modified = true;
            self.written = false;
            self.entries.remove(name);
            self.image.remove_entry(name)?;
        } else {
            // A blob at an intermediate segment means the path never existed
            // as a directory.
            let Some(subtree) = existing.as_tree() else {
                return Ok(false);
            };

            let removed = subtree.borrow_mut().do_remove(&segments[1..])?;
            if !removed {
                return Ok(false);
            }

            self.modified = true;
            self.written = false;
            if subtree.borrow().is_empty() {
                // Prune the now-empty directory from this level as well.
                self.entries.remove(name);
                self.image.remove_entry(name)?;
            }
        }

        Ok(true)
    }

    /// Look up the object at a slash-delimited path below this tree.
    pub fn lookup(&self, path: &str) -> Option<Object> {
        let segments = split_path(path);
        if segments.is_empty() {
            return None;
        }
        self.do_lookup(&segments)
    }

    fn do_lookup(&self, segments: &[&str]) -> Option<Object> {
        let object = self.entries.get(segments[0])?;
        if segments.len() == 1 {
            Some(object.clone())
        } else {
            object.as_tree()?.borrow().do_lookup(&segments[1..])
        }
    }

    /// Materialize this tree into the object database.
    ///
    /// Idempotent when nothing changed. A clean-but-modified tree re-writes
    /// only itself from its patched image; a structurally changed tree
    /// rebuilds the image from the entry map, writing unwritten subtrees
    /// first. Store failures abort without rollback.
    pub fn write(&mut self, db: &Database) -> Result<()> {
        if self.is_hollow() {
            // Empty trees are never persisted.
            return Ok(());
        }

        if self.written {
            if self.modified {
                if self.sort_needed {
                    self.image.sort_entries();
                    self.sort_needed = false;
                }
                self.oid = Some(db.store(&self.image)?);
            }
        } else {
            // A structural change happened somewhere below. Discard the
            // persisted entries and rebuild them from the in-memory map.
            // A subtree with no entries is elided from its parent entirely,
            // which keeps the map and the image mirrored after the write.
            self.entries
                .retain(|_, object| !object.as_tree().is_some_and(|t| t.borrow().is_hollow()));
            self.image.clear();

            for (name, object) in &self.entries {
                match object {
                    Object::Tree(subtree) => {
                        let mut subtree = subtree.borrow_mut();
                        // Subtrees must be durable before being referenced.
                        subtree.write(db)?;
                        self.image.add_entry(TreeEntry::new(
                            name.clone(),
                            EntryMode::Directory,
                            subtree.oid().cloned(),
                        ));
                    }
                    Object::Blob(blob) => {
                        self.image.add_entry(TreeEntry::new(
                            name.clone(),
                            blob.mode(),
                            Some(blob.oid().clone()),
                        ));
                    }
                }
            }

            self.image.sort_entries();
            self.sort_needed = false;
            self.oid = Some(db.store(&self.image)?);
        }

        self.written = true;
        self.modified = false;
        Ok(())
    }
}

/// Redundant separators are tolerated; segment routing only sees the
/// non-empty names.
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, mode: EntryMode) -> TreeEntry {
        TreeEntry::new(name.to_string(), mode, Some(ObjectId::hash(name.as_bytes())))
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        let mut image = TreeImage::default();
        image.add_entry(entry("foo", EntryMode::Directory));
        image.add_entry(entry("foo.txt", EntryMode::Regular));
        image.add_entry(entry("bar", EntryMode::Regular));
        image.sort_entries();

        let names: Vec<&str> = image.entries().iter().map(TreeEntry::name).collect();
        // '.' sorts before '/', so "foo.txt" precedes the directory "foo"
        assert_eq!(names, vec!["bar", "foo.txt", "foo"]);
    }

    #[test]
    fn patch_operations_require_a_persisted_entry() {
        let mut image = TreeImage::default();
        image.add_entry(entry("present", EntryMode::Regular));

        assert!(image.set_entry_id("absent", ObjectId::hash(b"x")).is_err());
        assert!(image.set_entry_mode("absent", EntryMode::Regular).is_err());
        assert!(image.rename_entry("absent", "other").is_err());
        assert!(image.remove_entry("absent").is_err());

        image.rename_entry("present", "renamed").unwrap();
        image.remove_entry("renamed").unwrap();
        assert!(image.entries().is_empty());
    }

    #[test]
    fn image_serialization_round_trips() {
        let mut image = TreeImage::default();
        image.add_entry(entry("README", EntryMode::Regular));
        image.add_entry(entry("src", EntryMode::Directory));
        image.sort_entries();

        let framed = image.serialize().unwrap();
        assert!(framed.starts_with(b"tree "));

        let mut reader = std::io::Cursor::new(framed);
        ObjectKind::parse_header(&mut reader).unwrap();
        let parsed = TreeImage::deserialize(reader).unwrap();
        assert_eq!(parsed.entries(), image.entries());
    }

    #[test]
    fn unwritten_subtree_entry_refuses_to_serialize() {
        let mut image = TreeImage::default();
        image.add_entry(TreeEntry::new("src".to_string(), EntryMode::Directory, None));
        assert!(image.serialize().is_err());
    }
}
