//! The repository context object.
//!
//! Factory for trees, commits, blobs, and branches, and the single point of
//! filesystem side effects (ref file creation). One `Repository` is created
//! per working session and threaded explicitly through every operation that
//! needs storage; there is no global state.

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::errors::ModelError;
use crate::objects::blob::{Blob, BlobData};
use crate::objects::branch::{Branch, BranchName};
use crate::objects::commit::{Author, Commit, CommitRef};
use crate::objects::entry_mode::EntryMode;
use crate::objects::object_id::ObjectId;
use crate::objects::tree::{Tree, TreeRef};
use bytes::Bytes;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

pub struct Repository {
    path: Box<Path>,
    database: Database,
    refs: Refs,
}

impl Repository {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let path = path.canonicalize()?;
        let git_path = path.join(".git");

        Ok(Repository {
            database: Database::new(git_path.join("objects").into_boxed_path()),
            refs: Refs::new(git_path.into_boxed_path()),
            path: path.into_boxed_path(),
        })
    }

    /// Create the metadata layout: `.git/objects`, `.git/refs/heads`, and a
    /// HEAD symref. Safe to call on an already-initialized repository.
    pub fn init(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.database.objects_path())?;
        std::fs::create_dir_all(self.refs.heads_path())?;

        if !self.refs.head_path().exists() {
            self.create_file(Path::new("HEAD"), "ref: refs/heads/main\n")?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn create_tree(&self, name: &str) -> TreeRef {
        Rc::new(RefCell::new(Tree::new(name)))
    }

    pub fn create_commit(&self) -> CommitRef {
        Rc::new(RefCell::new(Commit::new(Author::from_env())))
    }

    /// Persist `content` as a blob and return the identified leaf object,
    /// ready to be placed in a tree under `name`.
    pub fn create_blob(
        &self,
        name: &str,
        content: impl Into<Bytes>,
        mode: EntryMode,
    ) -> anyhow::Result<Blob> {
        if mode.is_directory() {
            return Err(ModelError::contract(format!(
                "blob {name} cannot carry a directory mode"
            )));
        }

        let data = BlobData(content.into());
        let oid = self.database.store(&data)?;
        Ok(Blob::new(name.to_string(), mode, data.0, oid))
    }

    pub fn create_branch(&self, name: &str) -> anyhow::Result<Branch> {
        Ok(Branch::new(BranchName::try_parse(name)?))
    }

    /// Write a pointer file below the metadata directory; parent directories
    /// are created on demand, and a collision with anything that is not a
    /// regular file is a hard error.
    pub fn create_file(&self, rel_path: &Path, content: &str) -> anyhow::Result<()> {
        self.refs.write_ref_file(rel_path, content)
    }

    /// Load a commit object by identity. Tree contents are deliberately not
    /// loaded: the handle records the tree identity only, and callers walk
    /// the database when they need entries.
    pub fn read_commit(&self, oid: &ObjectId) -> anyhow::Result<CommitRef> {
        let image = self
            .database
            .parse_commit(oid)?
            .ok_or_else(|| ModelError::store(format!("object {oid} is not a commit")))?;

        Ok(Rc::new(RefCell::new(Commit::from_image(image, oid.clone()))))
    }
}
