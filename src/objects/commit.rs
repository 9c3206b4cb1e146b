//! Commit objects: a root tree reference plus history linkage.
//!
//! A commit owns (or shares, after [`Commit::fork`]) a tree, an optional
//! path prefix selecting a subtree as the committed root, and zero or more
//! parent commits. Writing a commit persists its resolved subtree first,
//! then any still-unwritten parents, then the commit object itself.
//!
//! ## Persisted format
//!
//! ```text
//! commit <size>\0tree <tree-id>
//! parent <parent-id>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::errors::ModelError;
use crate::objects::object::{Object, Packable, Storable, Unpackable, frame};
use crate::objects::object_id::ObjectId;
use crate::objects::object_kind::ObjectKind;
use crate::objects::tree::TreeRef;
use anyhow::Context;
use bytes::Bytes;
use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;

/// Shared handle to a commit; parents are held through this handle.
pub type CommitRef = Rc<RefCell<Commit>>;

/// Author or committer information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Author {
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    /// Read author identity from `GIT_AUTHOR_NAME`/`GIT_AUTHOR_EMAIL`,
    /// falling back to a neutral placeholder when unset.
    pub fn from_env() -> Self {
        let name = std::env::var("GIT_AUTHOR_NAME").unwrap_or_else(|_| "unknown".to_string());
        let email =
            std::env::var("GIT_AUTHOR_EMAIL").unwrap_or_else(|_| "unknown@localhost".to_string());
        Author::new(name, email)
    }

    /// Persisted form: `Name <email> epoch offset`.
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // "Name <email> epoch offset"; split from the right so names may
        // contain spaces.
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            anyhow::bail!("invalid author line: {value}");
        }

        let offset = parts[0];
        let epoch = parts[1];
        let name_email = parts[2];

        let email_start = name_email
            .find('<')
            .context("invalid author line: missing '<'")?;
        let email_end = name_email
            .find('>')
            .context("invalid author line: missing '>'")?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let timestamp = chrono::DateTime::parse_from_str(&format!("{epoch} {offset}"), "%s %z")
            .map_err(|_| anyhow::anyhow!("invalid author timestamp: {epoch} {offset}"))?;

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// The serializable form of a commit: all identities resolved.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommitImage {
    pub tree_oid: ObjectId,
    pub parent_oids: Vec<ObjectId>,
    pub author: Author,
    pub committer: Author,
    pub message: String,
}

impl Packable for CommitImage {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parent_oids {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        frame(ObjectKind::Commit, lines.join("\n").as_bytes())
    }
}

impl Unpackable for CommitImage {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)?;
        let mut lines = content.lines();

        let tree_oid = lines
            .next()
            .and_then(|line| line.strip_prefix("tree "))
            .context("invalid commit object: missing tree line")?;
        let tree_oid = ObjectId::try_parse(tree_oid.to_string())?;

        let mut parent_oids = Vec::new();
        let mut next_line = lines
            .next()
            .context("invalid commit object: missing author line")?;
        while let Some(parent) = next_line.strip_prefix("parent ") {
            parent_oids.push(ObjectId::try_parse(parent.to_string())?);
            next_line = lines
                .next()
                .context("invalid commit object: missing author line")?;
        }

        let author = next_line
            .strip_prefix("author ")
            .context("invalid commit object: invalid author line")?;
        let author = Author::try_from(author)?;

        let committer = lines
            .next()
            .and_then(|line| line.strip_prefix("committer "))
            .context("invalid commit object: invalid committer line")?;
        let committer = Author::try_from(committer)?;

        // skip the blank separator line
        lines.next();
        let message = lines.collect::<Vec<&str>>().join("\n");

        Ok(CommitImage {
            tree_oid,
            parent_oids,
            author,
            committer,
            message,
        })
    }
}

impl Storable for CommitImage {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Commit
    }
}

/// A point-in-time snapshot: a tree (possibly narrowed to a prefix subtree)
/// plus parent commits.
#[derive(Debug)]
pub struct Commit {
    tree: Option<TreeRef>,
    tree_oid: Option<ObjectId>,
    prefix: String,
    parents: Vec<CommitRef>,
    author: Author,
    message: String,
    oid: Option<ObjectId>,
}

impl Commit {
    pub(crate) fn new(author: Author) -> Self {
        Commit {
            tree: None,
            tree_oid: None,
            prefix: String::new(),
            parents: Vec::new(),
            author,
            message: String::new(),
            oid: None,
        }
    }

    /// Rebuild a commit handle from its persisted image. The tree is not
    /// loaded — only its identity is recorded. Parents stay unloaded too;
    /// callers that need them follow `image.parent_oids` through the store.
    pub(crate) fn from_image(image: CommitImage, oid: ObjectId) -> Self {
        Commit {
            tree: None,
            tree_oid: Some(image.tree_oid),
            prefix: String::new(),
            parents: Vec::new(),
            author: image.author,
            message: image.message,
            oid: Some(oid),
        }
    }

    pub fn tree(&self) -> Option<&TreeRef> {
        self.tree.as_ref()
    }

    /// Identity of the committed tree, known after a write or a read-back.
    pub fn tree_oid(&self) -> Option<&ObjectId> {
        self.tree_oid.as_ref()
    }

    pub fn oid(&self) -> Option<&ObjectId> {
        self.oid.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn set_author(&mut self, author: Author) {
        self.author = author;
    }

    /// Narrow the committed root to the subtree at `prefix`.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn parents(&self) -> &[CommitRef] {
        &self.parents
    }

    pub fn add_parent(&mut self, parent: CommitRef) {
        self.parents.push(parent);
    }

    /// Route a path edit to the commit's tree, creating the root tree (named
    /// from the first path segment) on first use.
    pub fn update(&mut self, repo: &Repository, path: &str, object: Object) -> anyhow::Result<()> {
        let tree = match &self.tree {
            Some(tree) => tree.clone(),
            None => {
                let root_name = path
                    .split('/')
                    .find(|segment| !segment.is_empty())
                    .ok_or_else(|| {
                        ModelError::contract("cannot update a commit at an empty path")
                    })?;
                let tree = repo.create_tree(root_name);
                self.tree = Some(tree.clone());
                tree
            }
        };

        tree.borrow_mut().update(repo, path, object)
    }

    /// Remove the entry at `path` from the commit's tree, if any.
    pub fn remove(&mut self, path: &str) -> anyhow::Result<bool> {
        match &self.tree {
            Some(tree) => tree.borrow_mut().remove(path),
            None => Ok(false),
        }
    }

    /// Fork a new commit that shares this commit's tree and prefix, with
    /// `this` recorded as its sole parent. A structural branch point, not a
    /// deep copy: edits to the shared tree remain visible to both commits,
    /// so sharing is read-only by caller contract.
    pub fn fork(this: &CommitRef, repo: &Repository) -> CommitRef {
        let new_commit = repo.create_commit();
        {
            let this_commit = this.borrow();
            let mut commit = new_commit.borrow_mut();
            commit.tree = this_commit.tree.clone();
            commit.prefix = this_commit.prefix.clone();
        }
        new_commit.borrow_mut().add_parent(this.clone());
        new_commit
    }

    /// Persist this commit: the resolved subtree first, then any unwritten
    /// parents, then the commit object itself.
    pub fn write(&mut self, db: &Database) -> anyhow::Result<()> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| ModelError::contract("cannot write a commit with no tree"))?;

        let subtree = if self.prefix.is_empty() {
            tree.clone()
        } else {
            match tree.borrow().lookup(&self.prefix) {
                Some(Object::Tree(subtree)) => subtree,
                Some(Object::Blob(_)) => {
                    return Err(ModelError::contract(format!(
                        "commit prefix {} resolves to a blob",
                        self.prefix
                    )));
                }
                None => {
                    return Err(ModelError::contract(format!(
                        "commit prefix {} not found in tree",
                        self.prefix
                    )));
                }
            }
        };

        if subtree.borrow().is_hollow() {
            return Err(ModelError::contract("cannot write a commit with an empty tree"));
        }

        subtree.borrow_mut().write(db)?;
        let tree_oid = subtree
            .borrow()
            .oid()
            .cloned()
            .ok_or_else(|| ModelError::store("written tree has no identity"))?;

        let mut parent_oids = Vec::new();
        for parent in &self.parents {
            let mut parent = parent.borrow_mut();
            if parent.oid.is_none() {
                parent.write(db)?;
            }
            parent_oids.push(
                parent
                    .oid
                    .clone()
                    .ok_or_else(|| ModelError::store("written parent commit has no identity"))?,
            );
        }

        let image = CommitImage {
            tree_oid: tree_oid.clone(),
            parent_oids,
            author: self.author.clone(),
            committer: self.author.clone(),
            message: self.message.clone(),
        };

        self.tree_oid = Some(tree_oid);
        self.oid = Some(db.store(&image)?);
        Ok(())
    }
}
