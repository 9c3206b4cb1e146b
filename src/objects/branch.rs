//! Branches: named, mutable pointers to commits.
//!
//! Updating a branch writes the commit graph and then records the commit's
//! identity in a plain text file at `refs/heads/<name>` under the repository
//! metadata directory.

use crate::areas::repository::Repository;
use crate::errors::ModelError;
use crate::objects::commit::CommitRef;
use std::path::{Path, PathBuf};

/// A validated branch name.
///
/// Follows the reference naming rules: hierarchical names are allowed
/// (`feature/login`), but names may not be empty, start with a dot or a
/// slash, end with a slash or `.lock`, or contain `..`, `/.`, `@{`, control
/// characters, or glob/ref-syntax characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();

        if name.is_empty() {
            anyhow::bail!("branch name cannot be empty");
        }
        if name.starts_with('.') || name.starts_with('/') {
            anyhow::bail!("branch name {name} cannot start with '.' or '/'");
        }
        if name.ends_with('/') || name.ends_with(".lock") {
            anyhow::bail!("branch name {name} cannot end with '/' or '.lock'");
        }
        if name.contains("..") || name.contains("/.") || name.contains("@{") {
            anyhow::bail!("branch name {name} contains a forbidden sequence");
        }
        if name
            .chars()
            .any(|c| c.is_control() || matches!(c, ' ' | '*' | ':' | '?' | '[' | '\\' | '^' | '~'))
        {
            anyhow::bail!("branch name {name} contains a forbidden character");
        }

        Ok(Self(name))
    }

    /// Ref file location relative to the repository metadata directory.
    pub fn as_ref_path(&self) -> PathBuf {
        Path::new("refs").join("heads").join(&self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named pointer to a commit.
#[derive(Debug)]
pub struct Branch {
    name: BranchName,
    commit: Option<CommitRef>,
}

impl Branch {
    pub(crate) fn new(name: BranchName) -> Self {
        Branch { name, commit: None }
    }

    pub fn name(&self) -> &BranchName {
        &self.name
    }

    pub fn commit(&self) -> Option<&CommitRef> {
        self.commit.as_ref()
    }

    /// Point this branch at `commit`: persist the commit graph, then record
    /// the commit identity at `refs/heads/<name>`.
    pub fn update(&mut self, repo: &Repository, commit: CommitRef) -> anyhow::Result<()> {
        commit.borrow_mut().write(repo.database())?;

        let oid = commit
            .borrow()
            .oid()
            .cloned()
            .ok_or_else(|| ModelError::store("written commit has no identity"))?;
        self.commit = Some(commit);

        repo.create_file(&self.name.as_ref_path(), oid.as_ref())
    }
}
