//! Ref-file filesystem side effects.
//!
//! Refs are small text files under the repository metadata directory whose
//! content is an object identity (or a `ref: <path>` indirection for HEAD).
//! Writes create missing parent directories on demand, refuse to overwrite
//! anything that is not a regular file, and hold an exclusive lock while
//! truncating.

use crate::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;

#[derive(Debug, new)]
pub struct Refs {
    /// Repository metadata directory (typically `.git`)
    path: Box<Path>,
}

impl Refs {
    /// Write `content` to the ref file at `rel_path`, creating parent
    /// directories as needed. A path that exists but is not a regular file
    /// is a hard error.
    pub fn write_ref_file(&self, rel_path: &Path, content: &str) -> anyhow::Result<()> {
        let file_path = self.path.join(rel_path);

        let parent = file_path
            .parent()
            .context(format!("ref path {} has no parent", file_path.display()))?;
        std::fs::create_dir_all(parent).context(format!(
            "unable to create ref directories for {}",
            file_path.display()
        ))?;

        if file_path.exists() && !file_path.is_file() {
            anyhow::bail!(
                "{} already exists but is not a regular file",
                file_path.display()
            );
        }

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .context(format!("unable to open ref file {}", file_path.display()))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(content.as_bytes())?;

        Ok(())
    }

    /// Read the identity recorded at `rel_path`. `None` when the file does
    /// not exist, is empty, or holds a symbolic `ref: ` indirection.
    pub fn read_ref_file(&self, rel_path: &Path) -> anyhow::Result<Option<ObjectId>> {
        let file_path = self.path.join(rel_path);
        if !file_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&file_path)
            .context(format!("unable to read ref file {}", file_path.display()))?;
        let content = content.trim();

        if content.is_empty() || content.starts_with("ref: ") {
            return Ok(None);
        }

        Ok(Some(ObjectId::try_parse(content.to_string())?))
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join("HEAD").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.path.join("refs").join("heads").into_boxed_path()
    }
}
