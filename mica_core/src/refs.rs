//! Branch, tag, and HEAD reference management.
//!
//! Each branch owns two refs: the *local* ref at `refs/heads/<branch>`
//! (latest committed state) and the *published* ref at
//! `refs/heads/<branch>.remote` (last state exposed externally). A ref
//! file holds a raw 40-hex commit hash, or is empty for a branch with no
//! commits. `refs/tags/<tag>` is a read namespace for resolution and
//! listings. `HEAD` holds `ref: refs/heads/<branch>` or a raw hash when
//! detached.

use crate::error::{Error, Result};
use crate::hash::Hash;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where HEAD currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Symbolic pointer to a branch name.
    Branch(String),
    /// Direct pointer to a commit hash.
    Detached(Hash),
}

/// Ref namespaces participating in name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Local branch heads.
    Local,
    /// Published branch pointers.
    Published,
    /// Tags.
    Tag,
}

/// A named ref with its resolved hash.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RefName {
    pub namespace: Namespace,
    pub name: String,
    pub hash: Hash,
}

impl RefName {
    /// Fully qualified form, e.g. `refs/heads/main` or
    /// `refs/heads/main.remote` or `refs/tags/v1`.
    pub fn qualified(&self) -> String {
        match self.namespace {
            Namespace::Local => format!("refs/heads/{}", self.name),
            Namespace::Published => format!("refs/heads/{}.remote", self.name),
            Namespace::Tag => format!("refs/tags/{}", self.name),
        }
    }

    /// Bare form used for exact-name matching.
    pub fn bare(&self) -> String {
        match self.namespace {
            Namespace::Local | Namespace::Tag => self.name.clone(),
            Namespace::Published => format!("{}.remote", self.name),
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.qualified(), self.hash.short())
    }
}

/// Manages branch refs, tags, and HEAD under the metadata directory.
#[derive(Debug, Clone)]
pub struct RefStore {
    meta: PathBuf,
}

impl RefStore {
    pub(crate) fn new(meta: PathBuf) -> Self {
        Self { meta }
    }

    fn heads_dir(&self) -> PathBuf {
        self.meta.join("refs").join("heads")
    }

    fn tags_dir(&self) -> PathBuf {
        self.meta.join("refs").join("tags")
    }

    fn head_path(&self) -> PathBuf {
        self.meta.join("HEAD")
    }

    /// Validate a branch or tag name.
    ///
    /// Names must be non-empty, free of path separators and `..`, and must
    /// not end in `.remote` (reserved for published refs).
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_ref("name cannot be empty"));
        }

        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(Error::invalid_ref(format!(
                "name '{}' must not contain path separators or '..'",
                name
            )));
        }

        if name.ends_with(".remote") {
            return Err(Error::invalid_ref(format!(
                "name '{}' uses the reserved '.remote' suffix",
                name
            )));
        }

        Ok(())
    }

    fn local_path(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(self.heads_dir().join(name))
    }

    fn published_path(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(self.heads_dir().join(format!("{}.remote", name)))
    }

    /// Create a branch with empty local and published refs.
    ///
    /// Fails with `AlreadyExists` if the branch's local ref is present.
    pub fn create_branch(&self, name: &str) -> Result<()> {
        let local = self.local_path(name)?;
        if local.exists() {
            return Err(Error::already_exists(name));
        }

        write_ref_file(&local, None)?;
        write_ref_file(&self.published_path(name)?, None)?;
        Ok(())
    }

    /// Check whether a branch has a local ref.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.local_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Read a branch's local commit pointer.
    ///
    /// `Ok(None)` means the branch exists but has no commits; a missing
    /// ref file is `NotFound`.
    pub fn local(&self, name: &str) -> Result<Option<Hash>> {
        let path = self.local_path(name)?;
        if !path.exists() {
            return Err(Error::not_found(format!("branch '{}'", name)));
        }
        read_ref_file(&path)
    }

    /// Read a branch's published commit pointer.
    ///
    /// `Ok(None)` when the branch has never been published.
    pub fn published(&self, name: &str) -> Result<Option<Hash>> {
        let path = self.published_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        read_ref_file(&path)
    }

    /// Point a branch's local ref at a commit.
    pub fn set_local(&self, name: &str, hash: &Hash) -> Result<()> {
        write_ref_file(&self.local_path(name)?, Some(hash))
    }

    /// Point a branch's published ref at a commit.
    pub fn set_published(&self, name: &str, hash: &Hash) -> Result<()> {
        write_ref_file(&self.published_path(name)?, Some(hash))
    }

    /// List local branch names, sorted.
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let heads = self.heads_dir();
        let mut branches = Vec::new();

        if !heads.exists() {
            return Ok(branches);
        }

        for entry in fs::read_dir(&heads)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str()
                && !name.ends_with(".remote")
            {
                branches.push(name.to_string());
            }
        }

        branches.sort();
        Ok(branches)
    }

    /// List every resolvable ref across the local, published, and tag
    /// namespaces, sorted by qualified name. Empty refs are omitted.
    pub fn list_all(&self) -> Result<Vec<RefName>> {
        let mut refs = Vec::new();

        for name in self.list_branches()? {
            if let Some(hash) = self.local(&name)? {
                refs.push(RefName {
                    namespace: Namespace::Local,
                    name: name.clone(),
                    hash,
                });
            }
            if let Some(hash) = self.published(&name)? {
                refs.push(RefName {
                    namespace: Namespace::Published,
                    name,
                    hash,
                });
            }
        }

        let tags = self.tags_dir();
        if tags.exists() {
            for entry in fs::read_dir(&tags)? {
                let entry = entry?;
                if !entry.path().is_file() {
                    continue;
                }
                let file_name = entry.file_name();
                if let Some(name) = file_name.to_str()
                    && let Some(hash) = read_ref_file(&entry.path())?
                {
                    refs.push(RefName {
                        namespace: Namespace::Tag,
                        name: name.to_string(),
                        hash,
                    });
                }
            }
        }

        refs.sort_by_key(|r| r.qualified());
        Ok(refs)
    }

    /// Read HEAD.
    pub fn head(&self) -> Result<Head> {
        let path = self.head_path();
        if !path.exists() {
            return Err(Error::not_found("HEAD"));
        }

        let content = fs::read_to_string(&path)?;
        let content = content.trim();

        if let Some(target) = content.strip_prefix("ref: ") {
            let name = target
                .strip_prefix("refs/heads/")
                .ok_or_else(|| Error::corrupt("HEAD", format!("unexpected target '{}'", target)))?;
            return Ok(Head::Branch(name.to_string()));
        }

        let hash = Hash::from_hex(content)
            .map_err(|_| Error::corrupt("HEAD", format!("unreadable content '{}'", content)))?;
        Ok(Head::Detached(hash))
    }

    /// Repoint HEAD at a branch.
    pub fn set_head_branch(&self, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        let path = self.head_path();
        fs::write(&path, format!("ref: refs/heads/{}\n", name))
            .map_err(|e| Error::unwritable(&path, e))
    }

    /// Detach HEAD onto a commit.
    pub fn set_head_detached(&self, hash: &Hash) -> Result<()> {
        let path = self.head_path();
        fs::write(&path, hash.to_hex()).map_err(|e| Error::unwritable(&path, e))
    }
}

fn read_ref_file(path: &Path) -> Result<Option<Hash>> {
    let content = fs::read_to_string(path)?;
    let content = content.trim();

    if content.is_empty() {
        return Ok(None);
    }

    let hash = Hash::from_hex(content).map_err(|_| {
        Error::corrupt(
            path.display().to_string(),
            format!("unreadable ref content '{}'", content),
        )
    })?;
    Ok(Some(hash))
}

fn write_ref_file(path: &Path, hash: Option<&Hash>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::unwritable(parent, e))?;
    }

    let content = hash.map(|h| h.to_hex()).unwrap_or_default();
    fs::write(path, content).map_err(|e| Error::unwritable(path, e))
}
