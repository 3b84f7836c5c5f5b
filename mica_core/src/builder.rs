//! Staged-list to tree construction.
//!
//! The builder groups a flat list of staged relative paths into a
//! directory arena keyed by path, then serializes directories
//! deepest-first so every subtree hash is written before its parent tree
//! is encoded. The arena keeps the walk iterative; deep hierarchies never
//! grow the call stack.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectKind;
use crate::store::Store;
use crate::tree::{self, EntryKind, TreeEntry, file_modes};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A file staged for the next tree, with its content already in hand.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Slash-separated path relative to the working tree root.
    pub path: String,
    /// Raw file content.
    pub content: Vec<u8>,
    /// Whether the file carries the executable bit.
    pub executable: bool,
}

/// A staged path that could not be included in the build.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedPath {
    pub path: String,
    pub reason: String,
}

/// Outcome of a tree build: the root hash plus any skipped files.
#[derive(Debug, serde::Serialize)]
pub struct BuildReport {
    /// Hash of the root tree.
    pub root: Hash,
    /// Staged paths skipped because they could not be read.
    pub skipped: Vec<SkippedPath>,
}

/// Per-directory accumulation while grouping staged paths.
#[derive(Default)]
struct DirNode {
    /// Completed file entries for this directory.
    files: Vec<TreeEntry>,
    /// Names of immediate child directories.
    subdirs: Vec<String>,
}

/// Build a tree from staged files whose content is already loaded.
///
/// Returns the root tree hash. The same staged set produces the same root
/// hash regardless of input order.
pub fn build_tree(store: &Store, files: Vec<StagedFile>) -> Result<Hash> {
    let mut arena: BTreeMap<String, DirNode> = BTreeMap::new();
    arena.insert(String::new(), DirNode::default());

    for file in files {
        let (dir, name) = split_path(&file.path)?;
        ensure_dirs(&mut arena, &dir);

        let blob = store.write(ObjectKind::Blob, &file.content)?;
        let mode = if file.executable {
            file_modes::EXECUTABLE
        } else {
            file_modes::REGULAR
        };

        let entry = TreeEntry::new(EntryKind::Blob, mode, blob, name)?;
        arena.entry(dir).or_default().files.push(entry);
    }

    // Serialize deepest directories first so child hashes exist before
    // their parent tree is encoded.
    let mut dirs: Vec<String> = arena.keys().cloned().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(depth(d)));

    let mut hashes: BTreeMap<String, Hash> = BTreeMap::new();
    for dir in dirs {
        let node = arena.get(&dir).unwrap();
        let mut entries = node.files.clone();

        for sub in &node.subdirs {
            let sub_path = join_path(&dir, sub);
            let sub_hash = hashes.get(&sub_path).copied().unwrap();
            entries.push(TreeEntry::new(
                EntryKind::Tree,
                file_modes::DIRECTORY,
                sub_hash,
                sub.clone(),
            )?);
        }

        let payload = tree::encode_tree(entries);
        let hash = store.write(ObjectKind::Tree, &payload)?;
        hashes.insert(dir, hash);
    }

    Ok(hashes[""])
}

/// Build a tree from staged paths, reading content from the working tree.
///
/// Per-file read failures are reported in the returned `BuildReport` and
/// skipped; the build continues for the remaining files.
pub fn build_from_worktree(store: &Store, workdir: &Path, paths: &[String]) -> Result<BuildReport> {
    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let disk_path = workdir.join(path);
        match fs::read(&disk_path) {
            Ok(content) => {
                let executable = is_executable(&disk_path);
                files.push(StagedFile {
                    path: path.clone(),
                    content,
                    executable,
                });
            }
            Err(e) => skipped.push(SkippedPath {
                path: path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let root = build_tree(store, files)?;
    Ok(BuildReport { root, skipped })
}

/// Split a staged path into its directory and file name, rejecting
/// absolute paths and traversal segments.
fn split_path(path: &str) -> Result<(String, String)> {
    if path.starts_with('/') || path.ends_with('/') {
        return Err(Error::invalid_entry(format!(
            "staged path '{}' must be relative",
            path
        )));
    }

    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(Error::invalid_entry(format!(
            "staged path '{}' contains a reserved segment",
            path
        )));
    }

    match path.rsplit_once('/') {
        Some((dir, name)) => Ok((dir.to_string(), name.to_string())),
        None => Ok((String::new(), path.to_string())),
    }
}

/// Make sure `dir` and all of its ancestors exist in the arena, linking
/// each to its parent exactly once. Iterative from the top down.
fn ensure_dirs(arena: &mut BTreeMap<String, DirNode>, dir: &str) {
    if dir.is_empty() {
        return;
    }

    let mut parent = String::new();
    for name in dir.split('/') {
        let current = join_path(&parent, name);

        if !arena.contains_key(&current) {
            let parent_node = arena.entry(parent.clone()).or_default();
            if !parent_node.subdirs.contains(&name.to_string()) {
                parent_node.subdirs.push(name.to_string());
            }
            arena.insert(current.clone(), DirNode::default());
        }

        parent = current;
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split('/').count()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}
