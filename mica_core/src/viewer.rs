//! Read-only data contract for the repository viewer.
//!
//! The viewer renders what a branch has *published*; everything here
//! reads the published ref only, never the local one, and never writes
//! to the store or refs. Rendering (HTML, Markdown) is the viewer's own
//! job — this module hands it raw data.

use crate::commit::Commit;
use crate::error::Result;
use crate::hash::Hash;
use crate::object::ObjectKind;
use crate::repo::Repository;
use crate::tree::{self, EntryKind, FileMode};
use std::collections::BTreeMap;

/// One entry of a published tree, flattened to its path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ListingEntry {
    pub path: String,
    pub kind: EntryKind,
    pub mode: FileMode,
    pub hash: Hash,
}

/// Last-touching-commit metadata for a published path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PathCommit {
    pub path: String,
    pub commit: Hash,
    pub author: String,
    pub when: i64,
    pub message: String,
}

/// Published commit of a branch, or None when nothing is published.
fn published_head(repo: &Repository, branch: &str) -> Result<Option<Hash>> {
    repo.refs().published(branch)
}

fn commit_of(repo: &Repository, hash: &Hash) -> Result<Commit> {
    let (_, payload) = repo.store().read(hash, Some(ObjectKind::Commit))?;
    Commit::decode(&hash.to_hex(), &payload)
}

/// The file/folder listing of a branch's published tree, sorted by path.
///
/// An unpublished branch lists as empty rather than erroring, so the
/// viewer can render it as such.
pub fn published_listing(repo: &Repository, branch: &str) -> Result<Vec<ListingEntry>> {
    let Some(head) = published_head(repo, branch)? else {
        return Ok(Vec::new());
    };

    let commit = commit_of(repo, &head)?;
    let flat = tree::flatten(&repo.store(), &commit.tree)?;

    Ok(flat
        .into_iter()
        .map(|(path, entry)| ListingEntry {
            path,
            kind: entry.kind,
            mode: entry.mode,
            hash: entry.hash,
        })
        .collect())
}

/// Per-path metadata of the last commit touching each published file.
///
/// Scans first-parent history from the published head; a commit "touches"
/// a path when the path's blob hash differs from the first parent's (or
/// the path is absent there). The newest touching commit wins.
pub fn path_history(repo: &Repository, branch: &str) -> Result<Vec<PathCommit>> {
    let Some(head) = published_head(repo, branch)? else {
        return Ok(Vec::new());
    };

    let store = repo.store();
    let mut recorded: BTreeMap<String, PathCommit> = BTreeMap::new();

    for step in repo.history(head, None) {
        let (hash, commit) = step?;

        let current = file_map(&store, &commit.tree)?;
        let parent = match commit.parents.first() {
            Some(parent_hash) => {
                let parent_commit = commit_of(repo, parent_hash)?;
                file_map(&store, &parent_commit.tree)?
            }
            None => BTreeMap::new(),
        };

        for (path, blob) in current {
            if recorded.contains_key(&path) {
                continue;
            }
            if parent.get(&path) != Some(&blob) {
                recorded.insert(
                    path.clone(),
                    PathCommit {
                        path,
                        commit: hash,
                        author: commit.author.name.clone(),
                        when: commit.author.when,
                        message: commit.message.clone(),
                    },
                );
            }
        }
    }

    Ok(recorded.into_values().collect())
}

/// Raw bytes of a root-level `README.md` in the published tree, matched
/// case-insensitively.
pub fn readme(repo: &Repository, branch: &str) -> Result<Option<Vec<u8>>> {
    let Some(head) = published_head(repo, branch)? else {
        return Ok(None);
    };

    let commit = commit_of(repo, &head)?;
    let store = repo.store();

    let (_, payload) = store.read(&commit.tree, Some(ObjectKind::Tree))?;
    let entries = tree::decode_tree(&commit.tree.to_hex(), &payload)?;

    for entry in entries {
        if entry.kind == EntryKind::Blob && entry.name.eq_ignore_ascii_case("readme.md") {
            let (_, content) = store.read(&entry.hash, Some(ObjectKind::Blob))?;
            return Ok(Some(content));
        }
    }

    Ok(None)
}

/// Blob hashes of every file in a tree, keyed by path.
fn file_map(store: &crate::store::Store, root: &Hash) -> Result<BTreeMap<String, Hash>> {
    Ok(tree::flatten(store, root)?
        .into_iter()
        .filter(|(_, e)| e.kind == EntryKind::Blob)
        .map(|(path, e)| (path, e.hash))
        .collect())
}
