//! Working-tree restoration.
//!
//! Materializes a commit's tree onto the filesystem. Files present on
//! disk but absent from the target tree are moved — never deleted — into
//! a quarantine directory under the metadata directory, preserving their
//! relative paths. Restoration is best-effort and explicitly
//! non-transactional: a failure on one file is reported and does not
//! abort the rest.

use crate::builder::SkippedPath;
use crate::commit::Commit;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectKind;
use crate::repo::{META_DIR, Repository};
use crate::tree::{self, EntryKind, file_modes};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a working-tree restoration.
#[derive(Debug, Default, serde::Serialize)]
pub struct RestoreReport {
    /// Number of files written from the target tree.
    pub restored: usize,
    /// Paths moved into quarantine because the target tree lacks them.
    pub displaced: Vec<String>,
    /// Per-file failures; restoration continued past each one.
    pub failures: Vec<SkippedPath>,
}

/// Restore the working tree to the state captured by a commit.
pub fn restore_commit(repo: &Repository, commit_hash: &Hash) -> Result<RestoreReport> {
    let store = repo.store();

    let (_, payload) = store.read(commit_hash, Some(ObjectKind::Commit))?;
    let commit = Commit::decode(&commit_hash.to_hex(), &payload)?;
    let flat = tree::flatten(&store, &commit.tree)?;

    let mut report = RestoreReport::default();

    // Displace on-disk files the target tree does not know about
    let on_disk = walk_files(repo.workdir())?;
    let quarantine = repo
        .meta()
        .join("quarantine")
        .join(unix_now().to_string());

    for path in on_disk {
        if flat.contains_key(&path) {
            continue;
        }

        let src = repo.workdir().join(&path);
        let dest = quarantine.join(&path);
        let moved = (|| {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&src, &dest)
        })();

        match moved {
            Ok(()) => report.displaced.push(path),
            Err(e) => report.failures.push(SkippedPath {
                path,
                reason: format!("could not quarantine: {}", e),
            }),
        }
    }

    // Materialize every blob in the target tree
    for (path, entry) in &flat {
        if entry.kind != EntryKind::Blob {
            continue;
        }

        match materialize_blob(repo, path, &entry.hash, entry.mode) {
            Ok(()) => report.restored += 1,
            Err(e) => report.failures.push(SkippedPath {
                path: path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    Ok(report)
}

fn materialize_blob(repo: &Repository, path: &str, hash: &Hash, mode: u32) -> Result<()> {
    let (_, content) = repo.store().read(hash, Some(ObjectKind::Blob))?;

    let dest = repo.workdir().join(path);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::unwritable(parent, e))?;
    }

    fs::write(&dest, content).map_err(|e| Error::unwritable(&dest, e))?;
    set_file_mode(&dest, mode)?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode == file_modes::EXECUTABLE {
        let perms = fs::Permissions::from_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Collect every file under the working directory, relative and
/// slash-separated, skipping the metadata directory. Iterative walk.
fn walk_files(workdir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut stack = vec![workdir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();

            if dir == workdir && name == META_DIR {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let rel = path
                    .strip_prefix(workdir)
                    .map_err(|_| Error::unwritable(&path, std::io::Error::other("outside worktree")))?;
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    files.sort();
    Ok(files)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{StagedFile, build_tree};
    use crate::commit::{Signature, create_commit};
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        (temp_dir, repo)
    }

    fn commit_files(repo: &Repository, files: Vec<(&str, &[u8])>) -> Hash {
        let store = repo.store();
        let staged = files
            .into_iter()
            .map(|(path, content)| StagedFile {
                path: path.to_string(),
                content: content.to_vec(),
                executable: false,
            })
            .collect();
        let tree = build_tree(&store, staged).unwrap();
        create_commit(&store, &tree, &[], Signature::new("tester", 1), "snap").unwrap()
    }

    #[test]
    fn test_restore_materializes_nested_tree() {
        let (_tmp, repo) = test_repo();

        let commit = commit_files(
            &repo,
            vec![("a/b.txt", b"bee".as_ref()), ("top.txt", b"top".as_ref())],
        );

        let report = restore_commit(&repo, &commit).unwrap();
        assert_eq!(report.restored, 2);
        assert!(report.failures.is_empty());

        assert_eq!(fs::read(repo.workdir().join("a/b.txt")).unwrap(), b"bee");
        assert_eq!(fs::read(repo.workdir().join("top.txt")).unwrap(), b"top");
    }

    #[test]
    fn test_restore_quarantines_displaced_files() {
        let (_tmp, repo) = test_repo();

        let commit = commit_files(&repo, vec![("kept.txt", b"kept".as_ref())]);

        fs::write(repo.workdir().join("stray.txt"), b"user data").unwrap();

        let report = restore_commit(&repo, &commit).unwrap();
        assert_eq!(report.displaced, vec!["stray.txt"]);

        // The stray file is moved, not deleted
        assert!(!repo.workdir().join("stray.txt").exists());
        let quarantine = repo.meta().join("quarantine");
        let batch = fs::read_dir(&quarantine).unwrap().next().unwrap().unwrap();
        assert_eq!(
            fs::read(batch.path().join("stray.txt")).unwrap(),
            b"user data"
        );
    }

    #[test]
    fn test_restore_keeps_tracked_files_in_place() {
        let (_tmp, repo) = test_repo();

        fs::write(repo.workdir().join("kept.txt"), b"old contents").unwrap();
        let commit = commit_files(&repo, vec![("kept.txt", b"new contents".as_ref())]);

        let report = restore_commit(&repo, &commit).unwrap();
        assert!(report.displaced.is_empty());
        assert_eq!(
            fs::read(repo.workdir().join("kept.txt")).unwrap(),
            b"new contents"
        );
    }

    #[test]
    fn test_restore_continues_past_missing_blob() {
        let (_tmp, repo) = test_repo();
        let store = repo.store();

        // Hand-assemble a tree that references a blob the store never saw
        let missing = Hash::digest(b"never stored");
        let good = store.write(ObjectKind::Blob, b"fine").unwrap();
        let entries = vec![
            tree::TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, missing, "bad.txt".into())
                .unwrap(),
            tree::TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, good, "good.txt".into())
                .unwrap(),
        ];
        let tree_hash = store
            .write(ObjectKind::Tree, &tree::encode_tree(entries))
            .unwrap();
        let commit =
            create_commit(&store, &tree_hash, &[], Signature::new("t", 1), "partial").unwrap();

        let report = restore_commit(&repo, &commit).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "bad.txt");
        assert!(repo.workdir().join("good.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_applies_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, repo) = test_repo();
        let store = repo.store();

        let staged = vec![StagedFile {
            path: "run.sh".to_string(),
            content: b"#!/bin/sh\n".to_vec(),
            executable: true,
        }];
        let tree_hash = build_tree(&store, staged).unwrap();
        let commit =
            create_commit(&store, &tree_hash, &[], Signature::new("t", 1), "exec").unwrap();

        restore_commit(&repo, &commit).unwrap();

        let mode = fs::metadata(repo.workdir().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert!(mode & 0o111 != 0);
    }
}
