//! Repository handle and high-level operations.
//!
//! A `Repository` is an explicit value threaded through every operation.
//! HEAD and the refs are re-read from disk at the start of each operation
//! rather than cached across calls, so the handle never holds stale
//! process-wide state.

use crate::builder::{self, SkippedPath};
use crate::commit::{self, History, Signature};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::index::Index;
use crate::merge::{self, MergeOutcome};
use crate::reflog::{Reflog, ReflogEntry};
use crate::refs::{Head, RefStore};
use crate::resolve;
use crate::restore::{self, RestoreReport};
use crate::store::Store;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the metadata directory inside the working tree.
pub const META_DIR: &str = ".mica";

/// Branch created by `init` and pointed to by the initial HEAD.
pub const DEFAULT_BRANCH: &str = "main";

/// Outcome of a commit attempt.
#[derive(Debug, serde::Serialize)]
pub enum CommitOutcome {
    /// A commit object was created and the branch advanced.
    Created {
        hash: Hash,
        branch: String,
        staged: usize,
        skipped: Vec<SkippedPath>,
    },
    /// The index was empty; nothing was written.
    NothingStaged,
}

/// Outcome of a checkout.
#[derive(Debug, serde::Serialize)]
pub enum CheckoutOutcome {
    /// HEAD was repointed and the working tree restored.
    Restored {
        branch: String,
        commit: Hash,
        report: RestoreReport,
    },
    /// The branch has no commits; HEAD was repointed and the working tree
    /// left untouched.
    EmptyBranch { branch: String },
}

/// Outcome of a publish.
#[derive(Debug, serde::Serialize)]
pub enum PublishOutcome {
    /// The branch's local commit is now visible externally.
    Published { branch: String, hash: Hash },
    /// The branch has no local commits to expose.
    NothingToPublish,
}

/// Staging result: which paths were added and which were missing on disk.
#[derive(Debug, serde::Serialize)]
pub struct StageReport {
    pub added: Vec<String>,
    pub missing: Vec<String>,
}

/// An opened repository: a working directory plus its metadata directory.
#[derive(Debug, Clone)]
pub struct Repository {
    workdir: PathBuf,
    meta: PathBuf,
}

impl Repository {
    /// Initialize a repository in `workdir`, creating the metadata layout
    /// and the default branch. Re-initializing an existing repository is
    /// harmless.
    pub fn init<P: AsRef<Path>>(workdir: P) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let meta = workdir.join(META_DIR);

        fs::create_dir_all(meta.join("objects"))?;
        fs::create_dir_all(meta.join("refs").join("heads"))?;
        fs::create_dir_all(meta.join("refs").join("tags"))?;

        let repo = Self { workdir, meta };

        if !repo.refs().branch_exists(DEFAULT_BRANCH) {
            repo.refs().create_branch(DEFAULT_BRANCH)?;
        }
        repo.refs().set_head_branch(DEFAULT_BRANCH)?;

        let index_path = repo.meta.join("index");
        if !index_path.exists() {
            fs::write(&index_path, "").map_err(|e| Error::unwritable(&index_path, e))?;
        }

        Ok(repo)
    }

    /// Open the repository whose metadata directory lives in `workdir`.
    pub fn open<P: AsRef<Path>>(workdir: P) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let meta = workdir.join(META_DIR);

        if !meta.is_dir() {
            return Err(Error::not_found(format!(
                "repository at {}",
                workdir.display()
            )));
        }

        Ok(Self { workdir, meta })
    }

    /// Find a repository by ascending from `start` towards the root.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self> {
        let mut current = start.as_ref().to_path_buf();

        loop {
            if current.join(META_DIR).is_dir() {
                return Self::open(current);
            }
            if !current.pop() {
                return Err(Error::not_found("repository (or any parent)"));
            }
        }
    }

    /// Get the working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Get the metadata directory.
    pub fn meta(&self) -> &Path {
        &self.meta
    }

    /// Get the object store.
    pub fn store(&self) -> Store {
        Store::new(self.meta.join("objects"))
    }

    /// Get the ref manager.
    pub fn refs(&self) -> RefStore {
        RefStore::new(self.meta.clone())
    }

    /// Get the staged-path index.
    pub fn index(&self) -> Index {
        Index::new(self.meta.join("index"))
    }

    /// Get the operation log.
    pub fn reflog(&self) -> Reflog {
        Reflog::new(self.meta.join("log"))
    }

    /// Resolve a hash, prefix, `HEAD`, or ref name to a commit hash.
    pub fn resolve(&self, token: &str) -> Result<Hash> {
        resolve::resolve(self, token)
    }

    /// Stage paths for the next commit. Paths missing on disk are
    /// reported and not staged.
    pub fn stage(&self, paths: &[String]) -> Result<StageReport> {
        let mut present = Vec::new();
        let mut missing = Vec::new();

        for path in paths {
            if self.workdir.join(path).is_file() {
                present.push(path.clone());
            } else {
                missing.push(path.clone());
            }
        }

        let added = self.index().add(&present)?;
        Ok(StageReport { added, missing })
    }

    /// Commit the staged file list onto the current branch.
    pub fn commit(&self, message: &str, author: &str, when: i64) -> Result<CommitOutcome> {
        let staged = self.index().read()?;
        if staged.is_empty() {
            return Ok(CommitOutcome::NothingStaged);
        }

        let Head::Branch(branch) = self.refs().head()? else {
            return Err(Error::invalid_ref("cannot commit on a detached HEAD"));
        };

        let parent = self.refs().local(&branch)?;
        let store = self.store();

        let report = builder::build_from_worktree(&store, &self.workdir, &staged)?;
        let parents: Vec<Hash> = parent.into_iter().collect();
        let hash = commit::create_commit(
            &store,
            &report.root,
            &parents,
            Signature::new(author, when),
            message,
        )?;

        self.refs().set_local(&branch, &hash)?;
        self.reflog().append(&ReflogEntry::new(
            when,
            "commit",
            Some(hash),
            format!("{}: {}", branch, message.lines().next().unwrap_or("")),
        ))?;

        Ok(CommitOutcome::Created {
            hash,
            branch,
            staged: staged.len(),
            skipped: report.skipped,
        })
    }

    /// Create a branch with empty local and published refs.
    pub fn create_branch(&self, name: &str, when: i64) -> Result<()> {
        self.refs().create_branch(name)?;
        self.reflog()
            .append(&ReflogEntry::new(when, "branch", None, name))?;
        Ok(())
    }

    /// Switch HEAD to a branch and restore its latest commit.
    ///
    /// A branch with no commits is a reported no-op for the working tree,
    /// not an error.
    pub fn checkout(&self, branch: &str, when: i64) -> Result<CheckoutOutcome> {
        if !self.refs().branch_exists(branch) {
            return Err(Error::not_found(format!("branch '{}'", branch)));
        }

        self.refs().set_head_branch(branch)?;

        match self.refs().local(branch)? {
            None => {
                self.reflog().append(&ReflogEntry::new(
                    when,
                    "checkout",
                    None,
                    format!("{}: no commits", branch),
                ))?;
                Ok(CheckoutOutcome::EmptyBranch {
                    branch: branch.to_string(),
                })
            }
            Some(hash) => {
                let report = restore::restore_commit(self, &hash)?;
                self.reflog()
                    .append(&ReflogEntry::new(when, "checkout", Some(hash), branch))?;
                Ok(CheckoutOutcome::Restored {
                    branch: branch.to_string(),
                    commit: hash,
                    report,
                })
            }
        }
    }

    /// Copy the current branch's local commit into its published ref and
    /// clear the index. The published ref is the seam the read-only
    /// viewer consumes; it never reads local refs.
    pub fn publish(&self, when: i64) -> Result<PublishOutcome> {
        let Head::Branch(branch) = self.refs().head()? else {
            return Err(Error::invalid_ref("cannot publish from a detached HEAD"));
        };

        match self.refs().local(&branch)? {
            None => Ok(PublishOutcome::NothingToPublish),
            Some(hash) => {
                self.refs().set_published(&branch, &hash)?;
                self.index().clear()?;
                self.reflog()
                    .append(&ReflogEntry::new(when, "publish", Some(hash), branch.clone()))?;
                Ok(PublishOutcome::Published { branch, hash })
            }
        }
    }

    /// Walk first-parent history from a commit.
    pub fn history(&self, start: Hash, limit: Option<usize>) -> History {
        History::new(self.store(), start, limit)
    }

    /// Decide the merge outcome for HEAD and a target ref.
    pub fn merge(&self, target: &str) -> Result<MergeOutcome> {
        merge::merge(self, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        (temp_dir, repo)
    }

    fn write_and_stage(repo: &Repository, path: &str, content: &[u8]) {
        let disk = repo.workdir().join(path);
        if let Some(parent) = disk.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&disk, content).unwrap();
        repo.stage(&[path.to_string()]).unwrap();
    }

    #[test]
    fn test_init_layout() {
        let (_tmp, repo) = test_repo();

        assert!(repo.meta().join("objects").is_dir());
        assert!(repo.meta().join("refs/heads/main").is_file());
        assert!(repo.meta().join("refs/heads/main.remote").is_file());
        assert!(repo.meta().join("index").is_file());

        let head = fs::read_to_string(repo.meta().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();

        let hash = Hash::digest(b"c");
        repo.refs().set_local("main", &hash).unwrap();

        Repository::init(temp_dir.path()).unwrap();
        assert_eq!(repo.refs().local("main").unwrap(), Some(hash));
    }

    #[test]
    fn test_open_missing_repository() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Repository::open(temp_dir.path()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let (_tmp, repo) = test_repo();

        let deep = repo.workdir().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();

        let found = Repository::discover(&deep).unwrap();
        assert_eq!(found.workdir(), repo.workdir());
    }

    #[test]
    fn test_stage_reports_missing_paths() {
        let (_tmp, repo) = test_repo();

        fs::write(repo.workdir().join("real.txt"), b"x").unwrap();
        let report = repo
            .stage(&["real.txt".to_string(), "fake.txt".to_string()])
            .unwrap();

        assert_eq!(report.added, vec!["real.txt"]);
        assert_eq!(report.missing, vec!["fake.txt"]);
    }

    #[test]
    fn test_commit_nothing_staged() {
        let (_tmp, repo) = test_repo();

        assert!(matches!(
            repo.commit("empty", "tester", 1).unwrap(),
            CommitOutcome::NothingStaged
        ));
    }

    #[test]
    fn test_commit_advances_branch() {
        let (_tmp, repo) = test_repo();

        write_and_stage(&repo, "file.txt", b"v1");
        let CommitOutcome::Created { hash: first, .. } =
            repo.commit("one", "tester", 1).unwrap()
        else {
            panic!("expected a commit");
        };

        assert_eq!(repo.refs().local("main").unwrap(), Some(first));
        assert_eq!(repo.resolve("HEAD").unwrap(), first);

        // Second commit links to the first as parent
        write_and_stage(&repo, "file.txt", b"v2");
        let CommitOutcome::Created { hash: second, .. } =
            repo.commit("two", "tester", 2).unwrap()
        else {
            panic!("expected a commit");
        };

        let chain: Vec<Hash> = repo
            .history(second, None)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(chain, vec![second, first]);
    }

    #[test]
    fn test_commit_appends_reflog() {
        let (_tmp, repo) = test_repo();

        write_and_stage(&repo, "file.txt", b"v1");
        repo.commit("logged", "tester", 42).unwrap();

        let entries = repo.reflog().read_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "commit");
        assert_eq!(entries[0].timestamp, 42);
        assert!(entries[0].detail.contains("logged"));
    }

    #[test]
    fn test_checkout_empty_branch_is_noop() {
        let (_tmp, repo) = test_repo();

        fs::write(repo.workdir().join("untouched.txt"), b"here").unwrap();
        repo.create_branch("feature", 1).unwrap();

        let outcome = repo.checkout("feature", 2).unwrap();
        assert!(matches!(outcome, CheckoutOutcome::EmptyBranch { .. }));

        // Working directory unchanged, HEAD moved
        assert!(repo.workdir().join("untouched.txt").exists());
        assert_eq!(
            repo.refs().head().unwrap(),
            Head::Branch("feature".to_string())
        );
    }

    #[test]
    fn test_checkout_unknown_branch() {
        let (_tmp, repo) = test_repo();

        assert!(matches!(
            repo.checkout("ghost", 1),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_checkout_restores_branch_state() {
        let (_tmp, repo) = test_repo();

        write_and_stage(&repo, "main.txt", b"main content");
        repo.commit("on main", "tester", 1).unwrap();

        repo.create_branch("feature", 2).unwrap();
        repo.checkout("feature", 3).unwrap_or_else(|e| panic!("{}", e));

        write_and_stage(&repo, "feature.txt", b"feature content");
        repo.commit("on feature", "tester", 4).unwrap();

        let outcome = repo.checkout("main", 5).unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Restored { .. }));
        assert!(repo.workdir().join("main.txt").exists());
        // feature.txt is not in main's tree; it is quarantined, not deleted
        assert!(!repo.workdir().join("feature.txt").exists());
        assert!(repo.meta().join("quarantine").exists());
    }

    #[test]
    fn test_publish_copies_local_and_clears_index() {
        let (_tmp, repo) = test_repo();

        write_and_stage(&repo, "file.txt", b"v1");
        let CommitOutcome::Created { hash, .. } = repo.commit("one", "tester", 1).unwrap()
        else {
            panic!("expected a commit");
        };

        write_and_stage(&repo, "other.txt", b"pending");

        let outcome = repo.publish(2).unwrap();
        let PublishOutcome::Published {
            branch,
            hash: published,
        } = outcome
        else {
            panic!("expected a publish");
        };

        assert_eq!(branch, "main");
        assert_eq!(published, hash);
        assert_eq!(repo.refs().published("main").unwrap(), Some(hash));
        assert!(repo.index().is_empty().unwrap());
    }

    #[test]
    fn test_publish_without_commits() {
        let (_tmp, repo) = test_repo();

        assert!(matches!(
            repo.publish(1).unwrap(),
            PublishOutcome::NothingToPublish
        ));
    }

    #[test]
    fn test_commit_skips_vanished_staged_file() {
        let (_tmp, repo) = test_repo();

        write_and_stage(&repo, "keep.txt", b"kept");
        write_and_stage(&repo, "gone.txt", b"soon gone");
        fs::remove_file(repo.workdir().join("gone.txt")).unwrap();

        let CommitOutcome::Created { skipped, .. } =
            repo.commit("partial", "tester", 1).unwrap()
        else {
            panic!("expected a commit");
        };

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, "gone.txt");
    }
}
