//! # Mica Core
//!
//! A minimal content-addressed version-control engine.
//!
//! This library implements the data model of a toy version-control
//! system: immutable blob/tree/commit objects keyed by a SHA-1 content
//! hash, a branch/HEAD ref system with a separate *published* pointer
//! per branch, tree construction from a staged file list, first-parent
//! history traversal, short-hash/ref resolution with ambiguity
//! detection, and a merge-outcome decision procedure.
//!
//! ## Features
//!
//! - Content-addressed storage: identical content is stored once
//! - Immutable objects with stable 40-hex ids
//! - Tree-based snapshots with deterministic hashing
//! - Local vs published branch pointers as an explicit visibility seam
//! - Read-only viewer facade over published state
//!
//! ## Example
//!
//! ```no_run
//! use mica_core::{CommitOutcome, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize a repository in the current directory
//! let repo = Repository::init(".")?;
//!
//! // Stage and commit a file
//! repo.stage(&["notes.txt".to_string()])?;
//! if let CommitOutcome::Created { hash, .. } = repo.commit("add notes", "me", 1736900000)? {
//!     println!("committed {}", hash);
//! }
//!
//! // Expose the branch state to the viewer
//! repo.publish(1736900001)?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod commit;
mod error;
mod hash;
mod index;
mod merge;
mod object;
mod reflog;
mod refs;
mod repo;
mod resolve;
mod restore;
mod store;
mod tree;
pub mod viewer;

pub use builder::{BuildReport, SkippedPath, StagedFile, build_from_worktree, build_tree};
pub use commit::{Commit, History, Signature, create_commit};
pub use error::{Error, Result};
pub use hash::{HASH_SIZE, HEX_LEN, Hash};
pub use index::Index;
pub use merge::MergeOutcome;
pub use object::{ObjectKind, decode_record, encode_record, hash_object};
pub use reflog::{Reflog, ReflogEntry};
pub use refs::{Head, Namespace, RefName, RefStore};
pub use repo::{
    CheckoutOutcome, CommitOutcome, DEFAULT_BRANCH, META_DIR, PublishOutcome, Repository,
    StageReport,
};
pub use restore::{RestoreReport, restore_commit};
pub use store::Store;
pub use tree::{EntryKind, FileMode, FlatEntry, TreeEntry, decode_tree, encode_tree, file_modes, flatten};
