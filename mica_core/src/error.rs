//! Error types for mica_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using mica_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during repository operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Object, ref, or branch does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Stored object is corrupt or a record fails validation.
    #[error("corrupt object {what}: {reason}")]
    CorruptObject { what: String, reason: String },

    /// Stored object kind disagrees with the expected kind.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// A short hash or ref name matches more than one candidate.
    #[error("ambiguous ref '{token}': matches {}", .candidates.join(", "))]
    AmbiguousRef {
        token: String,
        candidates: Vec<String>,
    },

    /// Branch or ref already exists.
    #[error("'{name}' already exists")]
    AlreadyExists { name: String },

    /// A store or ref write could not be completed.
    #[error("cannot write {path}: {source}")]
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Merge target could not be resolved; carries the remediation listing.
    #[error("cannot resolve merge target '{target}'; available refs: {}", .available.join(", "))]
    TargetNotResolvable {
        target: String,
        available: Vec<String>,
    },

    /// Invalid hash format or encoding.
    #[error("invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Invalid reference or branch name.
    #[error("invalid ref: {reason}")]
    InvalidRef { reason: String },

    /// Invalid tree entry.
    #[error("invalid tree entry: {reason}")]
    InvalidEntry { reason: String },
}

impl Error {
    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Create a CorruptObject error.
    pub fn corrupt(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptObject {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an AmbiguousRef error.
    pub fn ambiguous(token: impl Into<String>, candidates: Vec<String>) -> Self {
        Error::AmbiguousRef {
            token: token.into(),
            candidates,
        }
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Error::AlreadyExists { name: name.into() }
    }

    /// Create an Unwritable error.
    pub fn unwritable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Unwritable {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an InvalidRef error.
    pub fn invalid_ref(reason: impl Into<String>) -> Self {
        Error::InvalidRef {
            reason: reason.into(),
        }
    }

    /// Create an InvalidEntry error.
    pub fn invalid_entry(reason: impl Into<String>) -> Self {
        Error::InvalidEntry {
            reason: reason.into(),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
