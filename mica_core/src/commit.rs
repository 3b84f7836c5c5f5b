//! Commit records and history traversal.
//!
//! A commit payload is canonical text:
//!
//! ```text
//! tree <hash>
//! parent <hash>        (zero or more)
//! author <name> <unix-seconds>
//! committer <name> <unix-seconds>
//!
//! <message>
//! ```
//!
//! Author names may contain spaces; the timestamp is always the last
//! space-separated token of its line.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectKind;
use crate::store::Store;
use std::collections::HashSet;

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Signature {
    /// Free-form name.
    pub name: String,
    /// Unix timestamp in seconds.
    pub when: i64,
}

impl Signature {
    pub fn new(name: impl Into<String>, when: i64) -> Self {
        Self {
            name: name.into(),
            when,
        }
    }
}

/// A decoded commit record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Commit {
    /// Root tree of the snapshot.
    pub tree: Hash,
    /// Parent commits, first parent first.
    pub parents: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// Encode the commit into its canonical payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut text = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            text.push_str(&format!("parent {}\n", parent));
        }
        text.push_str(&format!("author {} {}\n", self.author.name, self.author.when));
        text.push_str(&format!(
            "committer {} {}\n",
            self.committer.name, self.committer.when
        ));
        text.push('\n');
        text.push_str(&self.message);
        text.into_bytes()
    }

    /// Decode a commit payload.
    ///
    /// `what` names the commit for error reporting.
    pub fn decode(what: &str, payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::corrupt(what, "commit payload is not valid UTF-8"))?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        let mut lines = text.split('\n');
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }

            let (field, value) = line
                .split_once(' ')
                .ok_or_else(|| Error::corrupt(what, format!("malformed header line '{}'", line)))?;

            match field {
                "tree" => {
                    tree = Some(Hash::from_hex(value).map_err(|_| {
                        Error::corrupt(what, format!("invalid tree hash '{}'", value))
                    })?);
                }
                "parent" => {
                    parents.push(Hash::from_hex(value).map_err(|_| {
                        Error::corrupt(what, format!("invalid parent hash '{}'", value))
                    })?);
                }
                "author" => author = Some(decode_signature(what, value)?),
                "committer" => committer = Some(decode_signature(what, value)?),
                _ => {
                    return Err(Error::corrupt(
                        what,
                        format!("unknown header field '{}'", field),
                    ));
                }
            }
        }

        let message: String = lines.collect::<Vec<_>>().join("\n");

        Ok(Commit {
            tree: tree.ok_or_else(|| Error::corrupt(what, "missing tree header"))?,
            parents,
            author: author.ok_or_else(|| Error::corrupt(what, "missing author header"))?,
            committer: committer
                .ok_or_else(|| Error::corrupt(what, "missing committer header"))?,
            message,
        })
    }

    /// First line of the message, for one-line displays.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

fn decode_signature(what: &str, value: &str) -> Result<Signature> {
    let (name, when_str) = value
        .rsplit_once(' ')
        .ok_or_else(|| Error::corrupt(what, format!("malformed signature '{}'", value)))?;

    let when: i64 = when_str
        .parse()
        .map_err(|_| Error::corrupt(what, format!("invalid timestamp '{}'", when_str)))?;

    Ok(Signature::new(name, when))
}

/// Create a commit object.
///
/// The tree must exist and be a tree; every parent must exist and be a
/// commit. Returns the new commit's hash.
pub fn create_commit(
    store: &Store,
    tree: &Hash,
    parents: &[Hash],
    author: Signature,
    message: &str,
) -> Result<Hash> {
    store.read(tree, Some(ObjectKind::Tree))?;
    for parent in parents {
        store.read(parent, Some(ObjectKind::Commit))?;
    }

    let commit = Commit {
        tree: *tree,
        parents: parents.to_vec(),
        committer: author.clone(),
        author,
        message: message.to_string(),
    };

    store.write(ObjectKind::Commit, &commit.encode())
}

/// Lazy first-parent history walk.
///
/// Yields `(hash, commit)` pairs starting from a commit and following the
/// first parent only — merge topology is not traversed breadth-first. The
/// walk stops at the limit, at a parentless commit, or at a previously
/// visited hash (cycle guard; well-formed histories cannot cycle, since a
/// commit can only name parents that already exist). The iterator is
/// finite and non-restartable.
pub struct History {
    store: Store,
    next: Option<Hash>,
    seen: HashSet<Hash>,
    remaining: Option<usize>,
}

impl History {
    pub fn new(store: Store, start: Hash, limit: Option<usize>) -> Self {
        Self {
            store,
            next: Some(start),
            seen: HashSet::new(),
            remaining: limit,
        }
    }
}

impl Iterator for History {
    type Item = Result<(Hash, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(remaining) = self.remaining {
            if remaining == 0 {
                return None;
            }
            self.remaining = Some(remaining - 1);
        }

        let hash = self.next.take()?;
        if !self.seen.insert(hash) {
            return None;
        }

        let commit = match self
            .store
            .read(&hash, Some(ObjectKind::Commit))
            .and_then(|(_, payload)| Commit::decode(&hash.to_hex(), &payload))
        {
            Ok(commit) => commit,
            Err(e) => return Some(Err(e)),
        };

        self.next = commit.parents.first().copied();
        Some(Ok((hash, commit)))
    }
}
