//! Merge decision engine.
//!
//! Resolves HEAD and a target ref and reports the merge outcome. True
//! three-way merge and conflict detection are out of scope: once the two
//! hashes differ the engine always reports a fast-forward, and it never
//! rewrites refs — surfacing the gap rather than silently approximating a
//! real merge.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repository;
use crate::resolve;

/// Outcome of a merge decision.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Both refs resolve to the same commit; nothing to do and no object
    /// is written.
    AlreadyUpToDate { head: Hash },
    /// The target differs from HEAD; the current design always reports a
    /// fast-forward once the hashes differ.
    FastForward { head: Hash, target: Hash },
    /// Reserved for a future three-way merge; never produced today.
    Conflict,
}

/// Decide the merge outcome for HEAD and `target`.
///
/// An unresolvable target yields `TargetNotResolvable` carrying the full
/// listing of available local/published/tag refs; an ambiguous target
/// propagates as `AmbiguousRef` with its candidates.
pub fn merge(repo: &Repository, target: &str) -> Result<MergeOutcome> {
    let head = resolve::resolve(repo, "HEAD")?;

    let their = match resolve::resolve(repo, target) {
        Ok(hash) => hash,
        Err(Error::NotFound { .. }) => {
            let available = repo
                .refs()
                .list_all()?
                .iter()
                .map(|r| r.to_string())
                .collect();
            return Err(Error::TargetNotResolvable {
                target: target.to_string(),
                available,
            });
        }
        Err(e) => return Err(e),
    };

    if head == their {
        Ok(MergeOutcome::AlreadyUpToDate { head })
    } else {
        Ok(MergeOutcome::FastForward {
            head,
            target: their,
        })
    }
}
