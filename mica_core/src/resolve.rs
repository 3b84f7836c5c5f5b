//! Ref and short-hash resolution.
//!
//! A token resolves to a commit hash by shape, in order:
//!
//! 1. 40 hex characters — validated directly against the store;
//! 2. a hex prefix of at least 4 characters — matched against the object
//!    fan-out, ambiguity reported with every candidate;
//! 3. the literal `HEAD` — dereferenced through the symbolic pointer;
//! 4. anything else — a ref name, matched exactly across the local,
//!    published, and tag namespaces first, then by unique `/`-suffix.
//!
//! A hex-shaped token is never silently retried as a ref name; branches
//! named like hex prefixes stay reachable through `refs/heads/<name>`.

use crate::error::{Error, Result};
use crate::hash::{Hash, HEX_LEN};
use crate::refs::Head;
use crate::repo::Repository;

/// Minimum length of a short-hash prefix.
const MIN_PREFIX_LEN: usize = 4;

fn is_hex(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Resolve a token to a commit (or object) hash.
pub fn resolve(repo: &Repository, token: &str) -> Result<Hash> {
    // Full hash
    if token.len() == HEX_LEN && is_hex(token) {
        let hash = Hash::from_hex(token)?;
        if !repo.store().contains(&hash) {
            return Err(Error::not_found(format!("object {}", token)));
        }
        return Ok(hash);
    }

    // Short-hash prefix
    if token.len() >= MIN_PREFIX_LEN && token.len() < HEX_LEN && is_hex(token) {
        let matches = repo.store().find_prefix(token)?;
        return match matches.len() {
            0 => Err(Error::not_found(format!("object prefix {}", token))),
            1 => Ok(matches[0]),
            _ => Err(Error::ambiguous(
                token,
                matches.iter().map(Hash::to_hex).collect(),
            )),
        };
    }

    // Symbolic pointer; re-dispatch on whatever it holds
    if token == "HEAD" {
        return match repo.refs().head()? {
            Head::Branch(name) => repo
                .refs()
                .local(&name)?
                .ok_or_else(|| Error::not_found(format!("commits on branch '{}'", name))),
            Head::Detached(hash) => {
                if !repo.store().contains(&hash) {
                    return Err(Error::not_found(format!("object {}", hash)));
                }
                Ok(hash)
            }
        };
    }

    resolve_name(repo, token)
}

/// Resolve a ref name across the local/published/tag namespaces.
fn resolve_name(repo: &Repository, token: &str) -> Result<Hash> {
    let all = repo.refs().list_all()?;

    // Exact match on the bare or fully qualified name
    let exact: Vec<_> = all
        .iter()
        .filter(|r| r.bare() == token || r.qualified() == token)
        .collect();

    match exact.len() {
        1 => return Ok(exact[0].hash),
        0 => {}
        _ => {
            return Err(Error::ambiguous(
                token,
                exact.iter().map(|r| r.qualified()).collect(),
            ));
        }
    }

    // Unique suffix match on qualified names
    let suffix = format!("/{}", token);
    let matched: Vec<_> = all
        .iter()
        .filter(|r| r.qualified().ends_with(&suffix))
        .collect();

    match matched.len() {
        1 => Ok(matched[0].hash),
        0 => Err(Error::not_found(format!("ref '{}'", token))),
        _ => Err(Error::ambiguous(
            token,
            matched.iter().map(|r| r.qualified()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Signature, create_commit};
    use crate::object::ObjectKind;
    use crate::repo::Repository;
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        (temp_dir, repo)
    }

    fn seed_commit(repo: &Repository, message: &str) -> Hash {
        let store = repo.store();
        let tree = store.write(ObjectKind::Tree, b"").unwrap();
        create_commit(&store, &tree, &[], Signature::new("tester", 1), message).unwrap()
    }

    #[test]
    fn test_resolve_full_hash() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");

        assert_eq!(resolve(&repo, &hash.to_hex()).unwrap(), hash);
    }

    #[test]
    fn test_resolve_full_hash_not_stored() {
        let (_tmp, repo) = test_repo();

        let ghost = Hash::digest(b"ghost");
        assert!(matches!(
            resolve(&repo, &ghost.to_hex()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");

        assert_eq!(resolve(&repo, &hash.to_hex()[..6]).unwrap(), hash);
    }

    #[test]
    fn test_resolve_prefix_too_short_is_a_name() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");

        // Three hex characters are below the prefix minimum, so the token
        // falls through to name resolution and fails there
        assert!(matches!(
            resolve(&repo, &hash.to_hex()[..3]),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let (_tmp, repo) = test_repo();
        let store = repo.store();

        // Brute-force two blobs sharing a 4-character hash prefix
        let mut by_prefix: std::collections::HashMap<String, Hash> =
            std::collections::HashMap::new();
        let mut collision = None;

        for i in 0..20_000u32 {
            let hash = store
                .write(ObjectKind::Blob, format!("filler-{}", i).as_bytes())
                .unwrap();
            let prefix = hash.to_hex()[..4].to_string();
            if let Some(prev) = by_prefix.insert(prefix.clone(), hash) {
                collision = Some((prefix, prev, hash));
                break;
            }
        }

        let (prefix, a, b) = collision.expect("expected a 4-char prefix collision");
        match resolve(&repo, &prefix) {
            Err(Error::AmbiguousRef { candidates, .. }) => {
                assert!(candidates.contains(&a.to_hex()));
                assert!(candidates.contains(&b.to_hex()));
            }
            other => panic!("expected AmbiguousRef, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_head_through_branch() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");
        repo.refs().set_local("main", &hash).unwrap();

        assert_eq!(resolve(&repo, "HEAD").unwrap(), hash);
    }

    #[test]
    fn test_resolve_head_empty_branch() {
        let (_tmp, repo) = test_repo();

        assert!(matches!(
            resolve(&repo, "HEAD"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_head_detached() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");
        repo.refs().set_head_detached(&hash).unwrap();

        assert_eq!(resolve(&repo, "HEAD").unwrap(), hash);
    }

    #[test]
    fn test_resolve_branch_name() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");
        repo.refs().set_local("main", &hash).unwrap();

        assert_eq!(resolve(&repo, "main").unwrap(), hash);
        assert_eq!(resolve(&repo, "refs/heads/main").unwrap(), hash);
    }

    #[test]
    fn test_resolve_published_name() {
        let (_tmp, repo) = test_repo();
        let local = seed_commit(&repo, "local");
        let published = seed_commit(&repo, "published");
        repo.refs().set_local("main", &local).unwrap();
        repo.refs().set_published("main", &published).unwrap();

        assert_eq!(resolve(&repo, "main").unwrap(), local);
        assert_eq!(resolve(&repo, "main.remote").unwrap(), published);
    }

    #[test]
    fn test_resolve_tag_and_branch_collision() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");
        repo.refs().set_local("main", &hash).unwrap();
        std::fs::write(
            repo.meta().join("refs").join("tags").join("main"),
            hash.to_hex(),
        )
        .unwrap();

        match resolve(&repo, "main") {
            Err(Error::AmbiguousRef { candidates, .. }) => {
                assert_eq!(
                    candidates,
                    vec!["refs/heads/main".to_string(), "refs/tags/main".to_string()]
                );
            }
            other => panic!("expected AmbiguousRef, got {:?}", other),
        }

        // Qualified forms stay unambiguous
        assert_eq!(resolve(&repo, "refs/heads/main").unwrap(), hash);
        assert_eq!(resolve(&repo, "refs/tags/main").unwrap(), hash);
    }

    #[test]
    fn test_resolve_suffix_match() {
        let (_tmp, repo) = test_repo();
        let hash = seed_commit(&repo, "one");
        std::fs::write(
            repo.meta().join("refs").join("tags").join("v1"),
            hash.to_hex(),
        )
        .unwrap();

        // "tags/v1" is a suffix of "refs/tags/v1"
        assert_eq!(resolve(&repo, "tags/v1").unwrap(), hash);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let (_tmp, repo) = test_repo();

        assert!(matches!(
            resolve(&repo, "no-such-ref"),
            Err(Error::NotFound { .. })
        ));
    }
}
