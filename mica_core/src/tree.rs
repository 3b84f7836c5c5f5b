//! Tree encoding and traversal.
//!
//! A tree payload is a canonical text listing, one entry per line, entries
//! sorted by name bytes so the same children always hash identically:
//!
//! ```text
//! <mode:06o> <kind> <40-hex-hash>\t<name>\n
//! ```
//!
//! The tab before the name lets names contain spaces.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectKind;
use crate::store::Store;
use std::collections::BTreeMap;

/// Entry kind in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A blob (file).
    Blob,
    /// A subtree (directory).
    Tree,
}

impl EntryKind {
    /// Get the serialized name of this entry kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Blob => "blob",
            EntryKind::Tree => "tree",
        }
    }

    /// Parse an entry kind from its serialized name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(EntryKind::Blob),
            "tree" => Some(EntryKind::Tree),
            _ => None,
        }
    }
}

/// File mode (POSIX permissions).
pub type FileMode = u32;

/// Common file modes.
pub mod file_modes {
    use super::FileMode;

    /// Regular file (non-executable).
    pub const REGULAR: FileMode = 0o100644;

    /// Executable file.
    pub const EXECUTABLE: FileMode = 0o100755;

    /// Directory.
    pub const DIRECTORY: FileMode = 0o040000;
}

/// An entry in a tree (file or subdirectory).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TreeEntry {
    /// Kind of entry (blob or tree).
    pub kind: EntryKind,
    /// POSIX file mode.
    pub mode: FileMode,
    /// Hash of the child object.
    pub hash: Hash,
    /// Name of the entry (UTF-8, no path separators).
    pub name: String,
}

impl TreeEntry {
    /// Create a new tree entry with a validated name.
    pub fn new(kind: EntryKind, mode: FileMode, hash: Hash, name: String) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_entry("name cannot be empty"));
        }

        if name.len() > 255 {
            return Err(Error::invalid_entry(format!(
                "name too long: {} bytes (max 255)",
                name.len()
            )));
        }

        if name.contains('/') || name.contains('\0') || name.contains('\n') {
            return Err(Error::invalid_entry(format!(
                "name '{}' contains a reserved character",
                name.escape_default()
            )));
        }

        Ok(Self {
            kind,
            mode,
            hash,
            name,
        })
    }

    fn encode_line(&self) -> String {
        format!(
            "{:06o} {} {}\t{}\n",
            self.mode,
            self.kind.as_str(),
            self.hash,
            self.name
        )
    }

    fn decode_line(what: &str, line: &str) -> Result<Self> {
        let (meta, name) = line
            .split_once('\t')
            .ok_or_else(|| Error::corrupt(what, format!("tree entry missing name: '{}'", line)))?;

        let mut fields = meta.split(' ');
        let (Some(mode_str), Some(kind_str), Some(hash_str), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::corrupt(
                what,
                format!("malformed tree entry '{}'", line),
            ));
        };

        let mode = FileMode::from_str_radix(mode_str, 8)
            .map_err(|_| Error::corrupt(what, format!("invalid mode '{}'", mode_str)))?;

        let kind = EntryKind::parse(kind_str)
            .ok_or_else(|| Error::corrupt(what, format!("unknown entry kind '{}'", kind_str)))?;

        let hash = Hash::from_hex(hash_str)
            .map_err(|_| Error::corrupt(what, format!("invalid entry hash '{}'", hash_str)))?;

        TreeEntry::new(kind, mode, hash, name.to_string())
            .map_err(|e| Error::corrupt(what, e.to_string()))
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    /// Compare by name (bytewise UTF-8) for canonical ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.as_bytes().cmp(other.name.as_bytes())
    }
}

/// Encode a list of tree entries into the canonical sorted payload.
pub fn encode_tree(mut entries: Vec<TreeEntry>) -> Vec<u8> {
    entries.sort();

    let mut buf = Vec::new();
    for entry in entries {
        buf.extend_from_slice(entry.encode_line().as_bytes());
    }
    buf
}

/// Decode a list of tree entries from a payload.
pub fn decode_tree(what: &str, payload: &[u8]) -> Result<Vec<TreeEntry>> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| Error::corrupt(what, "tree payload is not valid UTF-8"))?;

    let mut entries = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        entries.push(TreeEntry::decode_line(what, line)?);
    }

    Ok(entries)
}

/// A flattened tree entry keyed by its slash-separated path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlatEntry {
    pub kind: EntryKind,
    pub mode: FileMode,
    pub hash: Hash,
}

/// Flatten a tree into a path-keyed map of all entries, subtrees included.
///
/// Walks with an explicit stack rather than recursion, so arbitrarily deep
/// hierarchies cannot exhaust the call stack.
pub fn flatten(store: &Store, root: &Hash) -> Result<BTreeMap<String, FlatEntry>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![(String::new(), *root)];

    while let Some((prefix, tree_hash)) = stack.pop() {
        let (_, payload) = store.read(&tree_hash, Some(ObjectKind::Tree))?;
        let entries = decode_tree(&tree_hash.to_hex(), &payload)?;

        for entry in entries {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };

            if entry.kind == EntryKind::Tree {
                stack.push((path.clone(), entry.hash));
            }

            out.insert(
                path,
                FlatEntry {
                    kind: entry.kind,
                    mode: entry.mode,
                    hash: entry.hash,
                },
            );
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_encode_decode() {
        let hash = Hash::digest(b"test");
        let entry = TreeEntry::new(
            EntryKind::Blob,
            file_modes::REGULAR,
            hash,
            "test file.txt".to_string(),
        )
        .unwrap();

        let line = entry.encode_line();
        let decoded = TreeEntry::decode_line("test", line.trim_end()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_entry_name_validation() {
        let hash = Hash::digest(b"test");

        assert!(TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "".into()).is_err());
        assert!(
            TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "a/b".into()).is_err()
        );
        assert!(
            TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "a\0b".into()).is_err()
        );
        assert!(
            TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "a".repeat(256)).is_err()
        );
    }

    #[test]
    fn test_encode_tree_sorts_by_name() {
        let hash = Hash::digest(b"x");
        let entries = vec![
            TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "z.txt".into()).unwrap(),
            TreeEntry::new(EntryKind::Blob, file_modes::REGULAR, hash, "a.txt".into()).unwrap(),
            TreeEntry::new(EntryKind::Tree, file_modes::DIRECTORY, hash, "m".into()).unwrap(),
        ];

        let payload = encode_tree(entries);
        let decoded = decode_tree("test", &payload).unwrap();

        assert_eq!(decoded[0].name, "a.txt");
        assert_eq!(decoded[1].name, "m");
        assert_eq!(decoded[2].name, "z.txt");
    }

    #[test]
    fn test_decode_tree_rejects_unknown_kind() {
        let hash = Hash::digest(b"x");
        let line = format!("100644 symlink {}\tlink\n", hash);
        assert!(decode_tree("test", line.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let payload = encode_tree(vec![]);
        assert!(payload.is_empty());
        assert!(decode_tree("test", &payload).unwrap().is_empty());
    }

    // Property-based tests
    use proptest::prelude::*;

    fn arb_entry_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9._ -]{1,40}"
    }

    fn arb_tree_entry() -> impl Strategy<Value = TreeEntry> {
        (
            prop::sample::select(vec![EntryKind::Blob, EntryKind::Tree]),
            prop::sample::select(vec![
                file_modes::REGULAR,
                file_modes::EXECUTABLE,
                file_modes::DIRECTORY,
            ]),
            prop::array::uniform20(any::<u8>()),
            arb_entry_name(),
        )
            .prop_map(|(kind, mode, hash_bytes, name)| {
                TreeEntry::new(kind, mode, Hash::from_bytes(hash_bytes), name).unwrap()
            })
    }

    proptest! {
        /// Tree payloads round-trip through encode/decode.
        #[test]
        fn prop_tree_roundtrip(entries in prop::collection::vec(arb_tree_entry(), 0..20)) {
            // Deduplicate names; a tree cannot hold two entries with one name
            let mut seen = std::collections::BTreeSet::new();
            let entries: Vec<TreeEntry> = entries
                .into_iter()
                .filter(|e| seen.insert(e.name.clone()))
                .collect();

            let mut expected = entries.clone();
            expected.sort();

            let payload = encode_tree(entries);
            let decoded = decode_tree("prop", &payload)?;
            prop_assert_eq!(decoded, expected);
        }

        /// The encoded payload is independent of input ordering.
        #[test]
        fn prop_tree_order_independent(entries in prop::collection::vec(arb_tree_entry(), 1..20)) {
            let mut seen = std::collections::BTreeSet::new();
            let entries: Vec<TreeEntry> = entries
                .into_iter()
                .filter(|e| seen.insert(e.name.clone()))
                .collect();

            let mut reversed = entries.clone();
            reversed.reverse();

            prop_assert_eq!(encode_tree(entries), encode_tree(reversed));
        }
    }
}
