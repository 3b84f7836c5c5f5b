//! Canonical object records.
//!
//! Every stored object is a byte record of the form:
//!
//! ```text
//! <kind> <payload-length>\0<payload>
//! ```
//!
//! The object's identity is the SHA-1 digest of the full record, so the
//! header participates in the hash. Records are compressed on disk; the
//! hash is always computed over the uncompressed record.

use crate::error::{Error, Result};
use crate::hash::Hash;
use std::fmt;

/// Object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Raw file content.
    Blob,
    /// A directory listing of named blob/subtree children.
    Tree,
    /// A tree snapshot plus parent links and metadata.
    Commit,
}

impl ObjectKind {
    /// Get the header name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    /// Parse a header name. Unknown kinds yield None; callers reject them
    /// as corrupt.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encode a full object record: header plus payload.
pub fn encode_record(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.as_str(), payload.len());
    let mut record = Vec::with_capacity(header.len() + payload.len());
    record.extend_from_slice(header.as_bytes());
    record.extend_from_slice(payload);
    record
}

/// Decode and validate an object record.
///
/// `what` names the object (hash or path) for error reporting. Fails with
/// `CorruptObject` when the header is malformed, the kind is unknown, or
/// the payload length disagrees with the declared length.
pub fn decode_record(what: &str, record: &[u8]) -> Result<(ObjectKind, Vec<u8>)> {
    let nul = record
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::corrupt(what, "missing header terminator"))?;

    let header = std::str::from_utf8(&record[..nul])
        .map_err(|_| Error::corrupt(what, "header is not valid UTF-8"))?;

    let (kind_str, len_str) = header
        .split_once(' ')
        .ok_or_else(|| Error::corrupt(what, format!("malformed header '{}'", header)))?;

    let kind = ObjectKind::parse(kind_str)
        .ok_or_else(|| Error::corrupt(what, format!("unknown object kind '{}'", kind_str)))?;

    let declared: usize = len_str
        .parse()
        .map_err(|_| Error::corrupt(what, format!("invalid payload length '{}'", len_str)))?;

    let payload = &record[nul + 1..];
    if payload.len() != declared {
        return Err(Error::corrupt(
            what,
            format!(
                "payload length mismatch: header declares {}, got {}",
                declared,
                payload.len()
            ),
        ));
    }

    Ok((kind, payload.to_vec()))
}

/// Compute the identity of an object without storing it.
pub fn hash_object(kind: ObjectKind, payload: &[u8]) -> Hash {
    Hash::digest(&encode_record(kind, payload))
}
