//! Append-only operation log.
//!
//! Every state-changing operation (commit, checkout, publish, branch
//! creation) appends one tab-delimited line to `.mica/log`:
//!
//! ```text
//! <unix-seconds>\t<operation>\t<hash-or-dash>\t<detail>
//! ```

use crate::error::{Error, Result};
use crate::hash::Hash;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// A recorded operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReflogEntry {
    /// Unix timestamp when the operation occurred.
    pub timestamp: i64,
    /// Operation name (e.g. "commit", "checkout").
    pub operation: String,
    /// Commit hash the operation produced or moved to, if any.
    pub hash: Option<Hash>,
    /// Free-form detail, e.g. the branch and message summary.
    pub detail: String,
}

impl ReflogEntry {
    pub fn new(timestamp: i64, operation: impl Into<String>, hash: Option<Hash>, detail: impl Into<String>) -> Self {
        Self {
            timestamp,
            operation: operation.into(),
            hash,
            detail: detail.into(),
        }
    }

    fn to_line(&self) -> String {
        let hash = self
            .hash
            .map(|h| h.to_hex())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}\t{}\t{}\t{}",
            self.timestamp, self.operation, hash, self.detail
        )
    }

    fn from_line(line: &str) -> Result<Self> {
        let mut fields = line.splitn(4, '\t');
        let (Some(ts), Some(op), Some(hash), Some(detail)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::corrupt(
                "reflog",
                format!("expected 4 fields in '{}'", line),
            ));
        };

        let timestamp: i64 = ts
            .parse()
            .map_err(|_| Error::corrupt("reflog", format!("invalid timestamp '{}'", ts)))?;

        let hash = if hash == "-" {
            None
        } else {
            Some(
                Hash::from_hex(hash)
                    .map_err(|_| Error::corrupt("reflog", format!("invalid hash '{}'", hash)))?,
            )
        };

        Ok(Self {
            timestamp,
            operation: op.to_string(),
            hash,
            detail: detail.to_string(),
        })
    }
}

/// The repository's operation log.
#[derive(Debug, Clone)]
pub struct Reflog {
    path: PathBuf,
}

impl Reflog {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry.
    pub fn append(&self, entry: &ReflogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::unwritable(&self.path, e))?;

        writeln!(file, "{}", entry.to_line()).map_err(|e| Error::unwritable(&self.path, e))?;
        Ok(())
    }

    /// Read the most recent `count` entries, oldest first.
    pub fn read_recent(&self, count: usize) -> Result<Vec<ReflogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = ReflogEntry::from_line(&line) {
                entries.push(entry);
            }
        }

        if count < entries.len() {
            entries.drain(..entries.len() - count);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_reflog() -> (TempDir, Reflog) {
        let temp_dir = TempDir::new().unwrap();
        let reflog = Reflog::new(temp_dir.path().join("log"));
        (temp_dir, reflog)
    }

    #[test]
    fn test_entry_line_roundtrip() {
        let entry = ReflogEntry::new(
            1736900000,
            "commit",
            Some(Hash::digest(b"c")),
            "main: first commit",
        );

        let parsed = ReflogEntry::from_line(&entry.to_line()).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_entry_without_hash() {
        let entry = ReflogEntry::new(1736900000, "checkout", None, "feature: empty");
        let parsed = ReflogEntry::from_line(&entry.to_line()).unwrap();
        assert_eq!(parsed.hash, None);
    }

    #[test]
    fn test_entry_invalid_line() {
        assert!(ReflogEntry::from_line("only\ttwo").is_err());
    }

    #[test]
    fn test_append_and_read_recent() {
        let (_tmp, reflog) = test_reflog();

        for i in 0..5 {
            reflog
                .append(&ReflogEntry::new(1736900000 + i, "commit", None, format!("op {}", i)))
                .unwrap();
        }

        let recent = reflog.read_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].detail, "op 3");
        assert_eq!(recent[1].detail, "op 4");
    }

    #[test]
    fn test_read_recent_missing_file() {
        let (_tmp, reflog) = test_reflog();
        assert!(reflog.read_recent(10).unwrap().is_empty());
    }
}
