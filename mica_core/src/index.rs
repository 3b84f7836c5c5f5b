//! Staged-path index.
//!
//! The index is a newline-delimited list of relative paths pending the
//! next commit, ordered by first staging and deduplicated.

use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// The staged file list backing the next commit.
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
}

impl Index {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the staged paths in staging order.
    pub fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Append paths not already staged. Returns the paths actually added.
    pub fn add(&self, paths: &[String]) -> Result<Vec<String>> {
        let staged = self.read()?;
        let mut added = Vec::new();

        for path in paths {
            if !staged.contains(path) && !added.contains(path) {
                added.push(path.clone());
            }
        }

        if !added.is_empty() {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| Error::unwritable(&self.path, e))?;

            for path in &added {
                writeln!(file, "{}", path).map_err(|e| Error::unwritable(&self.path, e))?;
            }
        }

        Ok(added)
    }

    /// Remove every staged path.
    pub fn clear(&self) -> Result<()> {
        fs::write(&self.path, "").map_err(|e| Error::unwritable(&self.path, e))
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_index() -> (TempDir, Index) {
        let temp_dir = TempDir::new().unwrap();
        let index = Index::new(temp_dir.path().join("index"));
        (temp_dir, index)
    }

    #[test]
    fn test_read_missing_file() {
        let (_tmp, index) = test_index();
        assert!(index.read().unwrap().is_empty());
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_add_preserves_order() {
        let (_tmp, index) = test_index();

        index
            .add(&["z.txt".to_string(), "a.txt".to_string()])
            .unwrap();

        assert_eq!(index.read().unwrap(), vec!["z.txt", "a.txt"]);
    }

    #[test]
    fn test_add_deduplicates() {
        let (_tmp, index) = test_index();

        index.add(&["a.txt".to_string()]).unwrap();
        let added = index
            .add(&["a.txt".to_string(), "b.txt".to_string(), "b.txt".to_string()])
            .unwrap();

        assert_eq!(added, vec!["b.txt"]);
        assert_eq!(index.read().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_clear() {
        let (_tmp, index) = test_index();

        index.add(&["a.txt".to_string()]).unwrap();
        index.clear().unwrap();

        assert!(index.is_empty().unwrap());
    }
}
