//! Object store management and I/O.

use crate::error::{Error, Result};
use crate::hash::{Hash, HEX_LEN};
use crate::object::{self, ObjectKind};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// zstd compression level for stored records.
const COMPRESSION_LEVEL: i32 = 3;

/// A content-addressed object store.
///
/// Objects live under `objects/<2-hex>/<38-hex>` as compressed canonical
/// records. The store is append-only: objects are never mutated or deleted
/// after creation, and writing identical content twice is a no-op.
#[derive(Debug, Clone)]
pub struct Store {
    objects_dir: PathBuf,
}

impl Store {
    pub(crate) fn new(objects_dir: PathBuf) -> Self {
        Self { objects_dir }
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `objects/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir.join(hash.prefix()).join(hash.suffix())
    }

    /// Check whether an object exists in the store.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.object_path(hash).exists()
    }

    /// Write an object record.
    ///
    /// The full record is built in memory before any disk write, so a
    /// failure mid-write never leaves a partial object. If the target path
    /// already exists the content is identical by construction and the
    /// write is skipped.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<Hash> {
        let record = object::encode_record(kind, payload);
        let hash = Hash::digest(&record);

        let obj_path = self.object_path(&hash);
        if obj_path.exists() {
            return Ok(hash);
        }

        let compressed = zstd::encode_all(&record[..], COMPRESSION_LEVEL)?;

        let parent = obj_path.parent().unwrap();
        fs::create_dir_all(parent).map_err(|e| Error::unwritable(parent, e))?;

        // Write atomically using tempfile
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::unwritable(&obj_path, e))?;
        temp_file
            .write_all(&compressed)
            .map_err(|e| Error::unwritable(&obj_path, e))?;
        temp_file
            .flush()
            .map_err(|e| Error::unwritable(&obj_path, e))?;
        temp_file
            .persist(&obj_path)
            .map_err(|e| Error::unwritable(&obj_path, e.error))?;

        Ok(hash)
    }

    /// Read an object record.
    ///
    /// Fails with `NotFound` if the object is absent, `CorruptObject` if
    /// decompression or record validation fails, and `TypeMismatch` if
    /// `expected` is given and the stored kind differs.
    pub fn read(&self, hash: &Hash, expected: Option<ObjectKind>) -> Result<(ObjectKind, Vec<u8>)> {
        let obj_path = self.object_path(hash);

        if !obj_path.exists() {
            return Err(Error::not_found(format!("object {}", hash)));
        }

        let compressed = fs::read(&obj_path)?;
        let record = zstd::decode_all(&compressed[..])
            .map_err(|e| Error::corrupt(hash.to_hex(), format!("decompression failed: {}", e)))?;

        let (kind, payload) = object::decode_record(&hash.to_hex(), &record)?;

        if let Some(expected) = expected
            && kind != expected
        {
            return Err(Error::type_mismatch(expected.as_str(), kind.as_str()));
        }

        Ok((kind, payload))
    }

    /// Get the kind of a stored object.
    pub fn kind_of(&self, hash: &Hash) -> Result<ObjectKind> {
        let (kind, _) = self.read(hash, None)?;
        Ok(kind)
    }

    /// Find all stored objects whose hex form starts with `prefix`.
    ///
    /// Scans the directory fan-out; used by short-hash resolution. The
    /// returned hashes are sorted.
    pub fn find_prefix(&self, prefix: &str) -> Result<Vec<Hash>> {
        let mut matches = Vec::new();

        if prefix.len() < 2 || prefix.len() > HEX_LEN || !self.objects_dir.exists() {
            return Ok(matches);
        }

        for entry in fs::read_dir(&self.objects_dir)? {
            let entry = entry?;
            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                continue;
            };
            if dir_name.len() != 2 || dir_name != &prefix[..2] {
                continue;
            }

            for obj in fs::read_dir(entry.path())? {
                let obj = obj?;
                let file_name = obj.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };

                let full = format!("{}{}", dir_name, file_name);
                if full.starts_with(prefix)
                    && let Ok(hash) = Hash::from_hex(&full)
                {
                    matches.push(hash);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Count the objects in the store.
    pub fn count_objects(&self) -> Result<usize> {
        let mut count = 0;

        if !self.objects_dir.exists() {
            return Ok(count);
        }

        for entry in fs::read_dir(&self.objects_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                count += fs::read_dir(entry.path())?.count();
            }
        }

        Ok(count)
    }

    /// Get the objects directory of the store.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}
