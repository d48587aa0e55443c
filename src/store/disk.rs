//! Persistent file-per-key cache backend.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::warn;

use super::Cache;

/// A [`Cache`] that persists each entry as a file under a root directory.
///
/// Keys are hashed to fixed-length hex filenames, so arbitrary key strings
/// (URLs with slashes, query strings) are safe. Writes go through a temporary
/// file followed by a rename, which keeps each `put` atomic; a concurrent
/// `get` sees either the old entry or the new one, never a torn write.
///
/// Entries survive process restarts; nothing is ever evicted.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Opens a disk cache rooted at `path`, creating the directory if needed.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let root = path.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the directory this cache writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(hex::encode(digest))
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.entry_path(key)) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, "failed to read from disk cache");
                None
            }
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, &value).and_then(|_| fs::rename(&tmp, &path));
        if let Err(e) = result {
            warn!(error = %e, "failed to write to disk cache");
            let _ = fs::remove_file(&tmp);
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.entry_path(key)) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(error = %e, "failed to delete from disk cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();

        assert_eq!(cache.get("http://example.com/a?q=1"), None);
        cache.put("http://example.com/a?q=1", b"payload".to_vec());
        assert_eq!(
            cache.get("http://example.com/a?q=1"),
            Some(b"payload".to_vec())
        );

        cache.delete("http://example.com/a?q=1");
        assert_eq!(cache.get("http://example.com/a?q=1"), None);
        // Deleting a missing key is a no-op.
        cache.delete("http://example.com/a?q=1");
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::open(dir.path()).unwrap();
            cache.put("key", b"persisted".to_vec());
        }
        let cache = DiskCache::open(dir.path()).unwrap();
        assert_eq!(cache.get("key"), Some(b"persisted".to_vec()));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        cache.put("http://example.com/a", b"a".to_vec());
        cache.put("http://example.com/b", b"b".to_vec());
        assert_eq!(cache.get("http://example.com/a"), Some(b"a".to_vec()));
        assert_eq!(cache.get("http://example.com/b"), Some(b"b".to_vec()));
    }
}
