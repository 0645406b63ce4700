//! Filesystem-backed byte store.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use super::{ByteStore, StoreError, StoreResult};

/// Prefix of the temporary files used for atomic writes.
const TEMP_PREFIX: &str = ".webpcache-";

/// Byte store over the local filesystem.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the target, so a failed write never leaves a truncated
/// artifact that a later run would mistake for a cache hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    /// Create a new filesystem store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ByteStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        log::trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn list(&self, dir: &Path) -> StoreResult<Vec<String>> {
        let io_err = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove(&self, path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("icon.abc123.webp");
        let store = FsStore::new();

        assert!(!store.exists(&path));
        store.write(&path, b"webp bytes").unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.read(&path).unwrap(), b"webp bytes");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let err = FsStore::new().read(&dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_exists_is_false_for_directories() {
        let dir = tempdir().unwrap();
        assert!(!FsStore::new().exists(dir.path()));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FsStore::new();
        store.write(&dir.path().join("a.webp"), b"a").unwrap();
        store.write(&dir.path().join("a.webp"), b"b").unwrap();

        assert_eq!(store.list(dir.path()).unwrap(), vec!["a.webp".to_string()]);
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("a.webp");
        let err = FsStore::new().write(&path, b"x").unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_list_skips_directories_and_missing_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();

        let store = FsStore::new();
        assert_eq!(store.list(dir.path()).unwrap(), vec!["a.png", "b.png"]);
        assert!(store.list(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.webp");
        fs::write(&path, b"a").unwrap();

        let store = FsStore::new();
        store.remove(&path).unwrap();
        store.remove(&path).unwrap();
        assert!(!path.exists());
    }
}
