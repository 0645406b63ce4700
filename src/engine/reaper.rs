//! Removal of superseded cache artifacts.
//!
//! When a source asset's content changes, its old artifacts
//! (`icon.1a2b3c.webp`) are dead weight. In reclaiming mode the engine runs
//! the reaper right before writing the new artifact, so the file about to be
//! written does not exist yet and can't be caught by the sweep.

use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::paths::{normalize_path_str, PathMapper};
use crate::store::{ByteStore, StoreError};

/// Errors that can occur while reclaiming artifacts.
#[derive(Debug, Error)]
pub enum ReapError {
    /// Listing or removing failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The artifact name pattern could not be built.
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Deletes artifacts for one stem from one directory.
pub struct Reaper<'a> {
    store: &'a dyn ByteStore,
    mapper: &'a PathMapper,
}

impl<'a> Reaper<'a> {
    /// Create a reaper over `store` for the mapper's virtual extension.
    #[must_use]
    pub fn new(store: &'a dyn ByteStore, mapper: &'a PathMapper) -> Self {
        Self { store, mapper }
    }

    /// Pattern matching `<stem>.<hex of hash_length>.<virtual ext>` exactly.
    ///
    /// # Errors
    ///
    /// [`ReapError::Pattern`] if the regex can't be compiled.
    pub fn pattern(&self, stem: &str, hash_length: usize) -> Result<Regex, ReapError> {
        let pattern = format!(
            "^{}\\.[0-9a-f]{{{}}}{}$",
            regex::escape(&normalize_path_str(stem)),
            hash_length,
            regex::escape(self.mapper.virtual_extension()),
        );
        Ok(Regex::new(&pattern)?)
    }

    /// Remove every artifact of `stem` in `dir`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`ReapError`] if the directory can't be listed or a file can't be removed.
    pub fn reclaim(&self, dir: &Path, stem: &str, hash_length: usize) -> Result<usize, ReapError> {
        let pattern = self.pattern(stem, hash_length)?;
        let mut removed = 0;

        for name in self.store.list(dir)? {
            if pattern.is_match(&normalize_path_str(&name)) {
                let path = dir.join(&name);
                self.store.remove(&path)?;
                log::debug!("Reclaimed stale artifact {}", path.display());
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for name in [
            "icon.png",
            "icon.webp",
            "icon.1a2b3c.webp",
            "icon.ffffff.webp",
            "icon.1a2b3c4d.webp",
            "icon.ABCDEF.webp",
            "icon.1a2b3c.png",
            "iconic.1a2b3c.webp",
            "big-icon.1a2b3c.webp",
        ] {
            store.insert(format!("/img/{name}"), b"x".to_vec());
        }
        store.insert("/other/icon.1a2b3c.webp", b"x".to_vec());
        store
    }

    #[test]
    fn test_reclaim_only_matching_names() {
        let store = seeded();
        let mapper = PathMapper::default();
        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/img"), "icon", 6)
            .unwrap();

        assert_eq!(removed, 2);
        let left = store.list(Path::new("/img")).unwrap();
        assert!(!left.contains(&"icon.1a2b3c.webp".to_string()));
        assert!(!left.contains(&"icon.ffffff.webp".to_string()));
        for kept in [
            "icon.png",
            "icon.webp",
            "icon.1a2b3c4d.webp",
            "icon.ABCDEF.webp",
            "icon.1a2b3c.png",
            "iconic.1a2b3c.webp",
            "big-icon.1a2b3c.webp",
        ] {
            assert!(left.contains(&kept.to_string()), "{kept} should survive");
        }
        assert!(store.exists(Path::new("/other/icon.1a2b3c.webp")));
    }

    #[test]
    fn test_reclaim_respects_hash_length() {
        let store = seeded();
        let mapper = PathMapper::default();
        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/img"), "icon", 8)
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!store.exists(Path::new("/img/icon.1a2b3c4d.webp")));
        assert!(store.exists(Path::new("/img/icon.1a2b3c.webp")));
    }

    #[test]
    fn test_stem_is_escaped() {
        let store = MemoryStore::new();
        store.insert("/img/a.b.123456.webp", b"x".to_vec());
        store.insert("/img/aXb.123456.webp", b"x".to_vec());
        let mapper = PathMapper::default();

        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/img"), "a.b", 6)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.exists(Path::new("/img/aXb.123456.webp")));
    }

    #[test]
    fn test_reclaim_matches_nfd_listing() {
        let store = MemoryStore::new();
        store.insert("/img/cafe\u{0301}.123456.webp", b"x".to_vec());
        let mapper = PathMapper::default();

        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/img"), "café", 6)
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_reclaim_empty_directory() {
        let store = MemoryStore::new();
        let mapper = PathMapper::default();
        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/nothing"), "icon", 6)
            .unwrap();
        assert_eq!(removed, 0);
    }
}
