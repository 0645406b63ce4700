//! Byte store probe for cache artifacts and source assets.
//!
//! Cache validity is defined entirely by what the store holds: a tagged
//! artifact that exists is a cache hit, and there is no manifest. Nothing in
//! this module caches results, so every call reflects current store state.
//!
//! # Architecture
//!
//! * [`ByteStore`]: the abstract interface the engine and reaper are written against.
//! * [`fs`]: the real filesystem, with atomic writes.
//! * [`memory`]: an in-process map, used by tests and by embedders that stage
//!   assets in memory.

pub mod fs;
pub mod memory;

use std::path::{Path, PathBuf};

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Errors that can occur while talking to a byte store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The requested path does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Writing failed; nothing was left at the target path.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Target path of the write
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Existence checks, reads and writes against an external store.
pub trait ByteStore: Send + Sync {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read the whole file at `path`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if nothing is stored at `path`.
    fn read(&self, path: &Path) -> StoreResult<Vec<u8>>;

    /// Write `bytes` to `path` as a single unit.
    ///
    /// Implementations must not leave a partial file behind on failure.
    fn write(&self, path: &Path, bytes: &[u8]) -> StoreResult<()>;

    /// File names (not paths) directly inside `dir`.
    ///
    /// A missing directory lists as empty.
    fn list(&self, dir: &Path) -> StoreResult<Vec<String>>;

    /// Remove the file at `path`. Removing an absent file succeeds.
    fn remove(&self, path: &Path) -> StoreResult<()>;
}
