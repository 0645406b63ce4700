//! Virtual path mapping between references, source assets and artifacts.
//!
//! Every piece of extension arithmetic in the crate goes through
//! [`PathMapper`]. Paths are handled as strings because references may carry
//! unresolved alias prefixes (`@/img/icon.webp`) that are not filesystem
//! paths yet.
//!
//! # Extension rules
//!
//! Only the last dot of the final path segment counts, and a dot that starts
//! the segment (`.webp`, `.hidden`) does not introduce an extension. A path
//! without an extension is rejected instead of producing a malformed name.
//!
//! ```
//! use webpcache::paths::PathMapper;
//!
//! let mapper = PathMapper::new(".webp");
//! assert_eq!(mapper.strip_virtual_extension("./img/icon.webp"), "./img/icon");
//! assert_eq!(
//!     mapper.derive_virtual_artifact_path("/site/img/icon.png").unwrap(),
//!     "/site/img/icon.webp"
//! );
//! assert_eq!(
//!     mapper.with_content_tag("/site/img/icon.webp", "a1b2c3").unwrap(),
//!     "/site/img/icon.a1b2c3.webp"
//! );
//! assert_eq!(
//!     mapper.with_real_extension("@/img/icon.webp", ".png").unwrap(),
//!     "@/img/icon.png"
//! );
//! ```
//!
//! # Unicode
//!
//! macOS hands out NFD file names while references typed into source files
//! are usually NFC. [`normalize_path_str`] folds both to NFC so that store
//! listings and derived stems compare equal.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// The default virtual extension.
pub const DEFAULT_VIRTUAL_EXTENSION: &str = ".webp";

/// Errors produced by path mapping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The final path segment carries no extension.
    #[error("Path has no extension: {0}")]
    MissingExtension(String),

    /// The reference does not end with the virtual extension.
    #[error("Reference does not end with {extension}: {reference}")]
    NotVirtual {
        /// The offending reference
        reference: String,
        /// The configured virtual extension
        extension: String,
    },
}

/// Result alias for path mapping.
pub type PathResult<T> = Result<T, PathError>;

/// String transformations keyed to one virtual extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    virtual_extension: String,
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_EXTENSION)
    }
}

impl PathMapper {
    /// Create a mapper for the given virtual extension (including its dot).
    #[must_use]
    pub fn new(virtual_extension: impl Into<String>) -> Self {
        Self {
            virtual_extension: virtual_extension.into(),
        }
    }

    /// The virtual extension, including its leading dot.
    #[must_use]
    pub fn virtual_extension(&self) -> &str {
        &self.virtual_extension
    }

    /// Whether `reference` asks for the virtual format.
    ///
    /// The virtual extension alone (`.webp`) is not a reference to anything.
    #[must_use]
    pub fn is_virtual(&self, reference: &str) -> bool {
        reference
            .strip_suffix(&self.virtual_extension)
            .is_some_and(|stem| !stem.is_empty() && !stem.ends_with(is_separator))
    }

    /// Remove a trailing virtual extension; identity otherwise.
    #[must_use]
    pub fn strip_virtual_extension<'a>(&self, reference: &'a str) -> &'a str {
        if self.is_virtual(reference) {
            &reference[..reference.len() - self.virtual_extension.len()]
        } else {
            reference
        }
    }

    /// Replace the final extension of a resolved path with the virtual one.
    pub fn derive_virtual_artifact_path(&self, real_path: &str) -> PathResult<String> {
        Ok(format!("{}{}", stem_of(real_path)?, self.virtual_extension))
    }

    /// Insert `.<fingerprint>` immediately before the final extension.
    pub fn with_content_tag(&self, path: &str, fingerprint: &str) -> PathResult<String> {
        let dot = extension_dot(path)?;
        Ok(format!("{}.{}{}", &path[..dot], fingerprint, &path[dot..]))
    }

    /// Swap the virtual extension of an unresolved reference for `ext`.
    ///
    /// Works on the original request so alias prefixes survive the redirect.
    pub fn with_real_extension(&self, reference: &str, ext: &str) -> PathResult<String> {
        if !self.is_virtual(reference) {
            return Err(PathError::NotVirtual {
                reference: reference.to_string(),
                extension: self.virtual_extension.clone(),
            });
        }
        Ok(format!("{}{}", self.strip_virtual_extension(reference), ext))
    }
}

/// Extension of `path` including its dot, e.g. `.png`.
pub fn extension_of(path: &str) -> PathResult<&str> {
    Ok(&path[extension_dot(path)?..])
}

/// Everything before the final extension, directories included.
pub fn stem_of(path: &str) -> PathResult<&str> {
    Ok(&path[..extension_dot(path)?])
}

/// Directory part of `path`, or `.` for a bare file name.
#[must_use]
pub fn parent_of(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(0) => &path[..1],
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// File name without directories and without the final extension.
pub fn file_stem_of(path: &str) -> PathResult<&str> {
    let stem = stem_of(path)?;
    Ok(match stem.rfind(is_separator) {
        Some(idx) => &stem[idx + 1..],
        None => stem,
    })
}

/// Byte index of the dot that starts the final extension.
fn extension_dot(path: &str) -> PathResult<usize> {
    let segment_start = path.rfind(is_separator).map_or(0, |idx| idx + 1);
    match path[segment_start..].rfind('.') {
        Some(offset) if offset > 0 => Ok(segment_start + offset),
        _ => Err(PathError::MissingExtension(path.to_string())),
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}
