//! BLAKE3 content fingerprints.
//!
//! # Overview
//!
//! A fingerprint is the lowercase hex rendering of a BLAKE3 digest, cut down
//! to a configurable number of characters. It is embedded in cache artifact
//! names, so equal bytes must always produce the same string.
//!
//! # Example
//!
//! ```
//! use webpcache::fingerprint::{fingerprint, DEFAULT_HASH_LENGTH};
//!
//! let fp = fingerprint(b"icon bytes", DEFAULT_HASH_LENGTH);
//! assert_eq!(fp.len(), 6);
//! assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
//! ```

/// Number of hex characters kept by default.
pub const DEFAULT_HASH_LENGTH: usize = 6;

/// Hex characters in a full BLAKE3 digest.
pub const MAX_HASH_LENGTH: usize = 64;

/// Compute the fingerprint of `bytes`, keeping `length` hex characters.
///
/// Lengths above [`MAX_HASH_LENGTH`] return the full digest.
#[must_use]
pub fn fingerprint(bytes: &[u8], length: usize) -> String {
    let hex = blake3::hash(bytes).to_hex();
    hex[..length.min(MAX_HASH_LENGTH)].to_string()
}
