//! Transformation decision engine.
//!
//! # Overview
//!
//! Given a reference ending in the virtual extension, the engine decides what
//! the reference should point at and does at most one transformation per
//! distinct source content. The steps run strictly in order and the first
//! one that applies ends the request:
//!
//! 1. **Resolve**: strip the virtual extension and resolve the stem to a real
//!    source asset.
//! 2. **Hand-authored variant / missing source**: leave the reference alone.
//! 3. **Inline threshold**: small sources are redirected to the original.
//! 4. **Cache hit**: a fingerprinted artifact already exists.
//! 5. **Size regression**: the encoded output is not smaller; use the original.
//! 6. **Commit**: reclaim stale artifacts (optional), write, redirect.
//!
//! All cache state lives in the [`ByteStore`]: the engine keeps nothing in
//! memory between requests, so it can be shared freely across threads. Two
//! concurrent requests for the same content may both transform and both
//! write; the artifact path is derived from the content, so the second write
//! lands the same bytes on the same name.
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use webpcache::codec::{CodecError, CodecParams};
//! use webpcache::engine::{Decision, Engine, TransformConfig};
//! use webpcache::resolver::{ResolveContext, ResolveError};
//! use webpcache::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert("/img/icon.png", vec![7u8; 20_000]);
//!
//! let resolver = |_: &ResolveContext, req: &str, _: &[String]| -> Result<PathBuf, ResolveError> {
//!     Ok(PathBuf::from(format!("/img/{}.png", req.trim_start_matches("./"))))
//! };
//! let codec = |_: &[u8], _: &CodecParams| -> Result<Vec<u8>, CodecError> { Ok(vec![1u8; 15_000]) };
//!
//! let engine = Engine::new(TransformConfig::default(), store, Arc::new(resolver), Arc::new(codec));
//! let decision = engine.process(&ResolveContext::new("/img"), "./icon.webp").unwrap();
//! assert!(matches!(decision, Decision::Transformed { .. }));
//! assert!(decision.reference().unwrap().ends_with(".webp"));
//! ```

pub mod reaper;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{Codec, CodecError, CodecParams};
use crate::fingerprint::{fingerprint, DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH};
use crate::paths::{self, PathError, PathMapper, DEFAULT_VIRTUAL_EXTENSION};
use crate::resolver::{ResolveContext, ResolveError, Resolver};
use crate::store::{ByteStore, StoreError};

pub use reaper::{ReapError, Reaper};

/// Size below which bundlers inline assets instead of emitting files.
pub const DEFAULT_INLINE_LIMIT: u64 = 8 * 1024;

/// Source extensions tried by default, in order.
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Settings for one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Extension that asks for the optimised variant, including the dot.
    pub virtual_extension: String,
    /// Acceptable source extensions, tried in order.
    pub extensions: Vec<String>,
    /// Hex characters of the fingerprint kept in artifact names, 1 to 64.
    pub hash_length: usize,
    /// Passed to the codec untouched.
    pub codec: CodecParams,
    /// Inline threshold in bytes; `None` means [`DEFAULT_INLINE_LIMIT`].
    pub inline_limit: Option<u64>,
    /// Remove superseded artifacts before writing a new one.
    pub reclaim: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            virtual_extension: DEFAULT_VIRTUAL_EXTENSION.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            hash_length: DEFAULT_HASH_LENGTH,
            codec: CodecParams::default(),
            inline_limit: None,
            reclaim: false,
        }
    }
}

impl TransformConfig {
    /// The effective inline threshold.
    #[must_use]
    pub fn inline_limit(&self) -> u64 {
        self.inline_limit.unwrap_or(DEFAULT_INLINE_LIMIT)
    }

    /// Set the acceptable source extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the fingerprint length.
    #[must_use]
    pub fn with_hash_length(mut self, length: usize) -> Self {
        self.hash_length = length;
        self
    }

    /// Set the inline threshold.
    #[must_use]
    pub fn with_inline_limit(mut self, limit: u64) -> Self {
        self.inline_limit = Some(limit);
        self
    }

    /// Enable or disable reclaiming mode.
    #[must_use]
    pub fn with_reclaim(mut self, enabled: bool) -> Self {
        self.reclaim = enabled;
        self
    }

    /// Set the codec parameters.
    #[must_use]
    pub fn with_codec_params(mut self, params: CodecParams) -> Self {
        self.codec = params;
        self
    }

    /// Set the virtual extension.
    #[must_use]
    pub fn with_virtual_extension(mut self, ext: impl Into<String>) -> Self {
        self.virtual_extension = ext.into();
        self
    }
}

/// Why a reference was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An un-fingerprinted variant already ships next to the source.
    HandAuthoredVariant,
    /// The resolved source asset is not in the store.
    MissingSource,
}

/// Why a reference was redirected to the original asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalReason {
    /// The source is small enough to be inlined as is.
    BelowInlineLimit,
    /// The encoded variant would not be smaller.
    SizeRegression,
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// Leave the reference as it was.
    Skip {
        /// Resolved source asset
        source: PathBuf,
        /// Why nothing was done
        reason: SkipReason,
    },
    /// Point the reference at the original asset.
    Original {
        /// Rewritten reference with the real extension
        reference: String,
        /// Resolved source asset
        source: PathBuf,
        /// Source size in bytes
        size: u64,
        /// Why the original wins
        reason: OriginalReason,
    },
    /// An artifact for this content already exists.
    CacheHit {
        /// Rewritten reference carrying the content tag
        reference: String,
        /// Existing artifact
        artifact: PathBuf,
    },
    /// A new artifact was written.
    Transformed {
        /// Rewritten reference carrying the content tag
        reference: String,
        /// Newly written artifact
        artifact: PathBuf,
        /// Source size in bytes
        original_size: u64,
        /// Artifact size in bytes
        transformed_size: u64,
        /// Stale artifacts removed before the write
        reclaimed: usize,
    },
}

impl Decision {
    /// The rewritten reference, or `None` when it stays as it was.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Skip { .. } => None,
            Self::Original { reference, .. }
            | Self::CacheHit { reference, .. }
            | Self::Transformed { reference, .. } => Some(reference),
        }
    }

    /// Short machine-readable outcome name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skip { .. } => "skip",
            Self::Original { .. } => "original",
            Self::CacheHit { .. } => "cache_hit",
            Self::Transformed { .. } => "transformed",
        }
    }

    /// Bytes saved by a new artifact; zero for every other outcome.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        match self {
            Self::Transformed {
                original_size,
                transformed_size,
                ..
            } => original_size.saturating_sub(*transformed_size),
            _ => 0,
        }
    }
}

/// Errors that abort a request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The reference does not end with the virtual extension.
    #[error("Not a {extension} reference: {reference}")]
    NotVirtual {
        /// The offending reference
        reference: String,
        /// The configured virtual extension
        extension: String,
    },

    /// No acceptable source asset was found.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A path could not be mapped.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The byte store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The codec rejected the source.
    #[error("Failed to transcode {path}: {source}")]
    Codec {
        /// Source asset being transcoded
        path: PathBuf,
        /// The codec failure
        #[source]
        source: CodecError,
    },

    /// Stale artifacts could not be reclaimed.
    #[error(transparent)]
    Reap(#[from] ReapError),
}

/// The decision engine with its injected collaborators.
#[derive(Clone)]
pub struct Engine {
    config: TransformConfig,
    mapper: PathMapper,
    store: Arc<dyn ByteStore>,
    resolver: Arc<dyn Resolver>,
    codec: Arc<dyn Codec>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &"<store>")
            .field("resolver", &"<resolver>")
            .field("codec", &"<codec>")
            .finish()
    }
}

impl Engine {
    /// Create an engine.
    ///
    /// `hash_length` is clamped to `1..=MAX_HASH_LENGTH`: an empty tag would
    /// make every content version share one artifact, and the reaper must
    /// match the length the fingerprint actually has.
    #[must_use]
    pub fn new(
        mut config: TransformConfig,
        store: Arc<dyn ByteStore>,
        resolver: Arc<dyn Resolver>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let clamped = config.hash_length.clamp(1, MAX_HASH_LENGTH);
        if clamped != config.hash_length {
            log::warn!(
                "hash_length {} out of range, using {}",
                config.hash_length,
                clamped
            );
            config.hash_length = clamped;
        }
        let mapper = PathMapper::new(config.virtual_extension.clone());
        Self {
            config,
            mapper,
            store,
            resolver,
            codec,
        }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// The path mapper for the configured virtual extension.
    #[must_use]
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// A reaper over the engine's store.
    #[must_use]
    pub fn reaper(&self) -> Reaper<'_> {
        Reaper::new(self.store.as_ref(), &self.mapper)
    }

    /// Decide what `reference` should point at, transforming if needed.
    ///
    /// # Errors
    ///
    /// [`EngineError`] on resolution, store, codec or reaper failure. Nothing
    /// is retried and nothing is swallowed.
    pub fn process(&self, ctx: &ResolveContext, reference: &str) -> Result<Decision, EngineError> {
        if !self.mapper.is_virtual(reference) {
            return Err(EngineError::NotVirtual {
                reference: reference.to_string(),
                extension: self.mapper.virtual_extension().to_string(),
            });
        }

        // 1. Resolve
        let request = self.mapper.strip_virtual_extension(reference);
        let source = self
            .resolver
            .resolve(ctx, request, &self.config.extensions)?;
        let source_str = source
            .to_str()
            .ok_or_else(|| ResolveError::NonUtf8(source.clone()))?;
        let virtual_path = self.mapper.derive_virtual_artifact_path(source_str)?;
        log::trace!("{} resolved to {}", reference, source.display());

        // 2. Hand-authored variant or missing source
        if self.store.exists(Path::new(&virtual_path)) {
            log::debug!("{}: hand-authored {} exists, skipping", reference, virtual_path);
            return Ok(Decision::Skip {
                source,
                reason: SkipReason::HandAuthoredVariant,
            });
        }
        if !self.store.exists(&source) {
            log::debug!("{}: source {} is missing, skipping", reference, source.display());
            return Ok(Decision::Skip {
                source,
                reason: SkipReason::MissingSource,
            });
        }

        // 3. Inline threshold
        let bytes = self.store.read(&source)?;
        let size = bytes.len() as u64;
        let real_ext = paths::extension_of(source_str)?;
        if size < self.config.inline_limit() {
            let rewritten = self.mapper.with_real_extension(reference, real_ext)?;
            log::debug!(
                "{}: {} bytes is below the inline limit, using {}",
                reference,
                size,
                rewritten
            );
            return Ok(Decision::Original {
                reference: rewritten,
                source,
                size,
                reason: OriginalReason::BelowInlineLimit,
            });
        }

        // 4. Cache hit
        let fp = fingerprint(&bytes, self.config.hash_length);
        let artifact = PathBuf::from(self.mapper.with_content_tag(&virtual_path, &fp)?);
        let tagged = self.mapper.with_content_tag(reference, &fp)?;
        if self.store.exists(&artifact) {
            log::debug!("{}: cache hit {}", reference, artifact.display());
            return Ok(Decision::CacheHit {
                reference: tagged,
                artifact,
            });
        }

        // 5. Transform and guard against growth
        let encoded = self
            .codec
            .transcode(&bytes, &self.config.codec)
            .map_err(|e| EngineError::Codec {
                path: source.clone(),
                source: e,
            })?;
        let transformed_size = encoded.len() as u64;
        if transformed_size >= size {
            let rewritten = self.mapper.with_real_extension(reference, real_ext)?;
            log::debug!(
                "{}: encoded {} bytes >= original {} bytes, using {}",
                reference,
                transformed_size,
                size,
                rewritten
            );
            return Ok(Decision::Original {
                reference: rewritten,
                source,
                size,
                reason: OriginalReason::SizeRegression,
            });
        }

        // 6. Commit
        let reclaimed = if self.config.reclaim {
            let dir = Path::new(paths::parent_of(source_str));
            let stem = paths::file_stem_of(source_str)?;
            self.reaper().reclaim(dir, stem, self.config.hash_length)?
        } else {
            0
        };
        self.store.write(&artifact, &encoded)?;
        log::debug!(
            "{}: wrote {} ({} -> {} bytes)",
            reference,
            artifact.display(),
            size,
            transformed_size
        );

        Ok(Decision::Transformed {
            reference: tagged,
            artifact,
            original_size: size,
            transformed_size,
            reclaimed,
        })
    }
}
