//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, else `./webpcache.toml`, else the platform
//!    config directory)
//! 3. `WEBPCACHE_*` environment variables, nested keys split on `__`
//!    (`WEBPCACHE_CODEC__QUALITY=70`)
//! 4. CLI flags, applied by the caller
//!
//! The build mode is read here once, so the engine never looks at the
//! process environment itself: `WEBPCACHE_MODE=development` turns reclaiming
//! on unless `reclaim` is set explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::codec::CodecParams;
use crate::engine::{TransformConfig, DEFAULT_EXTENSIONS};
use crate::fingerprint::{DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH};
use crate::paths::DEFAULT_VIRTUAL_EXTENSION;
use crate::resolver::ResolveContext;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "WEBPCACHE_";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "webpcache.toml";

/// Build mode of the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Long-lived published output; artifacts are never reclaimed by default.
    #[default]
    Production,
    /// Local iteration; superseded artifacts are reclaimed by default.
    Development,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extension that asks for the optimised variant.
    pub virtual_extension: String,
    /// Acceptable source extensions, tried in order.
    pub extensions: Vec<String>,
    /// Fingerprint length in hex characters.
    pub hash_length: usize,
    /// Parameters passed to the codec.
    pub codec: CodecParams,
    /// Inline threshold in bytes.
    pub inline_limit: Option<u64>,
    /// Build mode.
    pub mode: BuildMode,
    /// Explicit reclaiming override; `None` follows the build mode.
    pub reclaim: Option<bool>,
    /// Resolver aliases.
    pub aliases: BTreeMap<String, PathBuf>,
    /// Worker threads for `warm`.
    pub io_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            virtual_extension: DEFAULT_VIRTUAL_EXTENSION.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            hash_length: DEFAULT_HASH_LENGTH,
            codec: CodecParams::default(),
            inline_limit: None,
            mode: BuildMode::default(),
            reclaim: None,
            aliases: BTreeMap::new(),
            io_threads: 4,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; the implicit locations are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a layer fails to
    /// parse, or the result does not validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) if !p.exists() => {
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        Self::load_from_path(file)
    }

    /// Load defaults, the given file (if any) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer fails to parse or validation fails.
    pub fn load_from_path(file: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = &file {
            log::debug!("Loading config from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// First existing implicit config file.
    fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        ProjectDirs::from("com", "webpcache", "webpcache")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|p| p.is_file())
    }

    /// Check values the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !is_extension(&self.virtual_extension) {
            anyhow::bail!(
                "virtual_extension must look like '.webp', got '{}'",
                self.virtual_extension
            );
        }
        if self.extensions.is_empty() {
            anyhow::bail!("extensions must not be empty");
        }
        if let Some(bad) = self.extensions.iter().find(|e| !is_extension(e)) {
            anyhow::bail!("extension must look like '.png', got '{bad}'");
        }
        if self.extensions.contains(&self.virtual_extension) {
            anyhow::bail!(
                "virtual_extension '{}' can't also be a source extension",
                self.virtual_extension
            );
        }
        if self.hash_length == 0 || self.hash_length > MAX_HASH_LENGTH {
            anyhow::bail!(
                "hash_length must be between 1 and {MAX_HASH_LENGTH}, got {}",
                self.hash_length
            );
        }
        if !(0.0..=100.0).contains(&self.codec.quality) {
            anyhow::bail!("codec.quality must be between 0 and 100, got {}", self.codec.quality);
        }
        Ok(())
    }

    /// Whether reclaiming runs: the explicit override, else the build mode.
    #[must_use]
    pub fn reclaim_enabled(&self) -> bool {
        self.reclaim.unwrap_or(self.mode == BuildMode::Development)
    }

    /// Engine settings with the reclaim flag resolved.
    #[must_use]
    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            virtual_extension: self.virtual_extension.clone(),
            extensions: self.extensions.clone(),
            hash_length: self.hash_length,
            codec: self.codec,
            inline_limit: self.inline_limit,
            reclaim: self.reclaim_enabled(),
        }
    }

    /// Resolution context rooted at `base_dir` with the configured aliases.
    #[must_use]
    pub fn resolve_context(&self, base_dir: &Path) -> ResolveContext {
        ResolveContext {
            base_dir: base_dir.to_path_buf(),
            aliases: self.aliases.clone(),
        }
    }
}

/// `.` followed by at least one character and no further dots or separators.
fn is_extension(ext: &str) -> bool {
    ext.strip_prefix('.')
        .is_some_and(|rest| !rest.is_empty() && !rest.contains(['.', '/', '\\']))
}
