//! Command-line interface definitions for webpcache.
//!
//! Global options (verbosity, config file) come first, then a subcommand.
//!
//! # Example
//!
//! ```bash
//! # Rewrite references the way a bundler hook would
//! webpcache rewrite ./img/icon.webp @/img/hero.webp --context ./src --alias @=./src
//!
//! # Pre-build variants for a whole asset tree
//! webpcache warm ./public --io-threads 8
//!
//! # Drop every cached variant of an asset
//! webpcache reclaim ./public/img/icon.png
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{BuildMode, Config};

/// Build-time WebP substitution cache.
///
/// Resolves `.webp` references to their PNG/JPEG sources, writes a
/// content-addressed WebP variant once per distinct content, and rewrites the
/// reference to the variant or back to the original.
#[derive(Debug, Parser)]
#[command(name = "webpcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE", env = "WEBPCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite virtual references and print the result
    Rewrite(RewriteArgs),
    /// Build variants for every source asset under a directory
    Warm(WarmArgs),
    /// Remove all cached variants of the given source assets
    Reclaim(ReclaimArgs),
}

/// Arguments for the rewrite subcommand.
#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// References ending in the virtual extension
    #[arg(value_name = "REFERENCE", required = true)]
    pub references: Vec<String>,

    /// Directory relative references are resolved against
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub context: PathBuf,

    /// Resolver alias as PREFIX=DIR (can be specified multiple times)
    #[arg(long = "alias", value_name = "PREFIX=DIR", value_parser = parse_alias)]
    pub aliases: Vec<(String, PathBuf)>,

    /// Leave failing references untouched instead of stopping
    #[arg(long)]
    pub keep_going: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Arguments for the warm subcommand.
#[derive(Debug, Args)]
pub struct WarmArgs {
    /// Root directory to walk
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Number of worker threads (default: 4)
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Arguments for the reclaim subcommand.
#[derive(Debug, Args)]
pub struct ReclaimArgs {
    /// Source assets whose variants should be removed
    #[arg(value_name = "SOURCE", required = true)]
    pub sources: Vec<PathBuf>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Engine settings that override the configuration file.
#[derive(Debug, Args, Default)]
pub struct TransformArgs {
    /// Virtual extension (e.g. .webp)
    #[arg(long, value_name = "EXT")]
    pub virtual_ext: Option<String>,

    /// Acceptable source extension, in priority order (can be specified multiple times)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Fingerprint length in hex characters
    #[arg(long, value_name = "N")]
    pub hash_length: Option<usize>,

    /// Encoder quality (0-100), for lossy codecs
    ///
    /// The bundled WebP codec writes lossless output only and ignores this.
    #[arg(long, value_name = "Q")]
    pub quality: Option<f32>,

    /// Request lossless encoding
    #[arg(long)]
    pub lossless: bool,

    /// Sources smaller than this are left to be inlined (e.g. 8KiB, 10KB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub inline_limit: Option<u64>,

    /// Build mode; development turns reclaiming on
    #[arg(long, value_enum)]
    pub mode: Option<BuildMode>,

    /// Remove superseded variants before writing a new one
    #[arg(long, overrides_with = "no_reclaim")]
    pub reclaim: bool,

    /// Never remove superseded variants
    #[arg(long, overrides_with = "reclaim")]
    pub no_reclaim: bool,
}

impl TransformArgs {
    /// Apply the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ext) = &self.virtual_ext {
            config.virtual_extension = ext.clone();
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }
        if let Some(len) = self.hash_length {
            config.hash_length = len;
        }
        if let Some(quality) = self.quality {
            config.codec.quality = quality;
        }
        if self.lossless {
            config.codec.lossless = true;
        }
        if let Some(limit) = self.inline_limit {
            config.inline_limit = Some(limit);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.reclaim {
            config.reclaim = Some(true);
        } else if self.no_reclaim {
            config.reclaim = Some(false);
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse `PREFIX=DIR` into an alias pair.
///
/// # Errors
///
/// Returns an error if there is no `=` or either side is empty.
pub fn parse_alias(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((prefix, dir)) if !prefix.is_empty() && !dir.is_empty() => {
            Ok((prefix.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("Expected PREFIX=DIR, got '{s}'")),
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use webpcache::cli::parse_size;
///
/// assert_eq!(parse_size("8192").unwrap(), 8192);
/// assert_eq!(parse_size("8KiB").unwrap(), 8192);
/// assert_eq!(parse_size("10KB").unwrap(), 10_000);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("8KiB").unwrap(), 8192);
        assert_eq!(parse_size("8kib").unwrap(), 8192);
        assert_eq!(parse_size("1.5KB").unwrap(), 1_500);
        assert_eq!(parse_size(" 2 MiB ").unwrap(), 2_097_152);
    }

    #[test]
    fn test_parse_size_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("-1KB").is_err());
    }

    #[test]
    fn test_parse_alias() {
        assert_eq!(
            parse_alias("@=./src").unwrap(),
            ("@".to_string(), PathBuf::from("./src"))
        );
        assert!(parse_alias("@").is_err());
        assert!(parse_alias("=./src").is_err());
        assert!(parse_alias("@=").is_err());
    }

    #[test]
    fn test_cli_parse_rewrite() {
        let cli = Cli::try_parse_from([
            "webpcache",
            "-v",
            "rewrite",
            "./icon.webp",
            "@/hero.webp",
            "--context",
            "/site",
            "--alias",
            "@=/site/src",
            "--inline-limit",
            "4KiB",
            "--ext",
            ".png",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Rewrite(args) => {
                assert_eq!(args.references, vec!["./icon.webp", "@/hero.webp"]);
                assert_eq!(args.context, PathBuf::from("/site"));
                assert_eq!(args.aliases, vec![("@".to_string(), PathBuf::from("/site/src"))]);
                assert_eq!(args.transform.inline_limit, Some(4096));
                assert_eq!(args.transform.extensions, vec![".png"]);
                assert_eq!(args.output, OutputFormat::Text);
            }
            _ => panic!("Expected Rewrite command"),
        }
    }

    #[test]
    fn test_cli_rewrite_requires_reference() {
        assert!(Cli::try_parse_from(["webpcache", "rewrite"]).is_err());
    }

    #[test]
    fn test_cli_parse_warm() {
        let cli = Cli::try_parse_from([
            "webpcache",
            "warm",
            "/site/public",
            "--io-threads",
            "8",
            "--output",
            "json",
            "--mode",
            "development",
        ])
        .unwrap();

        match cli.command {
            Commands::Warm(args) => {
                assert_eq!(args.path, PathBuf::from("/site/public"));
                assert_eq!(args.io_threads, Some(8));
                assert_eq!(args.output, OutputFormat::Json);
                assert_eq!(args.transform.mode, Some(BuildMode::Development));
            }
            _ => panic!("Expected Warm command"),
        }
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["webpcache", "-v", "-q", "warm", "/path"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reclaim_flags_last_one_wins() {
        let cli = Cli::try_parse_from([
            "webpcache",
            "reclaim",
            "a.png",
            "--reclaim",
            "--no-reclaim",
        ])
        .unwrap();
        match cli.command {
            Commands::Reclaim(args) => {
                assert!(!args.transform.reclaim);
                assert!(args.transform.no_reclaim);
            }
            _ => panic!("Expected Reclaim command"),
        }
    }

    #[test]
    fn test_transform_args_apply() {
        let args = TransformArgs {
            virtual_ext: Some(".avif".to_string()),
            extensions: vec![".jpg".to_string()],
            hash_length: Some(8),
            quality: Some(60.0),
            lossless: true,
            inline_limit: Some(0),
            mode: Some(BuildMode::Development),
            reclaim: false,
            no_reclaim: true,
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.virtual_extension, ".avif");
        assert_eq!(config.extensions, vec![".jpg"]);
        assert_eq!(config.hash_length, 8);
        assert_eq!(config.codec.quality, 60.0);
        assert!(config.codec.lossless);
        assert_eq!(config.inline_limit, Some(0));
        assert_eq!(config.mode, BuildMode::Development);
        assert_eq!(config.reclaim, Some(false));
        assert!(!config.reclaim_enabled());
    }

    #[test]
    fn test_quality_help_mentions_lossless_codec() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let rewrite = cmd.find_subcommand("rewrite").unwrap();
        let quality = rewrite
            .get_arguments()
            .find(|arg| arg.get_id() == "quality")
            .unwrap();
        let help = quality.get_long_help().unwrap().to_string();
        assert!(help.contains("lossless output only and ignores this"));
    }

    #[test]
    fn test_transform_args_default_changes_nothing() {
        let mut config = Config::default();
        TransformArgs::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }
}
