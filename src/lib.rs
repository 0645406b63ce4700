//! webpcache - build-time WebP substitution cache
//!
//! Resolves `.webp` references to their PNG/JPEG sources, writes one
//! content-addressed WebP variant per distinct source content, and rewrites
//! each reference to the variant, to the original asset, or leaves it alone.

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod interceptor;
pub mod logging;
pub mod paths;
pub mod progress;
pub mod resolver;
pub mod store;
pub mod warm;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::{Cli, Commands, OutputFormat, ReclaimArgs, RewriteArgs, WarmArgs};
use crate::codec::WebpCodec;
use crate::config::Config;
use crate::engine::{Decision, Engine, Reaper};
use crate::error::ExitCode;
use crate::interceptor::{Interceptor, RequestDescriptor, WebpInterceptor};
use crate::paths::{file_stem_of, parent_of, PathMapper};
use crate::progress::Progress;
use crate::resolver::FsResolver;
use crate::store::FsStore;
use crate::warm::WarmOptions;

/// Run the command described by `cli`.
///
/// Logging must already be initialised.
///
/// # Errors
///
/// Returns an error if configuration fails to load or a command fails
/// outright. Partial failures are reported through [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Rewrite(args) => {
            args.transform.apply(&mut config);
            config.validate()?;
            run_rewrite(&config, &args)
        }
        Commands::Warm(args) => {
            args.transform.apply(&mut config);
            if let Some(threads) = args.io_threads {
                config.io_threads = threads;
            }
            config.validate()?;
            run_warm(&config, &args, cli.quiet)
        }
        Commands::Reclaim(args) => {
            args.transform.apply(&mut config);
            config.validate()?;
            run_reclaim(&config, &args)
        }
    }
}

/// Engine over the local filesystem with the bundled WebP codec.
#[must_use]
pub fn build_engine(config: &Config) -> Engine {
    Engine::new(
        config.transform_config(),
        Arc::new(FsStore::new()),
        Arc::new(FsResolver::new()),
        Arc::new(WebpCodec::new()),
    )
}

#[derive(Debug, Serialize)]
struct RewriteLine<'a> {
    request: &'a str,
    rewritten: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'a Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_rewrite(config: &Config, args: &RewriteArgs) -> Result<ExitCode> {
    let mut ctx = config.resolve_context(&args.context);
    for (prefix, dir) in &args.aliases {
        ctx.aliases.insert(prefix.clone(), dir.clone());
    }
    let interceptor = WebpInterceptor::new(build_engine(config));

    let mut failed = 0;
    let mut lines = Vec::with_capacity(args.references.len());
    for reference in &args.references {
        let mut descriptor = RequestDescriptor::new(ctx.clone(), reference.clone());
        let (decision, error) = match interceptor.intercept(&mut descriptor) {
            Ok(decision) => (decision, None),
            Err(e) if args.keep_going => {
                log::warn!("{reference}: {e}");
                failed += 1;
                (None, Some(e.to_string()))
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to rewrite {reference}")),
        };
        lines.push((reference, descriptor.request, decision, error));
    }

    match args.output {
        OutputFormat::Text => {
            for (request, rewritten, decision, error) in &lines {
                let label = match (decision, error) {
                    (Some(d), _) => d.label(),
                    (None, Some(_)) => "failed",
                    (None, None) => "ignored",
                };
                println!("{request} -> {rewritten} ({label})");
            }
        }
        OutputFormat::Json => {
            let out: Vec<RewriteLine<'_>> = lines
                .iter()
                .map(|(request, rewritten, decision, error)| RewriteLine {
                    request,
                    rewritten,
                    decision: decision.as_ref(),
                    error: error.clone(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(ExitCode::from_failures(failed))
}

fn run_warm(config: &Config, args: &WarmArgs, quiet: bool) -> Result<ExitCode> {
    let engine = build_engine(config);
    let ctx = config.resolve_context(&args.path);
    let show_progress = !quiet && args.output == OutputFormat::Text;
    let options = WarmOptions {
        io_threads: config.io_threads,
        progress: Some(Arc::new(Progress::new(!show_progress))),
    };

    let report = warm::warm(&engine, &ctx, &args.path, &options)
        .with_context(|| format!("Failed to warm {}", args.path.display()))?;

    match args.output {
        OutputFormat::Text => {
            for item in &report.items {
                if let Some(error) = &item.error {
                    println!("{}: {}", item.reference, error);
                }
            }
            println!("{}", report.summary);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(ExitCode::from_failures(report.summary.failed))
}

fn run_reclaim(config: &Config, args: &ReclaimArgs) -> Result<ExitCode> {
    let store = FsStore::new();
    let mapper = PathMapper::new(config.virtual_extension.clone());
    let reaper = Reaper::new(&store, &mapper);

    for source in &args.sources {
        let source_str = source
            .to_str()
            .with_context(|| format!("Path is not valid UTF-8: {}", source.display()))?;
        let dir = Path::new(parent_of(source_str));
        let stem = file_stem_of(source_str)?;
        let removed = reaper
            .reclaim(dir, stem, config.hash_length)
            .with_context(|| format!("Failed to reclaim variants of {source_str}"))?;
        println!("{source_str}: removed {removed} variant(s)");
    }

    Ok(ExitCode::Success)
}
