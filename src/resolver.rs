//! Resolution of extension-less requests to real source assets.
//!
//! The engine hands the resolver a request with its virtual extension already
//! stripped (`@/img/icon`) and an ordered list of acceptable extensions; the
//! resolver answers with the first real file that matches.
//!
//! [`FsResolver`] mirrors what a bundler's resolver does for asset requests:
//! alias prefixes first, then absolute or context-relative joining, then
//! extension probing in configuration order. The request is always treated as
//! a stem: `icon.png` is probed as `icon.png.png`, never as the file itself,
//! so the stem of the resolved path always equals the stem of the request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything needed to turn a request into a filesystem path.
///
/// Immutable for the lifetime of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveContext {
    /// Directory relative requests are resolved against.
    pub base_dir: PathBuf,
    /// Alias prefix to directory, e.g. `@` to `./src`.
    #[serde(default)]
    pub aliases: BTreeMap<String, PathBuf>,
}

impl ResolveContext {
    /// Create a context rooted at `base_dir` with no aliases.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            aliases: BTreeMap::new(),
        }
    }

    /// Add an alias.
    #[must_use]
    pub fn with_alias(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.aliases.insert(prefix.into(), dir.into());
        self
    }
}

/// Errors that can occur during resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No candidate with an acceptable extension exists.
    #[error("Can't resolve '{request}' in {base_dir} (tried {tried} candidates)")]
    NotFound {
        /// The request as given to the resolver
        request: String,
        /// Base directory of the context
        base_dir: PathBuf,
        /// Number of candidate paths probed
        tried: usize,
    },

    /// The resolved path is not valid UTF-8 and can't be mapped.
    #[error("Resolved path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    /// Resolver-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Turns a request into the path of an existing source asset.
pub trait Resolver: Send + Sync {
    /// Resolve `request` in `ctx`, trying `extensions` in order.
    ///
    /// # Errors
    ///
    /// [`ResolveError`] if no acceptable file matches.
    fn resolve(
        &self,
        ctx: &ResolveContext,
        request: &str,
        extensions: &[String],
    ) -> Result<PathBuf, ResolveError>;
}

impl<F> Resolver for F
where
    F: Fn(&ResolveContext, &str, &[String]) -> Result<PathBuf, ResolveError> + Send + Sync,
{
    fn resolve(
        &self,
        ctx: &ResolveContext,
        request: &str,
        extensions: &[String],
    ) -> Result<PathBuf, ResolveError> {
        self(ctx, request, extensions)
    }
}

/// Resolver over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl FsResolver {
    /// Create a new filesystem resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Expand aliases and anchor the request to a directory.
    ///
    /// The longest matching alias wins; an alias matches the whole request or
    /// a prefix followed by a separator.
    fn anchor(ctx: &ResolveContext, request: &str) -> PathBuf {
        let alias = ctx
            .aliases
            .iter()
            .filter(|(prefix, _)| {
                request == prefix.as_str()
                    || request
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len());

        if let Some((prefix, dir)) = alias {
            let rest = request[prefix.len()..].trim_start_matches('/');
            let dir = if dir.is_absolute() {
                dir.clone()
            } else {
                ctx.base_dir.join(dir)
            };
            return if rest.is_empty() { dir } else { dir.join(rest) };
        }

        let path = Path::new(request);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            ctx.base_dir.join(path)
        }
    }
}

impl Resolver for FsResolver {
    fn resolve(
        &self,
        ctx: &ResolveContext,
        request: &str,
        extensions: &[String],
    ) -> Result<PathBuf, ResolveError> {
        let base = Self::anchor(ctx, request).into_os_string();

        for ext in extensions {
            let mut with_ext = base.clone();
            with_ext.push(ext);
            let path = PathBuf::from(with_ext);
            log::trace!("Resolve candidate: {}", path.display());
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(ResolveError::NotFound {
            request: request.to_string(),
            base_dir: ctx.base_dir.clone(),
            tried: extensions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec![".png".to_string(), ".jpg".to_string(), ".jpeg".to_string()]
    }

    #[test]
    fn test_resolve_relative_in_extension_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("icon.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("icon.png"), b"png").unwrap();

        let ctx = ResolveContext::new(dir.path());
        let path = FsResolver::new().resolve(&ctx, "./icon", &exts()).unwrap();
        assert_eq!(path, dir.path().join("./icon.png"));
    }

    #[test]
    fn test_resolve_falls_through_to_later_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("photo.jpeg"), b"jpeg").unwrap();

        let ctx = ResolveContext::new(dir.path());
        let path = FsResolver::new().resolve(&ctx, "photo", &exts()).unwrap();
        assert_eq!(path, dir.path().join("photo.jpeg"));
    }

    #[test]
    fn test_resolve_alias() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/img")).unwrap();
        fs::write(dir.path().join("src/img/logo.png"), b"png").unwrap();

        let ctx =
            ResolveContext::new(dir.path().join("pages")).with_alias("@", dir.path().join("src"));
        let path = FsResolver::new().resolve(&ctx, "@/img/logo", &exts()).unwrap();
        assert_eq!(path, dir.path().join("src/img/logo.png"));
    }

    #[test]
    fn test_alias_requires_separator() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("@x.png"), b"png").unwrap();

        // "@x" must not be read as alias "@" + "x"
        let ctx = ResolveContext::new(dir.path()).with_alias("@", "/nowhere");
        let path = FsResolver::new().resolve(&ctx, "@x", &exts()).unwrap();
        assert_eq!(path, dir.path().join("@x.png"));
    }

    #[test]
    fn test_request_is_a_stem_not_a_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("icon.png"), b"png").unwrap();

        // `icon.png` is probed as `icon.png.png` and friends
        let ctx = ResolveContext::new(dir.path());
        assert!(FsResolver::new().resolve(&ctx, "icon.png", &exts()).is_err());
    }

    #[test]
    fn test_resolve_not_found() {
        let dir = tempdir().unwrap();
        let ctx = ResolveContext::new(dir.path());
        let err = FsResolver::new().resolve(&ctx, "./ghost", &exts()).unwrap_err();
        match err {
            ResolveError::NotFound { request, tried, .. } => {
                assert_eq!(request, "./ghost");
                assert_eq!(tried, 3);
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |_: &ResolveContext, req: &str, _: &[String]| -> Result<PathBuf, ResolveError> {
            Ok(PathBuf::from(format!("/fixed/{req}.png")))
        };
        let path = resolver
            .resolve(&ResolveContext::default(), "a", &exts())
            .unwrap();
        assert_eq!(path, PathBuf::from("/fixed/a.png"));
    }
}
