//! The hook between a host build and the engine.
//!
//! A host hands every outgoing request to an [`Interceptor`] as a mutable
//! [`RequestDescriptor`]. [`WebpInterceptor`] ignores requests that don't end
//! in the virtual extension, runs the engine on the rest and writes the
//! rewritten reference back onto the descriptor. Whether an engine failure
//! fails the build or lets the request through untouched is decided here,
//! not in the engine.

use serde::{Deserialize, Serialize};

use crate::engine::{Decision, Engine, EngineError};
use crate::resolver::ResolveContext;

/// A request as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Where and how the request is resolved.
    pub context: ResolveContext,
    /// The requested reference; rewritten in place.
    pub request: String,
}

impl RequestDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(context: ResolveContext, request: impl Into<String>) -> Self {
        Self {
            context,
            request: request.into(),
        }
    }
}

/// What to do when the engine fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Return the error to the host.
    #[default]
    Fail,
    /// Log a warning and leave the request untouched.
    PassThrough,
}

/// Rewrites requests in place.
pub trait Interceptor: Send + Sync {
    /// Inspect and possibly rewrite `request`.
    ///
    /// Returns `Ok(None)` when the request is not handled by this interceptor
    /// or a failure was passed through.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the engine fails under [`FailurePolicy::Fail`].
    fn intercept(&self, request: &mut RequestDescriptor) -> Result<Option<Decision>, EngineError>;
}

/// Interceptor that substitutes cached WebP variants.
#[derive(Debug, Clone)]
pub struct WebpInterceptor {
    engine: Engine,
    policy: FailurePolicy,
}

impl WebpInterceptor {
    /// Wrap an engine with the default [`FailurePolicy::Fail`].
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            policy: FailurePolicy::default(),
        }
    }

    /// Set the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Interceptor for WebpInterceptor {
    fn intercept(&self, request: &mut RequestDescriptor) -> Result<Option<Decision>, EngineError> {
        if !self.engine.mapper().is_virtual(&request.request) {
            return Ok(None);
        }

        match self.engine.process(&request.context, &request.request) {
            Ok(decision) => {
                if let Some(reference) = decision.reference() {
                    log::debug!("Rewrote {} -> {}", request.request, reference);
                    request.request = reference.to_string();
                }
                Ok(Some(decision))
            }
            Err(e) if self.policy == FailurePolicy::PassThrough => {
                log::warn!("Leaving {} untouched: {}", request.request, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
