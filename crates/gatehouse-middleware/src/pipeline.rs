//! The security pipeline.
//!
//! Every request flows through the same fixed stages:
//!
//! ```text
//! Request → Authentication → Authorization → RateLimit → [extra stages] → Handler
//! ```
//!
//! Hosts may append their own stages; they run after the security stages,
//! so they only ever see requests that passed all three.

use std::sync::Arc;

use gatehouse_core::BoxFuture;
use gatehouse_policy::SecurityProvider;

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::stages::{AuthenticationStage, AuthorizationStage, KeyExtractor, RateLimitStage};
use crate::types::{Request, Response};

/// A type-erased stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The fixed security stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Resolve the principal.
    Authentication = 1,
    /// Evaluate authorization policies.
    Authorization = 2,
    /// Take rate-limit permits.
    RateLimit = 3,
}

impl Stage {
    /// Stage name, matching [`Middleware::name`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::RateLimit => "rate_limit",
        }
    }

    /// All stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 3] {
        [Self::Authentication, Self::Authorization, Self::RateLimit]
    }
}

/// The security pipeline.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use gatehouse_middleware::{Pipeline, Stage};
/// use gatehouse_policy::{
///     AuthenticationSchemes, AuthorizationPolicies, ResolverOptions, SecurityPolicyBuilder,
///     SecurityResolver,
/// };
/// use gatehouse_ratelimit::LimiterRegistry;
///
/// let resolver = SecurityResolver::new(
///     SecurityPolicyBuilder::new().build(),
///     AuthenticationSchemes::new(),
///     AuthorizationPolicies::new(),
///     Arc::new(LimiterRegistry::new()),
///     ResolverOptions::default(),
/// );
///
/// let pipeline = Pipeline::builder(Arc::new(resolver)).per_subject().build();
/// assert_eq!(pipeline.stage_names(), Stage::all().map(Stage::name));
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Pipeline with default stage settings.
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self::builder(provider).build()
    }

    /// Starts a builder.
    pub fn builder(provider: Arc<dyn SecurityProvider>) -> PipelineBuilder {
        PipelineBuilder::new(provider)
    }

    /// Runs `request` through every stage and then `handler`.
    ///
    /// Rate-limit permits are held until `handler` has produced its
    /// response.
    pub async fn process<H>(&self, mut ctx: MiddlewareContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages, including appended ones.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`Pipeline`].
///
/// Stage settings can be adjusted, but the security stages themselves and
/// their order cannot.
pub struct PipelineBuilder {
    authentication: AuthenticationStage,
    authorization: AuthorizationStage,
    rate_limit: RateLimitStage,
    extra: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates a builder whose stages all consult `provider`.
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self {
            authentication: AuthenticationStage::new(Arc::clone(&provider)),
            authorization: AuthorizationStage::new(Arc::clone(&provider)),
            rate_limit: RateLimitStage::new(provider),
            extra: Vec::new(),
        }
    }

    /// Sets whether `OPTIONS` requests skip authorization. Default: true.
    #[must_use]
    pub fn bypass_preflight(mut self, enabled: bool) -> Self {
        self.authorization = self.authorization.bypass_preflight(enabled);
        self
    }

    /// Sets the rate-limit key extractor.
    #[must_use]
    pub fn key_extractor(mut self, extractor: KeyExtractor) -> Self {
        self.rate_limit = self.rate_limit.key_extractor(extractor);
        self
    }

    /// Keys rate limits by the value of `header`.
    #[must_use]
    pub fn per_header(self, header: impl Into<String>) -> Self {
        self.key_extractor(KeyExtractor::Header(header.into()))
    }

    /// Keys rate limits by authenticated subject.
    #[must_use]
    pub fn per_subject(self) -> Self {
        self.key_extractor(KeyExtractor::Subject)
    }

    /// Skips rate limiting for requests matching `predicate`.
    #[must_use]
    pub fn skip_rate_limit<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.rate_limit = self.rate_limit.skip(predicate);
        self
    }

    /// Appends a stage that runs after the security stages.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.extra.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let mut stages: Vec<BoxedMiddleware> = vec![
            Arc::new(self.authentication),
            Arc::new(self.authorization),
            Arc::new(self.rate_limit),
        ];
        stages.extend(self.extra);
        Pipeline { stages }
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("authorization", &self.authorization)
            .field("rate_limit", &self.rate_limit)
            .field("extra", &self.extra.len())
            .finish_non_exhaustive()
    }
}
