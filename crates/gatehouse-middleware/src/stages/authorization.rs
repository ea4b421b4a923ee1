//! Authorization stage.

use std::sync::Arc;

use gatehouse_core::BoxFuture;
use gatehouse_policy::SecurityProvider;
use http::Method;
use tracing::debug;

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::types::{error_response, Request, Response};

/// Evaluates the route's authorization policies against the principal the
/// authentication stage stored.
///
/// `OPTIONS` preflight requests pass through untouched unless
/// [`bypass_preflight`](Self::bypass_preflight) is turned off.
pub struct AuthorizationStage {
    provider: Arc<dyn SecurityProvider>,
    bypass_preflight: bool,
}

impl AuthorizationStage {
    /// Creates the stage with preflight bypass enabled.
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self {
            provider,
            bypass_preflight: true,
        }
    }

    /// Sets whether `OPTIONS` requests skip authorization.
    #[must_use]
    pub fn bypass_preflight(mut self, enabled: bool) -> Self {
        self.bypass_preflight = enabled;
        self
    }

    /// Returns true if `OPTIONS` requests skip authorization.
    pub fn bypasses_preflight(&self) -> bool {
        self.bypass_preflight
    }
}

impl std::fmt::Debug for AuthorizationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationStage")
            .field("bypass_preflight", &self.bypass_preflight)
            .finish_non_exhaustive()
    }
}

impl Middleware for AuthorizationStage {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.bypass_preflight && request.method() == Method::OPTIONS {
                return next.run(ctx, request).await;
            }

            let outcome = self
                .provider
                .authorize(request.method(), request.uri().path(), ctx.principal());

            if let Some(error) = outcome.into_error() {
                debug!(
                    method = %request.method(),
                    path = request.uri().path(),
                    outcome = %outcome,
                    request_id = ctx.request_id(),
                    "request not authorized"
                );
                return error_response(&error, Some(ctx.request_id()));
            }

            next.run(ctx, request).await
        })
    }
}
