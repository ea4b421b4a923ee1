//! The capability interface HTTP adapters depend on.

use gatehouse_core::{BoxFuture, ClaimsPrincipal, Outcome, RequestView};
use http::Method;

use crate::resolver::{AuthenticationOutcome, RateLimitDecision, SecurityResolver};

/// Security and rate-limit decisions for one request.
///
/// Adapters only extract `(method, path, client key)` from their request
/// type and map the results onto responses. [`SecurityResolver`] is the
/// implementation; tests may substitute their own.
pub trait SecurityProvider: Send + Sync + 'static {
    /// Runs the applicable authentication schemes.
    fn authenticate<'a>(&'a self, request: &'a RequestView<'a>) -> BoxFuture<'a, AuthenticationOutcome>;

    /// Evaluates the applicable authorization policies.
    fn authorize(&self, method: &Method, path: &str, principal: Option<&ClaimsPrincipal>) -> Outcome;

    /// Takes permits from the applicable limiters.
    fn rate_limit(&self, method: &Method, path: &str, client_key: &str) -> RateLimitDecision;
}

impl SecurityProvider for SecurityResolver {
    fn authenticate<'a>(&'a self, request: &'a RequestView<'a>) -> BoxFuture<'a, AuthenticationOutcome> {
        Box::pin(Self::authenticate(self, request))
    }

    fn authorize(&self, method: &Method, path: &str, principal: Option<&ClaimsPrincipal>) -> Outcome {
        Self::authorize(self, method, path, principal)
    }

    fn rate_limit(&self, method: &Method, path: &str, client_key: &str) -> RateLimitDecision {
        Self::rate_limit(self, method, path, client_key)
    }
}
