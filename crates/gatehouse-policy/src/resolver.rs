//! The request-time resolver.
//!
//! [`SecurityResolver`] is the one entry point the HTTP layer calls per
//! request. It resolves the request to its route, picks the configured (or
//! default) names and runs the matching handlers, predicates and limiters.
//! Every result is a value; nothing here returns an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{ClaimsPrincipal, Outcome, PolicyKind, RequestView};
use gatehouse_ratelimit::{LimiterRegistry, RateLimitLease};
use gatehouse_telemetry::metrics::{record_authentication, record_authorization};
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audit::{unresolved_references, UnresolvedReference};
use crate::handlers::{AuthenticationSchemes, AuthorizationPolicies};
use crate::policy::SecurityPolicy;

/// What to do when a route names a limiter that was never registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLimiterPolicy {
    /// Skip the limiter and log a warning.
    #[default]
    FailOpen,
    /// Deny the request.
    FailClosed,
}

/// Resolver behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Handling of unregistered limiter names.
    pub unknown_limiter: UnknownLimiterPolicy,
    /// Retry hint returned when an unknown limiter fails closed.
    pub fail_closed_retry: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            unknown_limiter: UnknownLimiterPolicy::FailOpen,
            fail_closed_retry: Duration::from_secs(1),
        }
    }
}

impl ResolverOptions {
    /// Sets the unknown limiter policy.
    #[must_use]
    pub fn with_unknown_limiter(mut self, policy: UnknownLimiterPolicy) -> Self {
        self.unknown_limiter = policy;
        self
    }
}

/// Result of the authentication stage.
#[derive(Debug, Clone)]
pub enum AuthenticationOutcome {
    /// The route is allow-anonymous; no scheme ran.
    Anonymous,
    /// A scheme produced a principal.
    Authenticated {
        /// The authenticated principal.
        principal: ClaimsPrincipal,
        /// The scheme that accepted the request.
        scheme: String,
    },
    /// No scheme is configured, or none accepted the request.
    Unauthorized,
}

impl AuthenticationOutcome {
    /// The decision for the HTTP layer.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::Anonymous | Self::Authenticated { .. } => Outcome::Allowed,
            Self::Unauthorized => Outcome::Unauthorized,
        }
    }

    /// The principal, if one authenticated.
    #[must_use]
    pub const fn principal(&self) -> Option<&ClaimsPrincipal> {
        match self {
            Self::Authenticated { principal, .. } => Some(principal),
            _ => None,
        }
    }

    /// Takes the principal, if one authenticated.
    #[must_use]
    pub fn into_principal(self) -> Option<ClaimsPrincipal> {
        match self {
            Self::Authenticated { principal, .. } => Some(principal),
            _ => None,
        }
    }
}

/// Result of the rate-limit stage.
#[derive(Debug)]
pub enum RateLimitDecision {
    /// Every applicable limiter granted a permit. Dropping the lease
    /// returns them.
    Allowed(RateLimitLease),
    /// At least one limiter denied the request.
    Limited {
        /// Longest retry hint among the denying limiters.
        retry_after: Duration,
        /// The limiter that produced `retry_after`.
        limiter: String,
        /// Whether the request was queued by some limiter.
        queued: bool,
    },
}

impl RateLimitDecision {
    /// The decision for the HTTP layer.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::Allowed(_) => Outcome::Allowed,
            Self::Limited { retry_after, .. } => Outcome::RateLimited {
                retry_after: *retry_after,
            },
        }
    }

    /// Returns true if the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    /// Takes the lease out of an allowed decision.
    #[must_use]
    pub fn into_lease(self) -> Option<RateLimitLease> {
        match self {
            Self::Allowed(lease) => Some(lease),
            Self::Limited { .. } => None,
        }
    }
}

/// Answers authentication, authorization and rate-limit questions for
/// concrete requests.
///
/// Construction audits the configuration and logs a warning for every
/// name no handler, predicate or limiter was registered under. Unknown
/// schemes fail, unknown policies deny, and unknown limiters follow
/// [`ResolverOptions::unknown_limiter`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use gatehouse_core::{fn_authenticator, ClaimsPrincipal, Outcome, RequestView};
/// use gatehouse_policy::{
///     require_role, AuthenticationSchemes, AuthorizationPolicies, ResolverOptions, RouteSpec,
///     SecurityPolicyBuilder, SecurityResolver,
/// };
/// use gatehouse_ratelimit::LimiterRegistry;
/// use http::{HeaderMap, Method, Uri};
///
/// # fn main() -> gatehouse_core::GatehouseResult<()> {
/// let mut builder = SecurityPolicyBuilder::new();
/// builder.route(RouteSpec::new(Method::DELETE, "/users/:id").schemes(["header"]).policies(["admin"]))?;
///
/// let mut schemes = AuthenticationSchemes::new();
/// schemes.add("header", fn_authenticator(|req| {
///     Ok(req.header("x-user").map(|user| ClaimsPrincipal::new(user).with_role("admin")))
/// }))?;
/// let mut policies = AuthorizationPolicies::new();
/// policies.add("admin", require_role(["admin"]))?;
///
/// let resolver = SecurityResolver::new(
///     builder.build(),
///     schemes,
///     policies,
///     Arc::new(LimiterRegistry::new()),
///     ResolverOptions::default(),
/// );
///
/// let method = Method::DELETE;
/// let uri = Uri::from_static("/users/42");
/// let mut headers = HeaderMap::new();
/// headers.insert("x-user", "alice".parse().unwrap());
/// let view = RequestView::new(&method, &uri, &headers);
///
/// let authn = tokio_test::block_on(resolver.authenticate(&view));
/// assert_eq!(authn.outcome(), Outcome::Allowed);
/// assert_eq!(resolver.authorize(&method, "/users/42", authn.principal()), Outcome::Allowed);
/// # Ok(())
/// # }
/// ```
pub struct SecurityResolver {
    policy: SecurityPolicy,
    schemes: AuthenticationSchemes,
    policies: AuthorizationPolicies,
    limiters: Arc<LimiterRegistry>,
    options: ResolverOptions,
    unresolved: Vec<UnresolvedReference>,
}

impl SecurityResolver {
    /// Creates a resolver over a built policy and its collaborators.
    #[must_use]
    pub fn new(
        policy: SecurityPolicy,
        schemes: AuthenticationSchemes,
        policies: AuthorizationPolicies,
        limiters: Arc<LimiterRegistry>,
        options: ResolverOptions,
    ) -> Self {
        let unresolved = unresolved_references(&policy, &schemes, &policies, &limiters);
        for reference in &unresolved {
            warn!(
                kind = reference.kind.as_str(),
                name = %reference.name,
                routes = reference.routes.len(),
                from_default = reference.from_default,
                "route references an unregistered {}",
                reference.kind
            );
        }

        Self {
            policy,
            schemes,
            policies,
            limiters,
            options,
            unresolved,
        }
    }

    /// Runs the authentication schemes that apply to `request`.
    ///
    /// Allow-anonymous routes short-circuit. Otherwise the configured
    /// schemes (or the default) run in order and the first principal wins.
    /// With no scheme at all the request is unauthorized.
    pub async fn authenticate(&self, request: &RequestView<'_>) -> AuthenticationOutcome {
        let key = self.policy.resolve(request.method(), request.path());

        if key.as_ref().is_some_and(|key| self.policy.is_anonymous_key(key)) {
            record_authentication("anonymous");
            return AuthenticationOutcome::Anonymous;
        }

        let schemes = self.policy.names_for_key(PolicyKind::Scheme, key.as_ref());
        if schemes.is_empty() {
            debug!(
                method = %request.method(),
                path = request.path(),
                "no authentication scheme applies"
            );
            record_authentication("failure");
            return AuthenticationOutcome::Unauthorized;
        }

        for scheme in schemes {
            let Some(handler) = self.schemes.get(scheme) else {
                warn!(scheme, "authentication scheme is not registered");
                continue;
            };
            match handler.authenticate(request).await {
                Ok(Some(principal)) => {
                    debug!(scheme, principal = %principal.log_id(), "request authenticated");
                    record_authentication("success");
                    return AuthenticationOutcome::Authenticated {
                        principal,
                        scheme: scheme.to_string(),
                    };
                }
                Ok(None) => debug!(scheme, "no credentials for scheme"),
                Err(error) => debug!(scheme, %error, "scheme rejected credentials"),
            }
        }

        record_authentication("failure");
        AuthenticationOutcome::Unauthorized
    }

    /// Evaluates the authorization policies that apply to the request.
    ///
    /// No policies means allowed. Without a principal, allow-anonymous
    /// routes skip authorization and other routes are unauthorized.
    #[must_use]
    pub fn authorize(&self, method: &Method, path: &str, principal: Option<&ClaimsPrincipal>) -> Outcome {
        let key = self.policy.resolve(method, path);
        let names = self.policy.names_for_key(PolicyKind::Policy, key.as_ref());
        if names.is_empty() {
            record_authorization("allowed", "none");
            return Outcome::Allowed;
        }

        let Some(principal) = principal else {
            if key.as_ref().is_some_and(|key| self.policy.is_anonymous_key(key)) {
                record_authorization("skipped", "none");
                return Outcome::Allowed;
            }
            record_authorization("unauthorized", "none");
            return Outcome::Unauthorized;
        };

        for name in &names {
            let allowed = match self.policies.get(name) {
                Some(policy) => policy.evaluate(principal),
                None => {
                    warn!(policy = name, "authorization policy is not registered");
                    false
                }
            };
            if !allowed {
                debug!(policy = name, principal = %principal.log_id(), "authorization denied");
                record_authorization("forbidden", name);
                return Outcome::Forbidden;
            }
        }

        record_authorization("allowed", names.last().copied().unwrap_or("none"));
        Outcome::Allowed
    }

    /// Takes a permit from every limiter that applies to the request.
    ///
    /// The returned lease must live until the request completes.
    #[must_use]
    pub fn rate_limit(&self, method: &Method, path: &str, client_key: &str) -> RateLimitDecision {
        let key = self.policy.resolve(method, path);
        let names = self.policy.names_for_key(PolicyKind::Limiter, key.as_ref());
        if names.is_empty() {
            return RateLimitDecision::Allowed(RateLimitLease::empty(client_key));
        }

        let mut limiters = Vec::with_capacity(names.len());
        for name in names {
            match self.limiters.get(name) {
                Some(limiter) => limiters.push(limiter.clone()),
                None => match self.options.unknown_limiter {
                    UnknownLimiterPolicy::FailOpen => {
                        warn!(limiter = name, "rate limiter is not registered, skipping");
                    }
                    UnknownLimiterPolicy::FailClosed => {
                        warn!(limiter = name, "rate limiter is not registered, denying");
                        return RateLimitDecision::Limited {
                            retry_after: self.options.fail_closed_retry,
                            limiter: name.to_string(),
                            queued: false,
                        };
                    }
                },
            }
        }

        match RateLimitLease::acquire(limiters, client_key) {
            Ok(lease) => RateLimitDecision::Allowed(lease),
            Err(denied) => {
                debug!(
                    limiter = %denied.limiter,
                    client_key,
                    retry_after_ms = u64::try_from(denied.retry_after.as_millis()).unwrap_or(u64::MAX),
                    "rate limited"
                );
                RateLimitDecision::Limited {
                    retry_after: denied.retry_after,
                    limiter: denied.limiter,
                    queued: denied.queued,
                }
            }
        }
    }

    /// Names referenced by routes or defaults that nothing registered.
    #[must_use]
    pub fn unresolved_references(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// The underlying policy.
    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// The limiter registry.
    #[must_use]
    pub fn limiters(&self) -> &Arc<LimiterRegistry> {
        &self.limiters
    }

    /// Resolver options.
    #[must_use]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }
}

impl fmt::Debug for SecurityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityResolver")
            .field("policy", &self.policy)
            .field("schemes", &self.schemes)
            .field("policies", &self.policies)
            .field("limiters", &self.limiters.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
