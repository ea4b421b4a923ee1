//! Route security policies for Gatehouse.
//!
//! This crate decides, per request, which authentication schemes,
//! authorization policies and rate limiters apply, and runs them.
//!
//! # Overview
//!
//! Configuration time:
//! - [`SecurityPolicyBuilder`] registers routes and binds named schemes,
//!   policies and limiters to them, directly or through [`RouteSpec`] and
//!   [`GroupSpec`] declarations
//! - conflicting declarations (an allow-anonymous route with schemes, a
//!   route marked allow-anonymous twice) fail the build
//! - [`AuthenticationSchemes`] and [`AuthorizationPolicies`] hold the
//!   handlers and predicates behind the names
//!
//! Request time:
//! - [`SecurityResolver`] resolves `(method, path)` to a route and answers
//!   authenticate, authorize and rate-limit questions
//! - adapters depend on the [`SecurityProvider`] trait
//!
//! # Architecture
//!
//! ```text
//!   RouteSpec / GroupSpec ─┐
//!                          ▼
//!               SecurityPolicyBuilder ──build──► SecurityPolicy
//!                                                  │  registry + tables + defaults
//!   AuthenticationSchemes ─┐                       │
//!   AuthorizationPolicies ─┼──────────────► SecurityResolver ◄── request
//!   LimiterRegistry ───────┘                       │
//!                                                  ▼
//!                             AuthenticationOutcome / Outcome / RateLimitDecision
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gatehouse_core::{fn_authenticator, ClaimsPrincipal, GatehouseResult, Outcome};
//! use gatehouse_policy::{
//!     require_role, AuthenticationSchemes, AuthorizationPolicies, GroupSpec, ResolverOptions,
//!     RouteSpec, SecurityPolicyBuilder, SecurityResolver,
//! };
//! use gatehouse_ratelimit::{FixedWindowOptions, LimiterRegistry};
//! use http::Method;
//!
//! # fn main() -> GatehouseResult<()> {
//! let mut builder = SecurityPolicyBuilder::new();
//! builder
//!     .default_scheme("bearer")
//!     .route(RouteSpec::new(Method::GET, "/health").allow_anonymous())?
//!     .group(
//!         GroupSpec::new("/admin")
//!             .policies(["admin"])
//!             .limiters(["admin-api"])
//!             .route(RouteSpec::new(Method::DELETE, "/users/{id}")),
//!     )?;
//!
//! let mut schemes = AuthenticationSchemes::new();
//! schemes.add("bearer", fn_authenticator(|req| Ok(req.bearer_token().map(ClaimsPrincipal::new))))?;
//! let mut policies = AuthorizationPolicies::new();
//! policies.add("admin", require_role(["admin"]))?;
//! let mut limiters = LimiterRegistry::new();
//! limiters.add_fixed_window("admin-api", FixedWindowOptions::new(100, Duration::from_secs(60)))?;
//!
//! let resolver = SecurityResolver::new(
//!     builder.build(),
//!     schemes,
//!     policies,
//!     Arc::new(limiters),
//!     ResolverOptions::default(),
//! );
//!
//! let alice = ClaimsPrincipal::new("alice");
//! assert_eq!(resolver.authorize(&Method::DELETE, "/admin/users/9", Some(&alice)), Outcome::Forbidden);
//! assert!(resolver.unresolved_references().is_empty());
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-policy/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod audit;
mod builder;
mod declaration;
mod handlers;
mod policy;
mod provider;
mod requirements;
mod resolver;
mod tables;

pub use audit::{unresolved_references, UnresolvedReference};
pub use builder::SecurityPolicyBuilder;
pub use declaration::{GroupSpec, RouteSpec};
pub use handlers::{AuthenticationSchemes, AuthorizationPolicies};
pub use policy::{GlobalDefaults, SecurityPolicy};
pub use provider::SecurityProvider;
pub use requirements::{require_claim, require_has_claim, require_role};
pub use resolver::{
    AuthenticationOutcome, RateLimitDecision, ResolverOptions, SecurityResolver, UnknownLimiterPolicy,
};
