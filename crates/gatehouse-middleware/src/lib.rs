//! # Gatehouse Middleware
//!
//! The HTTP adapter for the gatehouse security engine. It turns the
//! decisions of a [`SecurityProvider`](gatehouse_policy::SecurityProvider)
//! into responses:
//!
//! | Stage | Denial |
//! |-------|--------|
//! | Authentication | `401` with the JSON error envelope |
//! | Authorization | `401` without a principal, `403` when a policy fails |
//! | Rate limit | `429` with `Retry-After` and `{"code","message","retryAfter"}` |
//!
//! The stage order is fixed; see [`pipeline`]. [`SecurityService`] wraps the
//! pipeline and a handler as a `hyper` service.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use gatehouse_core::{fn_authenticator, ClaimsPrincipal};
//! use gatehouse_middleware::{MiddlewareContext, Pipeline};
//! use gatehouse_policy::{
//!     AuthenticationSchemes, AuthorizationPolicies, ResolverOptions, RouteSpec,
//!     SecurityPolicyBuilder, SecurityResolver,
//! };
//! use gatehouse_ratelimit::LimiterRegistry;
//! use http::{Method, StatusCode};
//! use http_body_util::Full;
//!
//! # tokio_test::block_on(async {
//! let mut schemes = AuthenticationSchemes::new();
//! schemes.add(
//!     "bearer",
//!     fn_authenticator(|req| Ok(req.bearer_token().map(ClaimsPrincipal::new))),
//! )?;
//!
//! let mut builder = SecurityPolicyBuilder::new();
//! builder.route(RouteSpec::new(Method::GET, "/me").schemes(["bearer"]))?;
//!
//! let resolver = SecurityResolver::new(
//!     builder.build(),
//!     schemes,
//!     AuthorizationPolicies::new(),
//!     Arc::new(LimiterRegistry::new()),
//!     ResolverOptions::default(),
//! );
//! let pipeline = Pipeline::new(Arc::new(resolver));
//!
//! let request = http::Request::builder()
//!     .uri("/me")
//!     .body(Full::new(Bytes::new()))
//!     .unwrap();
//! let response = pipeline
//!     .process(MiddlewareContext::new(), request, |_ctx, _req| {
//!         Box::pin(async { http::Response::new(Full::new(Bytes::from("ok"))) })
//!     })
//!     .await;
//! assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
//! # Ok::<(), gatehouse_core::GatehouseError>(())
//! # }).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod service;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use middleware::{Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use service::SecurityService;
pub use stages::{client_address, AuthenticationStage, AuthorizationStage, KeyExtractor, RateLimitStage};
pub use types::{error_response, json_response, too_many_requests, PeerAddr, RateLimitBody, Request, Response};
