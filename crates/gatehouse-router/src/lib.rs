//! Route template registry for Gatehouse.
//!
//! This crate maps a concrete `(method, path)` pair back to the canonical
//! [`RouteKey`] of the template it matches, so that every policy lookup is
//! keyed by template and never by raw path.
//!
//! # Features
//!
//! - **Radix tree matching**: one tree for all methods, sorted static children
//! - **Path parameters**: `:name` or `{name}` segments
//! - **Canonicalization**: `/user/77` and `/user/12345` both resolve to `GET /user/:id`
//! - **Documented precedence**: static segments beat parameters, per method
//!
//! Catch-all, optional and regex-constrained segments are rejected at
//! registration.
//!
//! # Example
//!
//! ```rust
//! use gatehouse_router::RouteRegistry;
//! use http::Method;
//!
//! let mut registry = RouteRegistry::new();
//! registry.register(&Method::GET, "/users").unwrap();
//! registry.register(&Method::GET, "/users/{id}").unwrap();
//! registry.register(&Method::GET, "/users/me").unwrap();
//!
//! let matched = registry.match_route(&Method::GET, "/users/123").unwrap();
//! assert_eq!(matched.key.template(), "/users/:id");
//! assert_eq!(matched.params.get("id"), Some("123"));
//!
//! let me = registry.resolve(&Method::GET, "/users/me").unwrap();
//! assert_eq!(me.template(), "/users/me");
//! ```
//!
//! # Architecture
//!
//! ```text
//!                 (root)
//!                   │
//!                "users"  [GET /users]
//!                   │
//!           ┌───────┴───────┐
//!          "me"            ":"
//!    [GET /users/me]   [GET /users/:id, DELETE /users/:userId]
//! ```
//!
//! Each leaf stores the template per method, which is what the registry
//! hands back as the canonical key.

#![doc(html_root_url = "https://docs.rs/gatehouse-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod key;
mod method_table;
mod node;
mod params;
mod router;

pub use error::RouteError;
pub use key::{join_paths, normalize_template, RouteKey};
pub use method_table::MethodTable;
pub use params::Params;
pub use router::RouteRegistry;

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Canonical key of the matched template.
    pub key: RouteKey,
    /// Parameter values captured from the concrete path.
    pub params: Params,
}
