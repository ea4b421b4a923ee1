//! # Gatehouse Core
//!
//! Core types shared by every Gatehouse crate:
//!
//! - [`GatehouseError`] - configuration and request-time errors with an HTTP envelope
//! - [`Outcome`] - the per-request decision handed to the HTTP layer
//! - [`ClaimsPrincipal`] - the identity produced by authentication
//! - [`RequestView`] - borrowed request parts given to authentication handlers
//! - [`AuthenticationHandler`] / [`AuthorizationPolicy`] - host-supplied collaborators
//!
//! Route identity ([`RouteKey`]) is re-exported from `gatehouse-router`.

#![doc(html_root_url = "https://docs.rs/gatehouse-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod handler;
mod outcome;
mod principal;
mod request;

pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, GatehouseError, GatehouseResult, PolicyKind};
pub use gatehouse_router::RouteKey;
pub use handler::{fn_authenticator, AuthenticationHandler, AuthorizationPolicy, BoxFuture, FnAuthenticator};
pub use outcome::{retry_after_seconds, Outcome};
pub use principal::{Claim, ClaimsPrincipal};
pub use request::RequestView;
