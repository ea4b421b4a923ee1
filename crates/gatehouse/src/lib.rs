//! # Gatehouse
//!
//! **Route-level authentication, authorization and rate limiting for HTTP services**
//!
//! Routes are declared once, with the names of the authentication schemes,
//! authorization policies and rate limiters that guard them. At request time
//! the engine resolves the concrete path back to its route and answers three
//! questions: who is calling, are they allowed, and may they proceed now.
//!
//! - **Route registry** – templates like `/users/{id}` canonicalize so every
//!   concrete path shares one policy entry
//! - **Declarative policy** – per-route, per-group and global default names,
//!   with conflicts rejected at startup
//! - **Four limiter algorithms** – fixed window, sliding window, token bucket
//!   and concurrency, each with an optional wait queue
//! - **One HTTP adapter** – a fixed middleware pipeline over `hyper`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatehouse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let builder = Gatehouse::from_loader(
//!         ConfigLoader::new().with_file("gatehouse.toml")?.with_env_prefix("GATEHOUSE"),
//!     )?;
//!     let mut schemes = AuthenticationSchemes::new();
//!     schemes.add("bearer", fn_authenticator(verify_token))?;
//!
//!     let gatehouse = builder.schemes(schemes).build()?;
//!     let service = SecurityService::new(Arc::new(gatehouse.pipeline()), handler);
//!     // serve `service` with hyper
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Authentication → Authorization → RateLimit → Handler
//!              401 ◄─┘            401/403 ◄─┘     429 ◄─┘
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{init_telemetry, Gatehouse, GatehouseBuilder};
pub use gatehouse_config::{ConfigLoader, GatehouseConfig};

// Re-export member crates
pub use gatehouse_config as config;
pub use gatehouse_core as core;
pub use gatehouse_middleware as middleware;
pub use gatehouse_policy as policy;
pub use gatehouse_ratelimit as ratelimit;
pub use gatehouse_router as router;
pub use gatehouse_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use gatehouse::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{Gatehouse, GatehouseBuilder};

    pub use gatehouse_config::{ConfigLoader, GatehouseConfig};

    pub use gatehouse_core::{
        fn_authenticator, AuthenticationHandler, AuthorizationPolicy, ClaimsPrincipal, GatehouseError,
        GatehouseResult, Outcome, RequestView, RouteKey,
    };

    pub use gatehouse_middleware::{
        KeyExtractor, Middleware, MiddlewareContext, Next, PeerAddr, Pipeline, SecurityService,
    };

    pub use gatehouse_policy::{
        require_claim, require_has_claim, require_role, AuthenticationSchemes, AuthorizationPolicies, GroupSpec,
        RouteSpec, SecurityPolicyBuilder, SecurityProvider, SecurityResolver,
    };

    pub use gatehouse_ratelimit::{
        ConcurrencyOptions, FixedWindowOptions, LimiterRegistry, QueueProcessingOrder, SlidingWindowOptions,
        TokenBucketOptions,
    };
}
