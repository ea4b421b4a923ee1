//! Typed configuration for the gatehouse security engine.
//!
//! Declarations can be written in code through `SecurityPolicyBuilder`, or
//! kept in a TOML or JSON file and loaded here:
//!
//! - [`GatehouseConfig`] is the root document
//! - [`LimiterConfig`] defines named limiters, tagged by `algorithm`
//! - [`RouteConfig`] and [`GroupConfig`] declare route associations
//! - [`ConfigLoader`] layers defaults, a file and environment overrides
//!
//! Unknown fields are rejected everywhere.
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! scheme = "bearer"
//! limiter = "per-client"
//!
//! [[limiters]]
//! name = "per-client"
//! algorithm = "sliding_window"
//! permit_limit = 100
//! window_ms = 60000
//! segments_per_window = 6
//!
//! [[routes]]
//! methods = ["GET"]
//! path = "/user/{id}"
//! policies = ["can-read-users"]
//!
//! [[groups]]
//! prefix = "/admin"
//! policies = ["admin"]
//!
//! [[groups.routes]]
//! methods = ["DELETE"]
//! path = "/user/{id}"
//!
//! [resolver]
//! unknown_limiter = "fail_open"
//!
//! [eviction]
//! idle_ttl_secs = 600
//! sweep_interval_secs = 60
//!
//! [telemetry.logging]
//! level = "info"
//! json_format = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar settings can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `GATEHOUSE__DEFAULTS__POLICY=authenticated`
//! - `GATEHOUSE__EVICTION__ENABLED=false`
//! - `GATEHOUSE__TELEMETRY__METRICS__LISTEN_ADDR=0.0.0.0:9100`

mod config;
mod error;
mod loader;
mod schema;

pub use config::GatehouseConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{EvictionConfig, GroupConfig, LimiterConfig, ResolverConfig, RouteConfig};
