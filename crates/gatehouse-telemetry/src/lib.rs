//! Logging and metrics for the gatehouse security engine.
//!
//! - **Logging**: `tracing-subscriber` with an env filter and JSON or
//!   pretty output ([`logging`]).
//! - **Metrics**: counters and gauges for authentication, authorization and
//!   rate limiting, exported in Prometheus format ([`metrics`]).
//!
//! The other gatehouse crates only call the recording functions in
//! [`metrics`] and the `tracing` macros; installing a subscriber or a
//! recorder is left to the host through [`init_telemetry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehouse_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .log_level("info,gatehouse_policy=debug")
//!     .metrics_addr("0.0.0.0:9464")
//!     .build();
//! init_telemetry(&config)?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::config::{TelemetryConfig, TelemetryConfigBuilder};
pub use crate::error::TelemetryError;
pub use crate::logging::{init_logging, LogConfig};
pub use crate::metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging, then metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
