//! Prometheus metrics for security decisions.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `gatehouse_authentication_total` | Counter | `result` |
//! | `gatehouse_authorization_total` | Counter | `result`, `policy` |
//! | `gatehouse_ratelimit_decisions_total` | Counter | `limiter`, `result` |
//! | `gatehouse_ratelimit_evicted_keys_total` | Counter | `limiter` |
//! | `gatehouse_ratelimit_tracked_keys` | Gauge | `limiter` |
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder they do nothing.

use std::net::SocketAddr;
use std::sync::OnceLock;

use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Authentication attempts by result.
pub const AUTHENTICATION_TOTAL: &str = "gatehouse_authentication_total";
/// Authorization decisions by result and deciding policy.
pub const AUTHORIZATION_TOTAL: &str = "gatehouse_authorization_total";
/// Limiter acquisitions by limiter and result.
pub const RATELIMIT_DECISIONS_TOTAL: &str = "gatehouse_ratelimit_decisions_total";
/// Keys removed by idle eviction.
pub const RATELIMIT_EVICTED_KEYS_TOTAL: &str = "gatehouse_ratelimit_evicted_keys_total";
/// Keys currently tracked per limiter.
pub const RATELIMIT_TRACKED_KEYS: &str = "gatehouse_ratelimit_tracked_keys";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to install a recorder.
    pub enabled: bool,

    /// Address for the scrape endpoint (e.g. `0.0.0.0:9090`). Without one
    /// the recorder is installed and rendered through [`render_metrics`].
    pub listen_addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: None,
        }
    }
}

/// Installs the Prometheus recorder.
///
/// With a `listen_addr` the exporter also serves a scrape endpoint; that
/// mode needs a tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new();
    match &config.listen_addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            builder
                .with_http_listener(addr)
                .install()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        None => {
            let handle = builder
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    describe_metrics();
    Ok(())
}

/// Renders the recorder's state in Prometheus text format.
///
/// Returns `None` unless [`init_metrics`] installed a recorder without a
/// listener.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(AUTHENTICATION_TOTAL, "Authentication attempts by result");
    describe_counter!(
        AUTHORIZATION_TOTAL,
        "Authorization decisions by result and deciding policy"
    );
    describe_counter!(
        RATELIMIT_DECISIONS_TOTAL,
        "Rate limiter acquisitions by limiter and result"
    );
    describe_counter!(
        RATELIMIT_EVICTED_KEYS_TOTAL,
        "Idle rate limiter keys evicted"
    );
    describe_gauge!(RATELIMIT_TRACKED_KEYS, "Rate limiter keys currently tracked");
}

/// Records an authentication outcome (`success`, `anonymous`, `failure`).
pub fn record_authentication(result: &str) {
    counter!(AUTHENTICATION_TOTAL, "result" => result.to_string()).increment(1);
}

/// Records an authorization outcome. `policy` is the policy that decided
/// it, or `none` when the route has no policies.
pub fn record_authorization(result: &str, policy: &str) {
    counter!(
        AUTHORIZATION_TOTAL,
        "result" => result.to_string(),
        "policy" => policy.to_string()
    )
    .increment(1);
}

/// Records one limiter acquisition (`acquired`, `queued`, `rejected`).
pub fn record_ratelimit_decision(limiter: &str, result: &str) {
    counter!(
        RATELIMIT_DECISIONS_TOTAL,
        "limiter" => limiter.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

/// Records keys removed from `limiter` by an eviction sweep.
pub fn record_evicted_keys(limiter: &str, count: usize) {
    counter!(RATELIMIT_EVICTED_KEYS_TOTAL, "limiter" => limiter.to_string()).increment(count as u64);
}

/// Sets the number of keys `limiter` tracks.
pub fn set_tracked_keys(limiter: &str, count: usize) {
    gauge!(RATELIMIT_TRACKED_KEYS, "limiter" => limiter.to_string()).set(count as f64);
}
