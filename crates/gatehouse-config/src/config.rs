//! The root configuration type.

use std::collections::HashSet;
use std::net::SocketAddr;

use gatehouse_policy::GlobalDefaults;
use gatehouse_telemetry::{LogConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, EvictionConfig, GroupConfig, LimiterConfig, ResolverConfig, RouteConfig};

/// Complete gatehouse configuration.
///
/// The engine never reads files itself; a host loads this with
/// [`ConfigLoader`](crate::ConfigLoader) and turns it into builder calls.
///
/// # Example
///
/// ```
/// use gatehouse_config::GatehouseConfig;
///
/// let config = GatehouseConfig::default();
/// assert!(config.limiters.is_empty());
/// assert!(config.eviction.enabled);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    /// Global fallback names.
    #[serde(default)]
    pub defaults: GlobalDefaults,

    /// Named limiter definitions.
    #[serde(default)]
    pub limiters: Vec<LimiterConfig>,

    /// Standalone routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Route groups.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// Resolver settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Idle key eviction.
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GatehouseConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::ValidationError` if:
    /// - a limiter name is empty or used twice
    /// - limiter options are out of range
    /// - a route has an empty path or no valid methods
    /// - a group has no routes
    /// - eviction is enabled with a zero TTL or interval
    /// - the metrics listen address does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for (index, limiter) in self.limiters.iter().enumerate() {
            let field = format!("limiters[{index}]");
            if limiter.name().trim().is_empty() {
                return Err(ConfigError::invalid_value(format!("{field}.name"), "must not be empty"));
            }
            if !names.insert(limiter.name()) {
                return Err(ConfigError::validation_error(format!(
                    "limiter '{}' is defined more than once",
                    limiter.name()
                )));
            }
            limiter
                .validate()
                .map_err(|err| ConfigError::invalid_value(field, err.to_string()))?;
        }

        for (index, route) in self.routes.iter().enumerate() {
            route.validate(&format!("routes[{index}]"))?;
        }

        for (index, group) in self.groups.iter().enumerate() {
            if group.routes.is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("groups[{index}].routes"),
                    "a group needs at least one route",
                ));
            }
            for (route_index, route) in group.routes.iter().enumerate() {
                route.validate(&format!("groups[{index}].routes[{route_index}]"))?;
            }
        }

        if self.eviction.enabled {
            if self.eviction.idle_ttl_secs == 0 {
                return Err(ConfigError::invalid_value(
                    "eviction.idle_ttl_secs",
                    "must be greater than zero",
                ));
            }
            if self.eviction.sweep_interval_secs == 0 {
                return Err(ConfigError::invalid_value(
                    "eviction.sweep_interval_secs",
                    "must be greater than zero",
                ));
            }
        }

        if let Some(addr) = &self.telemetry.metrics.listen_addr {
            if self.telemetry.metrics.enabled && addr.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.listen_addr",
                    format!("invalid socket address: {addr}"),
                ));
            }
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, metrics without a listener.
    ///
    /// ```
    /// use gatehouse_config::GatehouseConfig;
    ///
    /// let config = GatehouseConfig::development();
    /// assert!(!config.telemetry.logging.json_format);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LogConfig::development();
        config.telemetry.metrics.listen_addr = None;
        config
    }

    /// Production preset: JSON logs, metrics served on `0.0.0.0:9090`.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LogConfig::production();
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.listen_addr = Some("0.0.0.0:9090".to_string());
        config
    }
}
