//! Configuration section types.

use std::time::Duration;

use gatehouse_policy::{GroupSpec, ResolverOptions, RouteSpec, UnknownLimiterPolicy};
use gatehouse_ratelimit::{
    ConcurrencyOptions, FixedWindowOptions, LimiterRegistry, QueueProcessingOrder, RateLimitResult,
    SlidingWindowOptions, TokenBucketOptions,
};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A named limiter definition.
///
/// The `algorithm` key selects the variant:
///
/// ```toml
/// [[limiters]]
/// name = "per-client"
/// algorithm = "token_bucket"
/// token_limit = 20
/// tokens_per_period = 10
/// replenishment_period_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "algorithm", rename_all = "snake_case", deny_unknown_fields)]
pub enum LimiterConfig {
    /// Fixed window counter.
    FixedWindow {
        /// Limiter name routes refer to.
        name: String,
        /// Permits per window.
        permit_limit: u32,
        /// Window length in milliseconds.
        window_ms: u64,
        /// Maximum queued waiters per key; zero disables queuing.
        #[serde(default)]
        queue_limit: usize,
        /// Promotion order for queued waiters.
        #[serde(default)]
        queue_processing_order: QueueProcessingOrder,
    },
    /// Sliding window split into segments.
    SlidingWindow {
        /// Limiter name routes refer to.
        name: String,
        /// Permits per window.
        permit_limit: u32,
        /// Window length in milliseconds.
        window_ms: u64,
        /// Segments the window is divided into.
        segments_per_window: u32,
        /// Maximum queued waiters per key; zero disables queuing.
        #[serde(default)]
        queue_limit: usize,
        /// Promotion order for queued waiters.
        #[serde(default)]
        queue_processing_order: QueueProcessingOrder,
    },
    /// Token bucket.
    TokenBucket {
        /// Limiter name routes refer to.
        name: String,
        /// Bucket capacity.
        token_limit: u32,
        /// Tokens added per period.
        tokens_per_period: u32,
        /// Replenishment period in milliseconds.
        replenishment_period_ms: u64,
        /// Refill on a background task instead of lazily only.
        #[serde(default = "default_true")]
        auto_replenishment: bool,
        /// Maximum queued waiters per key; zero disables queuing.
        #[serde(default)]
        queue_limit: usize,
        /// Promotion order for queued waiters.
        #[serde(default)]
        queue_processing_order: QueueProcessingOrder,
    },
    /// In-flight request limit.
    Concurrency {
        /// Limiter name routes refer to.
        name: String,
        /// Maximum in-flight requests per key.
        permit_limit: u32,
        /// How long a slot freed for a queued waiter stays reserved.
        #[serde(default = "default_reservation_timeout_ms")]
        reservation_timeout_ms: u64,
        /// Maximum queued waiters per key; zero disables queuing.
        #[serde(default)]
        queue_limit: usize,
        /// Promotion order for queued waiters.
        #[serde(default)]
        queue_processing_order: QueueProcessingOrder,
    },
}

impl LimiterConfig {
    /// The limiter name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::FixedWindow { name, .. }
            | Self::SlidingWindow { name, .. }
            | Self::TokenBucket { name, .. }
            | Self::Concurrency { name, .. } => name,
        }
    }

    /// The `algorithm` tag.
    #[must_use]
    pub const fn algorithm(&self) -> &'static str {
        match self {
            Self::FixedWindow { .. } => "fixed_window",
            Self::SlidingWindow { .. } => "sliding_window",
            Self::TokenBucket { .. } => "token_bucket",
            Self::Concurrency { .. } => "concurrency",
        }
    }

    /// Registers the limiter, validating its options.
    pub fn register(&self, registry: &mut LimiterRegistry) -> RateLimitResult<()> {
        let name = self.name();
        match self.options() {
            LimiterOptions::Fixed(options) => registry.add_fixed_window(name, options),
            LimiterOptions::Sliding(options) => registry.add_sliding_window(name, options),
            LimiterOptions::Token(options) => registry.add_token_bucket(name, options),
            LimiterOptions::Concurrency(options) => registry.add_concurrency(name, options),
        }
    }

    /// Checks option ranges without registering anything.
    pub fn validate(&self) -> RateLimitResult<()> {
        match self.options() {
            LimiterOptions::Fixed(options) => options.validate(),
            LimiterOptions::Sliding(options) => options.validate(),
            LimiterOptions::Token(options) => options.validate(),
            LimiterOptions::Concurrency(options) => options.validate(),
        }
    }

    fn options(&self) -> LimiterOptions {
        match *self {
            Self::FixedWindow {
                permit_limit,
                window_ms,
                queue_limit,
                queue_processing_order,
                ..
            } => LimiterOptions::Fixed(
                FixedWindowOptions::new(permit_limit, Duration::from_millis(window_ms))
                    .with_queue(queue_limit, queue_processing_order),
            ),
            Self::SlidingWindow {
                permit_limit,
                window_ms,
                segments_per_window,
                queue_limit,
                queue_processing_order,
                ..
            } => LimiterOptions::Sliding(
                SlidingWindowOptions::new(permit_limit, Duration::from_millis(window_ms), segments_per_window)
                    .with_queue(queue_limit, queue_processing_order),
            ),
            Self::TokenBucket {
                token_limit,
                tokens_per_period,
                replenishment_period_ms,
                auto_replenishment,
                queue_limit,
                queue_processing_order,
                ..
            } => LimiterOptions::Token(
                TokenBucketOptions::new(
                    token_limit,
                    tokens_per_period,
                    Duration::from_millis(replenishment_period_ms),
                )
                .with_auto_replenishment(auto_replenishment)
                .with_queue(queue_limit, queue_processing_order),
            ),
            Self::Concurrency {
                permit_limit,
                reservation_timeout_ms,
                queue_limit,
                queue_processing_order,
                ..
            } => LimiterOptions::Concurrency(
                ConcurrencyOptions::new(permit_limit)
                    .with_reservation_timeout(Duration::from_millis(reservation_timeout_ms))
                    .with_queue(queue_limit, queue_processing_order),
            ),
        }
    }
}

enum LimiterOptions {
    Fixed(FixedWindowOptions),
    Sliding(SlidingWindowOptions),
    Token(TokenBucketOptions),
    Concurrency(ConcurrencyOptions),
}

/// A route declaration.
///
/// ```toml
/// [[routes]]
/// methods = ["GET", "HEAD"]
/// path = "/users/{id}"
/// schemes = ["bearer"]
/// limiters = ["per-client"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// HTTP methods, case-insensitive.
    pub methods: Vec<String>,
    /// Route template.
    pub path: String,
    /// Authentication schemes, in evaluation order.
    #[serde(default)]
    pub schemes: Vec<String>,
    /// Authorization policies, in evaluation order.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Rate limiters.
    #[serde(default)]
    pub limiters: Vec<String>,
    /// Exempt from authentication.
    #[serde(default)]
    pub allow_anonymous: bool,
}

impl RouteConfig {
    /// Parses the method names.
    pub fn parsed_methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.methods
            .iter()
            .map(|name| {
                Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::invalid_value("methods", format!("invalid HTTP method '{name}'")))
            })
            .collect()
    }

    /// Converts to a policy declaration.
    pub fn to_spec(&self) -> Result<RouteSpec, ConfigError> {
        let spec = RouteSpec::with_methods(self.parsed_methods()?, self.path.clone())
            .schemes(self.schemes.iter().cloned())
            .policies(self.policies.iter().cloned())
            .limiters(self.limiters.iter().cloned());
        Ok(if self.allow_anonymous { spec.allow_anonymous() } else { spec })
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::invalid_value(format!("{field}.path"), "must not be empty"));
        }
        if self.methods.is_empty() {
            return Err(ConfigError::invalid_value(
                format!("{field}.methods"),
                "at least one method is required",
            ));
        }
        self.parsed_methods()
            .map_err(|err| ConfigError::invalid_value(format!("{field}.methods"), err.to_string()))?;
        Ok(())
    }
}

/// A group of routes sharing a prefix and security settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Path prefix joined onto every route.
    pub prefix: String,
    /// Schemes applied before each route's own.
    #[serde(default)]
    pub schemes: Vec<String>,
    /// Policies applied before each route's own.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Limiters applied before each route's own.
    #[serde(default)]
    pub limiters: Vec<String>,
    /// Makes every route allow-anonymous.
    #[serde(default)]
    pub allow_anonymous: bool,
    /// Routes in the group.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl GroupConfig {
    /// Converts to a policy group declaration.
    pub fn to_spec(&self) -> Result<GroupSpec, ConfigError> {
        let mut group = GroupSpec::new(self.prefix.clone())
            .schemes(self.schemes.iter().cloned())
            .policies(self.policies.iter().cloned())
            .limiters(self.limiters.iter().cloned());
        if self.allow_anonymous {
            group = group.allow_anonymous();
        }
        for route in &self.routes {
            group = group.route(route.to_spec()?);
        }
        Ok(group)
    }
}

/// Request-time resolver settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Handling of limiter names nothing registered.
    #[serde(default)]
    pub unknown_limiter: UnknownLimiterPolicy,
}

impl ResolverConfig {
    /// Resolver options for these settings.
    #[must_use]
    pub fn to_options(&self) -> ResolverOptions {
        ResolverOptions::default().with_unknown_limiter(self.unknown_limiter)
    }
}

/// Idle limiter key eviction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EvictionConfig {
    /// Run the background sweeper.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keys untouched this long are evicted.
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
    /// Time between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl EvictionConfig {
    /// Idle time before eviction.
    #[must_use]
    pub const fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    /// Sweep period.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_reservation_timeout_ms() -> u64 {
    1000
}

fn default_idle_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}
