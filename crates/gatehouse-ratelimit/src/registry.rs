//! Named limiter registry and multi-limiter leases.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_telemetry::metrics::{record_evicted_keys, record_ratelimit_decision, set_tracked_keys};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::background::BackgroundTask;
use crate::concurrency::ConcurrencyLimiter;
use crate::error::{RateLimitError, RateLimitResult};
use crate::fixed_window::FixedWindowLimiter;
use crate::limiter::{Acquisition, Algorithm, RateLimiter};
use crate::options::{ConcurrencyOptions, FixedWindowOptions, SlidingWindowOptions, TokenBucketOptions};
use crate::sliding_window::SlidingWindowLimiter;
use crate::token_bucket::TokenBucketLimiter;

/// A limiter registered under a name.
///
/// Cheap to clone. Whether the limiter needs [`release`](Self::release)
/// calls is read once at registration.
#[derive(Clone)]
pub struct RegisteredLimiter {
    name: Arc<str>,
    limiter: Arc<dyn RateLimiter>,
    supports_release: bool,
}

impl RegisteredLimiter {
    fn new(name: Arc<str>, limiter: Arc<dyn RateLimiter>) -> Self {
        let supports_release = limiter.supports_release();
        Self {
            name,
            limiter,
            supports_release,
        }
    }

    /// Registration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The limiter's strategy.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.limiter.algorithm()
    }

    /// The underlying limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    /// Whether [`release`](Self::release) reaches the limiter.
    #[must_use]
    pub fn supports_release(&self) -> bool {
        self.supports_release
    }

    /// Attempts to take a permit for `key`, recording the decision.
    pub fn try_acquire(&self, key: &str) -> Acquisition {
        let acquisition = self.limiter.try_acquire(key);
        record_ratelimit_decision(&self.name, acquisition.as_str());
        if let Some(retry_after) = acquisition.retry_after() {
            debug!(
                limiter = %self.name,
                client_key = key,
                result = acquisition.as_str(),
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit denied"
            );
        }
        acquisition
    }

    /// Returns a permit for `key`. Skipped for limiters without release
    /// semantics.
    pub fn release(&self, key: &str) {
        if self.supports_release {
            self.limiter.release(key);
        }
    }
}

impl fmt::Debug for RegisteredLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredLimiter")
            .field("name", &self.name)
            .field("algorithm", &self.limiter.algorithm())
            .field("supports_release", &self.supports_release)
            .finish()
    }
}

/// Named limiter instances, in registration order.
///
/// Built once at startup; request handling only reads it. Background tasks
/// started for token buckets are owned by the registry and stop when it is
/// dropped.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: IndexMap<String, RegisteredLimiter>,
    tasks: Vec<BackgroundTask>,
}

impl LimiterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed window limiter.
    pub fn add_fixed_window(&mut self, name: impl Into<String>, options: FixedWindowOptions) -> RateLimitResult<()> {
        let name = name.into();
        self.check_name(&name)?;
        self.insert(name, Arc::new(FixedWindowLimiter::new(options)?))
    }

    /// Registers a sliding window limiter.
    pub fn add_sliding_window(
        &mut self,
        name: impl Into<String>,
        options: SlidingWindowOptions,
    ) -> RateLimitResult<()> {
        let name = name.into();
        self.check_name(&name)?;
        self.insert(name, Arc::new(SlidingWindowLimiter::new(options)?))
    }

    /// Registers a token bucket limiter.
    ///
    /// With `auto_replenishment` set, a refill timer is started on the
    /// current tokio runtime. Outside a runtime the bucket still refills
    /// lazily and a warning is logged.
    pub fn add_token_bucket(&mut self, name: impl Into<String>, options: TokenBucketOptions) -> RateLimitResult<()> {
        let name = name.into();
        self.check_name(&name)?;
        let auto_replenishment = options.auto_replenishment;
        let limiter = Arc::new(TokenBucketLimiter::new(options)?);

        if auto_replenishment {
            if tokio::runtime::Handle::try_current().is_ok() {
                self.tasks.push(TokenBucketLimiter::spawn_auto_replenish(&limiter, &name));
            } else {
                warn!(
                    limiter = %name,
                    "no tokio runtime; token bucket will refill on access only"
                );
            }
        }
        self.insert(name, limiter)
    }

    /// Registers a concurrency limiter.
    pub fn add_concurrency(&mut self, name: impl Into<String>, options: ConcurrencyOptions) -> RateLimitResult<()> {
        let name = name.into();
        self.check_name(&name)?;
        self.insert(name, Arc::new(ConcurrencyLimiter::new(options)?))
    }

    /// Registers a host-supplied limiter.
    pub fn add(&mut self, name: impl Into<String>, limiter: Arc<dyn RateLimiter>) -> RateLimitResult<()> {
        let name = name.into();
        self.check_name(&name)?;
        self.insert(name, limiter)
    }

    fn check_name(&self, name: &str) -> RateLimitResult<()> {
        if name.trim().is_empty() {
            return Err(RateLimitError::EmptyName);
        }
        if self.limiters.contains_key(name) {
            return Err(RateLimitError::DuplicateLimiter(name.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, name: String, limiter: Arc<dyn RateLimiter>) -> RateLimitResult<()> {
        let registered = RegisteredLimiter::new(Arc::from(name.as_str()), limiter);
        info!(
            limiter = %name,
            algorithm = %registered.algorithm(),
            supports_release = registered.supports_release,
            "rate limiter registered"
        );
        self.limiters.insert(name, registered);
        Ok(())
    }

    /// Looks up a limiter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredLimiter> {
        self.limiters.get(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.limiters.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    /// Registered limiters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredLimiter> {
        self.limiters.values()
    }

    /// Number of registered limiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no limiters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Number of background tasks owned by the registry.
    #[must_use]
    pub fn background_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Evicts idle keys from every limiter and refreshes the tracked-key
    /// gauges. Returns the total evicted.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let mut total = 0;
        for registered in self.limiters.values() {
            let evicted = registered.limiter.evict_idle(idle_for);
            if evicted > 0 {
                record_evicted_keys(&registered.name, evicted);
                total += evicted;
            }
            set_tracked_keys(&registered.name, registered.limiter.tracked_keys());
        }
        total
    }
}

/// Aggregate denial from [`RateLimitLease::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDenied {
    /// Longest retry hint among the denying limiters.
    pub retry_after: Duration,
    /// Name of the limiter that produced `retry_after`.
    pub limiter: String,
    /// Whether any denying limiter queued the request.
    pub queued: bool,
}

/// Permits held across a set of limiters for one request.
///
/// Dropping the lease releases every permit; [`release`](Self::release)
/// does the same explicitly.
#[derive(Debug)]
pub struct RateLimitLease {
    key: String,
    held: Vec<RegisteredLimiter>,
}

impl RateLimitLease {
    /// Tries every limiter in order for `key`.
    ///
    /// All limiters are consulted even after a denial so each records its
    /// decision. If any denies, permits already taken are returned at once
    /// and the denial carries the largest retry hint, since the request
    /// cannot proceed until the slowest limiter recovers.
    pub fn acquire<I>(limiters: I, key: impl Into<String>) -> Result<Self, RateLimitDenied>
    where
        I: IntoIterator<Item = RegisteredLimiter>,
    {
        let key = key.into();
        let mut held = Vec::new();
        let mut denied: Option<RateLimitDenied> = None;

        for limiter in limiters {
            match limiter.try_acquire(&key) {
                Acquisition::Acquired => held.push(limiter),
                acquisition => {
                    let retry_after = acquisition.retry_after().unwrap_or_default();
                    let queued = matches!(acquisition, Acquisition::Queued { .. });
                    match &mut denied {
                        Some(current) => {
                            current.queued |= queued;
                            if retry_after > current.retry_after {
                                current.retry_after = retry_after;
                                current.limiter = limiter.name().to_string();
                            }
                        }
                        None => {
                            denied = Some(RateLimitDenied {
                                retry_after,
                                limiter: limiter.name().to_string(),
                                queued,
                            });
                        }
                    }
                }
            }
        }

        let lease = Self { key, held };
        match denied {
            Some(denied) => {
                drop(lease);
                Err(denied)
            }
            None => Ok(lease),
        }
    }

    /// A lease holding nothing.
    #[must_use]
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            held: Vec::new(),
        }
    }

    /// The partition key the permits were taken for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Names of the limiters that granted a permit.
    pub fn limiters(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(RegisteredLimiter::name)
    }

    /// Returns true if no permits are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Releases every permit now.
    pub fn release(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        for limiter in self.held.drain(..) {
            limiter.release(&self.key);
        }
    }
}

impl Drop for RateLimitLease {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn registry_with(entries: &[(&str, u64)]) -> LimiterRegistry {
        let mut registry = LimiterRegistry::new();
        for (name, window_secs) in entries {
            registry
                .add_fixed_window(*name, FixedWindowOptions::new(1, Duration::from_secs(*window_secs)))
                .unwrap();
        }
        registry
    }

    fn resolve(registry: &LimiterRegistry, names: &[&str]) -> Vec<RegisteredLimiter> {
        names.iter().map(|name| registry.get(name).unwrap().clone()).collect()
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let mut registry = registry_with(&[("api", 1)]);
        assert_eq!(
            registry.add_concurrency("api", ConcurrencyOptions::new(1)),
            Err(RateLimitError::DuplicateLimiter("api".to_string()))
        );
        assert_eq!(
            registry.add_concurrency("  ", ConcurrencyOptions::new(1)),
            Err(RateLimitError::EmptyName)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut registry = LimiterRegistry::new();
        let err = registry
            .add_sliding_window("s", SlidingWindowOptions::new(1, Duration::from_secs(1), 0))
            .unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidOption { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_order_and_release_flag() {
        let mut registry = registry_with(&[("b", 1), ("a", 1)]);
        registry.add_concurrency("c", ConcurrencyOptions::new(1)).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert!(!registry.get("a").unwrap().supports_release());
        assert!(registry.get("c").unwrap().supports_release());
        assert_eq!(registry.get("c").unwrap().algorithm(), Algorithm::Concurrency);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_denial_uses_max_retry() {
        let registry = registry_with(&[("short", 2), ("long", 5)]);
        let limiters = resolve(&registry, &["short", "long"]);

        let lease = RateLimitLease::acquire(limiters.clone(), "client").unwrap();
        assert_eq!(lease.limiters().collect::<Vec<_>>(), vec!["short", "long"]);
        drop(lease);

        let denied = RateLimitLease::acquire(limiters, "client").unwrap_err();
        assert_eq!(denied.retry_after, Duration::from_secs(5));
        assert_eq!(denied.limiter, "long");
        assert!(!denied.queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_releases_acquired_permits() {
        let mut registry = registry_with(&[("window", 5)]);
        let concurrency = Arc::new(ConcurrencyLimiter::new(ConcurrencyOptions::new(1)).unwrap());
        registry.add("slots", concurrency.clone()).unwrap();
        let limiters = resolve(&registry, &["slots", "window"]);

        let lease = RateLimitLease::acquire(limiters.clone(), "k").unwrap();
        assert_eq!(concurrency.in_flight("k"), 1);
        lease.release();
        assert_eq!(concurrency.in_flight("k"), 0);

        // window denies; the concurrency permit must not leak
        assert!(RateLimitLease::acquire(limiters.clone(), "k").is_err());
        assert_eq!(concurrency.in_flight("k"), 0);

        advance(Duration::from_secs(5)).await;
        let lease = RateLimitLease::acquire(limiters, "k").unwrap();
        assert_eq!(concurrency.in_flight("k"), 1);
        drop(lease);
        assert_eq!(concurrency.in_flight("k"), 0);
    }

    #[test]
    fn test_empty_lease() {
        let lease = RateLimitLease::acquire(Vec::new(), "k").unwrap();
        assert!(lease.is_empty());
        assert_eq!(lease.key(), "k");
        assert!(RateLimitLease::empty("x").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_across_limiters() {
        let registry = registry_with(&[("a", 1), ("b", 1)]);
        for name in ["a", "b"] {
            registry.get(name).unwrap().try_acquire("k1");
            registry.get(name).unwrap().try_acquire("k2");
        }

        advance(Duration::from_secs(2)).await;
        assert_eq!(registry.evict_idle(Duration::from_secs(1)), 4);
        assert!(registry.iter().all(|l| l.limiter().tracked_keys() == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_replenish_task_owned_by_registry() {
        let mut registry = LimiterRegistry::new();
        registry
            .add_token_bucket(
                "bucket",
                TokenBucketOptions::new(1, 1, Duration::from_secs(1)).with_auto_replenishment(true),
            )
            .unwrap();
        registry
            .add_token_bucket("lazy", TokenBucketOptions::new(1, 1, Duration::from_secs(1)))
            .unwrap();
        assert_eq!(registry.background_tasks(), 1);
    }

    #[test]
    fn test_auto_replenish_without_runtime() {
        let mut registry = LimiterRegistry::new();
        registry
            .add_token_bucket(
                "bucket",
                TokenBucketOptions::new(1, 1, Duration::from_secs(1)).with_auto_replenishment(true),
            )
            .unwrap();
        assert_eq!(registry.background_tasks(), 0);
        assert!(registry.contains("bucket"));
    }
}
