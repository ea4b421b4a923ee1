//! Cross-limiter behavior through the public API.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_ratelimit::{
    spawn_sweeper, Acquisition, ConcurrencyOptions, FixedWindowOptions, LimiterRegistry, QueueProcessingOrder,
    RateLimitLease, SlidingWindowOptions, TokenBucketOptions,
};
use tokio::time::advance;

fn lease_for(registry: &LimiterRegistry, names: &[&str], key: &str) -> Result<RateLimitLease, Duration> {
    let limiters = names.iter().filter_map(|name| registry.get(name).cloned());
    RateLimitLease::acquire(limiters, key).map_err(|denied| denied.retry_after)
}

#[tokio::test(start_paused = true)]
async fn test_fixed_window_boundary() {
    let mut registry = LimiterRegistry::new();
    registry
        .add_fixed_window("fw", FixedWindowOptions::new(1, Duration::from_secs(1)))
        .unwrap();
    let limiter = registry.get("fw").unwrap();

    assert_eq!(limiter.try_acquire("k"), Acquisition::Acquired);
    advance(Duration::from_millis(500)).await;
    assert_eq!(
        limiter.try_acquire("k").retry_after(),
        Some(Duration::from_millis(500))
    );
    advance(Duration::from_millis(510)).await;
    assert_eq!(limiter.try_acquire("k"), Acquisition::Acquired);
}

#[tokio::test(start_paused = true)]
async fn test_token_bucket_saturation() {
    let mut registry = LimiterRegistry::new();
    registry
        .add_token_bucket("tb", TokenBucketOptions::new(5, 1, Duration::from_secs(1)))
        .unwrap();

    for _ in 0..5 {
        assert!(lease_for(&registry, &["tb"], "k").is_ok());
    }
    assert_eq!(lease_for(&registry, &["tb"], "k").unwrap_err(), Duration::from_secs(1));

    advance(Duration::from_secs(1)).await;
    assert!(lease_for(&registry, &["tb"], "k").is_ok());
    assert!(lease_for(&registry, &["tb"], "k").is_err());
}

#[tokio::test]
async fn test_concurrency_release_semantics() {
    let mut registry = LimiterRegistry::new();
    registry.add_concurrency("cc", ConcurrencyOptions::new(2)).unwrap();

    let first = lease_for(&registry, &["cc"], "k").unwrap();
    let second = lease_for(&registry, &["cc"], "k").unwrap();
    assert!(lease_for(&registry, &["cc"], "k").is_err());

    drop(first);
    let fourth = lease_for(&registry, &["cc"], "k").unwrap();
    drop((second, fourth));
}

#[tokio::test(start_paused = true)]
async fn test_aggregate_decision_takes_slowest_limiter() {
    let mut registry = LimiterRegistry::new();
    registry
        .add_fixed_window("two", FixedWindowOptions::new(1, Duration::from_secs(2)))
        .unwrap();
    registry
        .add_sliding_window("five", SlidingWindowOptions::new(1, Duration::from_secs(5), 5))
        .unwrap();

    let lease = lease_for(&registry, &["two", "five"], "k").unwrap();
    drop(lease);
    assert_eq!(
        lease_for(&registry, &["two", "five"], "k").unwrap_err(),
        Duration::from_secs(5)
    );
}

#[tokio::test(start_paused = true)]
async fn test_queued_denial_is_reported() {
    let mut registry = LimiterRegistry::new();
    registry
        .add_fixed_window(
            "fw",
            FixedWindowOptions::new(1, Duration::from_secs(1)).with_queue(1, QueueProcessingOrder::NewestFirst),
        )
        .unwrap();

    let _held = lease_for(&registry, &["fw"], "k").unwrap();
    let limiters = registry.get("fw").cloned();
    let denied = RateLimitLease::acquire(limiters, "k").unwrap_err();
    assert!(denied.queued);
    assert_eq!(denied.limiter, "fw");
}

#[tokio::test(start_paused = true)]
async fn test_limiter_instances_do_not_share_state() {
    let mut registry = LimiterRegistry::new();
    for name in ["a", "b"] {
        registry
            .add_fixed_window(name, FixedWindowOptions::new(1, Duration::from_secs(10)))
            .unwrap();
    }

    assert!(lease_for(&registry, &["a"], "same-key").is_ok());
    assert!(lease_for(&registry, &["b"], "same-key").is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_evicts_idle_keys() {
    let mut registry = LimiterRegistry::new();
    registry
        .add_fixed_window("fw", FixedWindowOptions::new(10, Duration::from_secs(1)))
        .unwrap();
    let registry = Arc::new(registry);

    for key in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        registry.get("fw").unwrap().try_acquire(key);
    }
    assert_eq!(registry.get("fw").unwrap().limiter().tracked_keys(), 3);

    let sweeper = spawn_sweeper(&registry, Duration::from_secs(2), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(registry.get("fw").unwrap().limiter().tracked_keys(), 0);

    sweeper.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_stops_when_registry_dropped() {
    let registry = Arc::new(LimiterRegistry::new());
    let sweeper = spawn_sweeper(&registry, Duration::from_secs(1), Duration::from_secs(1));
    drop(registry);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(sweeper.is_finished());
}
