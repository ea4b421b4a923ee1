//! Token bucket limiter.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::background::{spawn_periodic, BackgroundTask};
use crate::error::RateLimitResult;
use crate::keyed::KeyedState;
use crate::limiter::{Acquisition, Algorithm, RateLimiter};
use crate::options::TokenBucketOptions;
use crate::queue::Backlog;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
    backlog: Backlog,
}

/// Refills a per-key bucket of `token_limit` tokens at `tokens_per_period`
/// per `replenishment_period`; each request consumes one token.
///
/// Buckets refill lazily from elapsed time on every access. With
/// `auto_replenishment` enabled the registry also runs a timer that refills
/// every bucket each period, so queued waiters are promoted without waiting
/// for the next request.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    options: TokenBucketOptions,
    capacity: f64,
    state: KeyedState<Bucket>,
}

impl TokenBucketLimiter {
    /// Creates a limiter after validating `options`.
    pub fn new(options: TokenBucketOptions) -> RateLimitResult<Self> {
        options.validate()?;
        Ok(Self {
            capacity: f64::from(options.token_limit),
            options,
            state: KeyedState::default(),
        })
    }

    /// The limiter's options.
    #[must_use]
    pub fn options(&self) -> &TokenBucketOptions {
        &self.options
    }

    /// Starts the refill timer for `limiter`.
    ///
    /// The task holds a weak reference and exits when the limiter is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_auto_replenish(limiter: &Arc<Self>, name: &str) -> BackgroundTask {
        let weak: Weak<Self> = Arc::downgrade(limiter);
        spawn_periodic(
            format!("token-bucket-replenish:{name}"),
            limiter.options.replenishment_period,
            move || {
                let Some(limiter) = weak.upgrade() else {
                    return false;
                };
                limiter.replenish();
                true
            },
        )
    }

    /// Adds tokens for the time elapsed since the last refill, then promotes
    /// waiters into whole tokens.
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        if !elapsed.is_zero() {
            let added = elapsed.as_nanos() as f64 * f64::from(self.options.tokens_per_period)
                / self.options.replenishment_period.as_nanos() as f64;
            bucket.tokens = (bucket.tokens + added).min(self.capacity);
            bucket.last_refill = now;
        }
        bucket.backlog.expire(now);

        if bucket.tokens >= 1.0 && bucket.backlog.has_waiters() {
            let whole = bucket.tokens.floor() as u32;
            let promoted = bucket.backlog.promote(
                whole,
                self.options.queue_processing_order,
                now + self.options.replenishment_period,
            );
            bucket.tokens -= f64::from(promoted);
        }
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }

    fn try_acquire(&self, key: &str) -> Acquisition {
        self.state.with(
            key,
            |now| Bucket {
                tokens: self.capacity,
                last_refill: now,
                last_seen: now,
                backlog: Backlog::default(),
            },
            |bucket, now| {
                bucket.last_seen = now;
                self.refill(bucket, now);

                if let Some(reservation) = bucket.backlog.claim(now) {
                    debug!(
                        waited_ms = reservation.waited(now).as_millis() as u64,
                        "claimed queued token"
                    );
                    return Acquisition::Acquired;
                }

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Acquisition::Acquired;
                }

                let retry_after = self.options.time_per_token();
                if bucket.backlog.try_enqueue(now, self.options.queue_limit) {
                    Acquisition::Queued { retry_after }
                } else {
                    Acquisition::Rejected { retry_after }
                }
            },
        )
    }

    fn replenish(&self) {
        self.state.for_each(|bucket, now| self.refill(bucket, now));
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        self.state.evict(|bucket, now| {
            self.refill(bucket, now);
            bucket.tokens >= self.capacity
                && bucket.backlog.is_empty()
                && now.saturating_duration_since(bucket.last_seen) >= idle_for
        })
    }

    fn tracked_keys(&self) -> usize {
        self.state.len()
    }
}
