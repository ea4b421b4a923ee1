//! Concurrency limiter.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::RateLimitResult;
use crate::keyed::KeyedState;
use crate::limiter::{Acquisition, Algorithm, RateLimiter};
use crate::options::ConcurrencyOptions;
use crate::queue::Backlog;

#[derive(Debug)]
struct Slots {
    in_flight: u32,
    last_seen: Instant,
    backlog: Backlog,
}

/// Caps the number of permits held at once per key.
///
/// A permit is held from a successful acquire until [`release`]. When a
/// permit is released and waiters are queued, the freed slot goes to the
/// next waiter rather than to whichever request arrives first; the waiter
/// claims it on its next acquire, or loses it after `reservation_timeout`.
///
/// [`release`]: RateLimiter::release
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    options: ConcurrencyOptions,
    state: KeyedState<Slots>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter after validating `options`.
    pub fn new(options: ConcurrencyOptions) -> RateLimitResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            state: KeyedState::default(),
        })
    }

    /// The limiter's options.
    #[must_use]
    pub fn options(&self) -> &ConcurrencyOptions {
        &self.options
    }

    /// Permits currently held for `key`, including unclaimed reservations.
    #[must_use]
    pub fn in_flight(&self, key: &str) -> u32 {
        self.state.with_existing(key, |slots, _| slots.in_flight).unwrap_or(0)
    }

    /// Frees slots held by expired reservations and hands free slots to
    /// waiters.
    fn refresh(&self, slots: &mut Slots, now: Instant) {
        let expired = slots.backlog.expire(now);
        if expired > 0 {
            trace!(expired, "concurrency reservations expired");
            slots.in_flight = slots.in_flight.saturating_sub(expired);
        }
        self.promote(slots, now);
    }

    fn promote(&self, slots: &mut Slots, now: Instant) {
        let free = self.options.permit_limit.saturating_sub(slots.in_flight);
        if free > 0 && slots.backlog.has_waiters() {
            slots.in_flight += slots.backlog.promote(
                free,
                self.options.queue_processing_order,
                now + self.options.reservation_timeout,
            );
        }
    }
}

impl RateLimiter for ConcurrencyLimiter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Concurrency
    }

    fn try_acquire(&self, key: &str) -> Acquisition {
        self.state.with(
            key,
            |now| Slots {
                in_flight: 0,
                last_seen: now,
                backlog: Backlog::default(),
            },
            |slots, now| {
                slots.last_seen = now;
                self.refresh(slots, now);

                if let Some(reservation) = slots.backlog.claim(now) {
                    debug!(
                        waited_ms = reservation.waited(now).as_millis() as u64,
                        "claimed queued concurrency slot"
                    );
                    return Acquisition::Acquired;
                }

                if slots.in_flight < self.options.permit_limit {
                    slots.in_flight += 1;
                    return Acquisition::Acquired;
                }

                let retry_after = self.options.retry_hint;
                if slots.backlog.try_enqueue(now, self.options.queue_limit) {
                    Acquisition::Queued { retry_after }
                } else {
                    Acquisition::Rejected { retry_after }
                }
            },
        )
    }

    fn release(&self, key: &str) {
        let released = self.state.with_existing(key, |slots, now| {
            slots.last_seen = now;
            slots.in_flight = slots.in_flight.saturating_sub(1);
            self.refresh(slots, now);
        });
        if released.is_none() {
            trace!(key, "release for untracked key ignored");
        }
    }

    fn supports_release(&self) -> bool {
        true
    }

    fn replenish(&self) {
        self.state.for_each(|slots, now| self.refresh(slots, now));
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        self.state.evict(|slots, now| {
            self.refresh(slots, now);
            slots.in_flight == 0
                && slots.backlog.is_empty()
                && now.saturating_duration_since(slots.last_seen) >= idle_for
        })
    }

    fn tracked_keys(&self) -> usize {
        self.state.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::QueueProcessingOrder;
    use tokio::time::advance;

    fn limiter(limit: u32) -> ConcurrencyLimiter {
        ConcurrencyLimiter::new(ConcurrencyOptions::new(limit)).unwrap()
    }

    #[tokio::test]
    async fn test_limit_and_release() {
        let limiter = limiter(2);

        assert!(limiter.try_acquire("k").is_acquired());
        assert!(limiter.try_acquire("k").is_acquired());
        assert_eq!(
            limiter.try_acquire("k"),
            Acquisition::Rejected {
                retry_after: Duration::from_millis(100)
            }
        );

        limiter.release("k");
        assert!(limiter.try_acquire("k").is_acquired());
        assert_eq!(limiter.in_flight("k"), 2);
    }

    #[tokio::test]
    async fn test_release_unknown_key_is_ignored() {
        let limiter = limiter(1);
        limiter.release("nobody");
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.supports_release());
    }

    #[tokio::test]
    async fn test_release_never_underflows() {
        let limiter = limiter(1);
        limiter.try_acquire("k");
        limiter.release("k");
        limiter.release("k");
        assert_eq!(limiter.in_flight("k"), 0);
        assert!(limiter.try_acquire("k").is_acquired());
        assert!(!limiter.try_acquire("k").is_acquired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_hands_slot_to_waiter() {
        let options = ConcurrencyOptions::new(1).with_queue(1, QueueProcessingOrder::OldestFirst);
        let limiter = ConcurrencyLimiter::new(options).unwrap();

        assert!(limiter.try_acquire("k").is_acquired());
        assert!(matches!(limiter.try_acquire("k"), Acquisition::Queued { .. }));

        limiter.release("k");
        // the slot is reserved for the waiter, not left open
        assert_eq!(limiter.in_flight("k"), 1);
        assert!(limiter.try_acquire("k").is_acquired());
        assert!(matches!(limiter.try_acquire("k"), Acquisition::Queued { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_reservation_frees_slot() {
        let options = ConcurrencyOptions::new(1)
            .with_queue(1, QueueProcessingOrder::NewestFirst)
            .with_reservation_timeout(Duration::from_millis(500));
        let limiter = ConcurrencyLimiter::new(options).unwrap();

        limiter.try_acquire("k");
        limiter.try_acquire("k");
        limiter.release("k");
        assert_eq!(limiter.in_flight("k"), 1);

        advance(Duration::from_millis(500)).await;
        limiter.replenish();
        assert_eq!(limiter.in_flight("k"), 0);
        assert!(limiter.try_acquire("k").is_acquired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_returns_slot_of_expired_reservation() {
        let options = ConcurrencyOptions::new(2)
            .with_queue(1, QueueProcessingOrder::OldestFirst)
            .with_reservation_timeout(Duration::from_millis(500));
        let limiter = ConcurrencyLimiter::new(options).unwrap();

        assert!(limiter.try_acquire("k").is_acquired());
        assert!(limiter.try_acquire("k").is_acquired());
        assert!(matches!(limiter.try_acquire("k"), Acquisition::Queued { .. }));

        // first holder leaves, its slot is reserved for the waiter
        limiter.release("k");
        assert_eq!(limiter.in_flight("k"), 2);

        // waiter never comes back; the reservation lapses before the next release
        advance(Duration::from_millis(600)).await;
        limiter.release("k");
        assert_eq!(limiter.in_flight("k"), 0);

        assert!(limiter.try_acquire("k").is_acquired());
        assert!(limiter.try_acquire("k").is_acquired());
        assert!(!limiter.try_acquire("k").is_acquired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_requires_no_permits_held() {
        let limiter = limiter(1);
        limiter.try_acquire("k");

        advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 0);

        limiter.release("k");
        advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 1);
    }
}
