//! Fixed window limiter.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::RateLimitResult;
use crate::keyed::KeyedState;
use crate::limiter::{Acquisition, Algorithm, RateLimiter};
use crate::options::FixedWindowOptions;
use crate::queue::Backlog;

#[derive(Debug)]
struct WindowState {
    count: u32,
    window_start: Instant,
    last_seen: Instant,
    backlog: Backlog,
}

impl WindowState {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_seen: now,
            backlog: Backlog::default(),
        }
    }
}

/// Allows `permit_limit` requests per key in each fixed `window`.
///
/// The window for a key starts at its first request and restarts with the
/// first request after it ends. Bursts straddling a window boundary can
/// briefly admit up to twice the limit; use
/// [`SlidingWindowLimiter`](crate::SlidingWindowLimiter) when that matters.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use gatehouse_ratelimit::{FixedWindowLimiter, FixedWindowOptions, RateLimiter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = FixedWindowLimiter::new(FixedWindowOptions::new(1, Duration::from_secs(1))).unwrap();
/// assert!(limiter.try_acquire("client-a").is_acquired());
/// assert!(!limiter.try_acquire("client-a").is_acquired());
/// assert!(limiter.try_acquire("client-b").is_acquired());
/// # }
/// ```
#[derive(Debug)]
pub struct FixedWindowLimiter {
    options: FixedWindowOptions,
    state: KeyedState<WindowState>,
}

impl FixedWindowLimiter {
    /// Creates a limiter after validating `options`.
    pub fn new(options: FixedWindowOptions) -> RateLimitResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            state: KeyedState::default(),
        })
    }

    /// The limiter's options.
    #[must_use]
    pub fn options(&self) -> &FixedWindowOptions {
        &self.options
    }

    /// Starts a new window if the current one has ended, promoting waiters
    /// into the fresh window's permits.
    fn refresh(&self, state: &mut WindowState, now: Instant) {
        if now.saturating_duration_since(state.window_start) >= self.options.window {
            state.window_start = now;
            state.count = state.backlog.promote(
                self.options.permit_limit,
                self.options.queue_processing_order,
                now + self.options.window,
            );
        }
        state.backlog.expire(now);
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    fn try_acquire(&self, key: &str) -> Acquisition {
        self.state.with(
            key,
            WindowState::new,
            |state, now| {
                state.last_seen = now;
                self.refresh(state, now);

                if let Some(reservation) = state.backlog.claim(now) {
                    debug!(
                        waited_ms = reservation.waited(now).as_millis() as u64,
                        "claimed queued fixed window permit"
                    );
                    return Acquisition::Acquired;
                }

                if state.count < self.options.permit_limit {
                    state.count += 1;
                    return Acquisition::Acquired;
                }

                let elapsed = now.saturating_duration_since(state.window_start);
                let retry_after = self.options.window.saturating_sub(elapsed);
                if state.backlog.try_enqueue(now, self.options.queue_limit) {
                    Acquisition::Queued { retry_after }
                } else {
                    Acquisition::Rejected { retry_after }
                }
            },
        )
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        self.state.evict(|state, now| {
            state.backlog.expire(now);
            now.saturating_duration_since(state.window_start) >= self.options.window
                && now.saturating_duration_since(state.last_seen) >= idle_for
                && state.backlog.is_empty()
        })
    }

    fn tracked_keys(&self) -> usize {
        self.state.len()
    }
}
