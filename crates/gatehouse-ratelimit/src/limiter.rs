//! The common limiter contract.

use std::fmt;
use std::time::Duration;

/// Result of a single [`RateLimiter::try_acquire`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// A permit was granted.
    Acquired,
    /// Denied, but the request was placed in the key's wait queue.
    Queued {
        /// Suggested wait before retrying.
        retry_after: Duration,
    },
    /// Denied outright; the wait queue was full or disabled.
    Rejected {
        /// Suggested wait before retrying.
        retry_after: Duration,
    },
}

impl Acquisition {
    /// Returns true if a permit was granted.
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired)
    }

    /// Retry hint for denials.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Acquired => None,
            Self::Queued { retry_after } | Self::Rejected { retry_after } => Some(*retry_after),
        }
    }

    /// Metric label: `acquired`, `queued` or `rejected`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Acquired => "acquired",
            Self::Queued { .. } => "queued",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Limiting strategy of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// [`FixedWindowLimiter`](crate::FixedWindowLimiter).
    FixedWindow,
    /// [`SlidingWindowLimiter`](crate::SlidingWindowLimiter).
    SlidingWindow,
    /// [`TokenBucketLimiter`](crate::TokenBucketLimiter).
    TokenBucket,
    /// [`ConcurrencyLimiter`](crate::ConcurrencyLimiter).
    Concurrency,
    /// A host-supplied implementation.
    Custom,
}

impl Algorithm {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::TokenBucket => "token_bucket",
            Self::Concurrency => "concurrency",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyed rate limiter.
///
/// State is tracked independently per key and per instance: two limiters never
/// share state, even for the same key string. Implementations must be safe to
/// call from any number of concurrent requests, and successive calls for one
/// key must observe a linearized view of that key's state.
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// The limiter's strategy.
    fn algorithm(&self) -> Algorithm;

    /// Attempts to take a permit for `key`.
    fn try_acquire(&self, key: &str) -> Acquisition;

    /// Returns a permit taken by a successful [`try_acquire`](Self::try_acquire).
    ///
    /// A no-op for limiters that do not hold permits across a request.
    fn release(&self, _key: &str) {}

    /// Whether [`release`](Self::release) has any effect.
    ///
    /// Read once when the limiter is registered.
    fn supports_release(&self) -> bool {
        false
    }

    /// Brings every tracked key up to date and promotes queued waiters.
    ///
    /// Called by background timers; limiters that only update lazily can
    /// ignore it.
    fn replenish(&self) {}

    /// Forgets keys that have been idle for at least `idle_for` and whose
    /// state is indistinguishable from a fresh key. Returns how many were
    /// removed.
    fn evict_idle(&self, idle_for: Duration) -> usize;

    /// Number of keys currently tracked.
    fn tracked_keys(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_helpers() {
        let queued = Acquisition::Queued {
            retry_after: Duration::from_secs(2),
        };
        assert!(!queued.is_acquired());
        assert_eq!(queued.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(queued.as_str(), "queued");

        assert!(Acquisition::Acquired.is_acquired());
        assert_eq!(Acquisition::Acquired.retry_after(), None);
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(Algorithm::TokenBucket.to_string(), "token_bucket");
        assert_eq!(Algorithm::Concurrency.as_str(), "concurrency");
    }
}
