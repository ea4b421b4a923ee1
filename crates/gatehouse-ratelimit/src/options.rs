//! Limiter options.
//!
//! Every algorithm shares the wait-queue settings (`queue_limit` and
//! `queue_processing_order`); a `queue_limit` of zero disables queuing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RateLimitError, RateLimitResult};

/// Order in which queued waiters are promoted when capacity returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueProcessingOrder {
    /// First queued, first promoted.
    #[default]
    OldestFirst,
    /// Last queued, first promoted.
    NewestFirst,
}

/// Options for [`FixedWindowLimiter`](crate::FixedWindowLimiter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindowOptions {
    /// Permits per window.
    pub permit_limit: u32,
    /// Window length.
    pub window: Duration,
    /// Maximum queued waiters per key.
    pub queue_limit: usize,
    /// Promotion order for queued waiters.
    pub queue_processing_order: QueueProcessingOrder,
}

impl FixedWindowOptions {
    /// Creates options allowing `permit_limit` requests per `window`.
    #[must_use]
    pub fn new(permit_limit: u32, window: Duration) -> Self {
        Self {
            permit_limit,
            window,
            queue_limit: 0,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
        }
    }

    /// Enables a bounded wait queue.
    #[must_use]
    pub fn with_queue(mut self, limit: usize, order: QueueProcessingOrder) -> Self {
        self.queue_limit = limit;
        self.queue_processing_order = order;
        self
    }

    /// Checks option ranges.
    pub fn validate(&self) -> RateLimitResult<()> {
        const ALGORITHM: &str = "fixed_window";
        if self.permit_limit == 0 {
            return Err(RateLimitError::invalid(ALGORITHM, "permit_limit", "must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::invalid(ALGORITHM, "window", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Options for [`SlidingWindowLimiter`](crate::SlidingWindowLimiter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindowOptions {
    /// Permits per trailing window.
    pub permit_limit: u32,
    /// Trailing window length.
    pub window: Duration,
    /// Number of segments the window is divided into.
    pub segments_per_window: u32,
    /// Maximum queued waiters per key.
    pub queue_limit: usize,
    /// Promotion order for queued waiters.
    pub queue_processing_order: QueueProcessingOrder,
}

impl SlidingWindowOptions {
    /// Creates options allowing `permit_limit` requests in any trailing
    /// `window`, tracked in `segments_per_window` buckets.
    #[must_use]
    pub fn new(permit_limit: u32, window: Duration, segments_per_window: u32) -> Self {
        Self {
            permit_limit,
            window,
            segments_per_window,
            queue_limit: 0,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
        }
    }

    /// Enables a bounded wait queue.
    #[must_use]
    pub fn with_queue(mut self, limit: usize, order: QueueProcessingOrder) -> Self {
        self.queue_limit = limit;
        self.queue_processing_order = order;
        self
    }

    /// Length of one segment.
    #[must_use]
    pub fn segment_length(&self) -> Duration {
        self.window / self.segments_per_window.max(1)
    }

    /// Checks option ranges.
    pub fn validate(&self) -> RateLimitResult<()> {
        const ALGORITHM: &str = "sliding_window";
        if self.permit_limit == 0 {
            return Err(RateLimitError::invalid(ALGORITHM, "permit_limit", "must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::invalid(ALGORITHM, "window", "must be greater than zero"));
        }
        if self.segments_per_window == 0 {
            return Err(RateLimitError::invalid(
                ALGORITHM,
                "segments_per_window",
                "must be greater than zero",
            ));
        }
        if self.segment_length().is_zero() {
            return Err(RateLimitError::invalid(
                ALGORITHM,
                "segments_per_window",
                "produces zero-length segments",
            ));
        }
        Ok(())
    }
}

/// Options for [`TokenBucketLimiter`](crate::TokenBucketLimiter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketOptions {
    /// Bucket capacity. New keys start full.
    pub token_limit: u32,
    /// Tokens added per replenishment period.
    pub tokens_per_period: u32,
    /// Replenishment period.
    pub replenishment_period: Duration,
    /// Refill every bucket on a background timer in addition to lazily.
    pub auto_replenishment: bool,
    /// Maximum queued waiters per key.
    pub queue_limit: usize,
    /// Promotion order for queued waiters.
    pub queue_processing_order: QueueProcessingOrder,
}

impl TokenBucketOptions {
    /// Creates options for a bucket of `token_limit` tokens refilled by
    /// `tokens_per_period` every `replenishment_period`.
    #[must_use]
    pub fn new(token_limit: u32, tokens_per_period: u32, replenishment_period: Duration) -> Self {
        Self {
            token_limit,
            tokens_per_period,
            replenishment_period,
            auto_replenishment: false,
            queue_limit: 0,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
        }
    }

    /// Enables the background refill timer.
    #[must_use]
    pub fn with_auto_replenishment(mut self, enabled: bool) -> Self {
        self.auto_replenishment = enabled;
        self
    }

    /// Enables a bounded wait queue.
    #[must_use]
    pub fn with_queue(mut self, limit: usize, order: QueueProcessingOrder) -> Self {
        self.queue_limit = limit;
        self.queue_processing_order = order;
        self
    }

    /// Time for one token to accumulate.
    #[must_use]
    pub fn time_per_token(&self) -> Duration {
        self.replenishment_period / self.tokens_per_period.max(1)
    }

    /// Checks option ranges.
    pub fn validate(&self) -> RateLimitResult<()> {
        const ALGORITHM: &str = "token_bucket";
        if self.token_limit == 0 {
            return Err(RateLimitError::invalid(ALGORITHM, "token_limit", "must be greater than zero"));
        }
        if self.tokens_per_period == 0 {
            return Err(RateLimitError::invalid(
                ALGORITHM,
                "tokens_per_period",
                "must be greater than zero",
            ));
        }
        if self.replenishment_period.is_zero() {
            return Err(RateLimitError::invalid(
                ALGORITHM,
                "replenishment_period",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Options for [`ConcurrencyLimiter`](crate::ConcurrencyLimiter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyOptions {
    /// Maximum permits held at once per key.
    pub permit_limit: u32,
    /// How long a slot promoted to a queued waiter stays reserved.
    pub reservation_timeout: Duration,
    /// Retry hint returned with denials.
    pub retry_hint: Duration,
    /// Maximum queued waiters per key.
    pub queue_limit: usize,
    /// Promotion order for queued waiters.
    pub queue_processing_order: QueueProcessingOrder,
}

impl ConcurrencyOptions {
    /// Default reservation hold.
    pub const DEFAULT_RESERVATION_TIMEOUT: Duration = Duration::from_secs(1);
    /// Default retry hint.
    pub const DEFAULT_RETRY_HINT: Duration = Duration::from_millis(100);

    /// Creates options allowing `permit_limit` in-flight requests per key.
    #[must_use]
    pub fn new(permit_limit: u32) -> Self {
        Self {
            permit_limit,
            reservation_timeout: Self::DEFAULT_RESERVATION_TIMEOUT,
            retry_hint: Self::DEFAULT_RETRY_HINT,
            queue_limit: 0,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
        }
    }

    /// Enables a bounded wait queue.
    #[must_use]
    pub fn with_queue(mut self, limit: usize, order: QueueProcessingOrder) -> Self {
        self.queue_limit = limit;
        self.queue_processing_order = order;
        self
    }

    /// Sets how long a promoted slot waits to be claimed.
    #[must_use]
    pub fn with_reservation_timeout(mut self, timeout: Duration) -> Self {
        self.reservation_timeout = timeout;
        self
    }

    /// Checks option ranges.
    pub fn validate(&self) -> RateLimitResult<()> {
        const ALGORITHM: &str = "concurrency";
        if self.permit_limit == 0 {
            return Err(RateLimitError::invalid(ALGORITHM, "permit_limit", "must be greater than zero"));
        }
        if self.reservation_timeout.is_zero() {
            return Err(RateLimitError::invalid(
                ALGORITHM,
                "reservation_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
