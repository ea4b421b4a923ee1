//! Sliding window limiter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::RateLimitResult;
use crate::keyed::KeyedState;
use crate::limiter::{Acquisition, Algorithm, RateLimiter};
use crate::options::SlidingWindowOptions;
use crate::queue::Backlog;

/// Requests counted in one segment. `index` numbers segments from the
/// limiter's epoch.
#[derive(Debug, Clone, Copy)]
struct Segment {
    index: u64,
    count: u32,
}

#[derive(Debug)]
struct SlidingState {
    segments: VecDeque<Segment>,
    last_seen: Instant,
    backlog: Backlog,
}

impl SlidingState {
    fn new(now: Instant) -> Self {
        Self {
            segments: VecDeque::new(),
            last_seen: now,
            backlog: Backlog::default(),
        }
    }

    fn total(&self) -> u32 {
        self.segments.iter().map(|s| s.count).sum()
    }

    fn add(&mut self, index: u64, count: u32) {
        match self.segments.back_mut() {
            Some(segment) if segment.index == index => segment.count += count,
            _ => self.segments.push_back(Segment { index, count }),
        }
    }
}

/// Allows `permit_limit` requests per key in any trailing `window`.
///
/// The window is divided into `segments_per_window` segments aligned to the
/// limiter's creation time. A request is counted in the segment containing
/// it; a segment stops counting once its start falls a full window behind.
/// This smooths the boundary bursts a fixed window allows, at the cost of
/// one counter per live segment per key.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    options: SlidingWindowOptions,
    segment_nanos: u128,
    epoch: Instant,
    state: KeyedState<SlidingState>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter after validating `options`.
    pub fn new(options: SlidingWindowOptions) -> RateLimitResult<Self> {
        options.validate()?;
        Ok(Self {
            segment_nanos: options.segment_length().as_nanos(),
            options,
            epoch: Instant::now(),
            state: KeyedState::default(),
        })
    }

    /// The limiter's options.
    #[must_use]
    pub fn options(&self) -> &SlidingWindowOptions {
        &self.options
    }

    fn segment_index(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        u64::try_from(elapsed / self.segment_nanos).unwrap_or(u64::MAX)
    }

    fn segment_start(&self, index: u64) -> Instant {
        let offset = u64::try_from(self.segment_nanos)
            .unwrap_or(u64::MAX)
            .saturating_mul(index);
        self.epoch + Duration::from_nanos(offset)
    }

    /// Drops segments that left the window, then promotes waiters into the
    /// freed capacity.
    fn refresh(&self, state: &mut SlidingState, now: Instant) {
        let current = self.segment_index(now);
        let span = u64::from(self.options.segments_per_window);
        while state
            .segments
            .front()
            .is_some_and(|s| current.saturating_sub(s.index) >= span)
        {
            state.segments.pop_front();
        }
        state.backlog.expire(now);

        let free = self.options.permit_limit.saturating_sub(state.total());
        if free > 0 && state.backlog.has_waiters() {
            let expires_at = now + self.options.segment_length();
            let promoted = state
                .backlog
                .promote(free, self.options.queue_processing_order, expires_at);
            state.add(current, promoted);
        }
    }

    fn retry_after(&self, state: &SlidingState, now: Instant) -> Duration {
        let span = u64::from(self.options.segments_per_window);
        state.segments.front().map_or(self.options.segment_length(), |oldest| {
            self.segment_start(oldest.index + span)
                .saturating_duration_since(now)
        })
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindow
    }

    fn try_acquire(&self, key: &str) -> Acquisition {
        self.state.with(
            key,
            SlidingState::new,
            |state, now| {
                state.last_seen = now;
                self.refresh(state, now);

                if let Some(reservation) = state.backlog.claim(now) {
                    debug!(
                        waited_ms = reservation.waited(now).as_millis() as u64,
                        "claimed queued sliding window permit"
                    );
                    return Acquisition::Acquired;
                }

                if state.total() < self.options.permit_limit {
                    state.add(self.segment_index(now), 1);
                    return Acquisition::Acquired;
                }

                let retry_after = self.retry_after(state, now);
                if state.backlog.try_enqueue(now, self.options.queue_limit) {
                    Acquisition::Queued { retry_after }
                } else {
                    Acquisition::Rejected { retry_after }
                }
            },
        )
    }

    fn replenish(&self) {
        self.state.for_each(|state, now| self.refresh(state, now));
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        self.state.evict(|state, now| {
            self.refresh(state, now);
            state.segments.is_empty()
                && state.backlog.is_empty()
                && now.saturating_duration_since(state.last_seen) >= idle_for
        })
    }

    fn tracked_keys(&self) -> usize {
        self.state.len()
    }
}
