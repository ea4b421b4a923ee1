//! Per-key wait queue shared by every algorithm.
//!
//! A denied request that finds room in the queue becomes a *waiter*. When
//! capacity returns, waiters are promoted into *reservations* in
//! [`QueueProcessingOrder`] order; promotion consumes the capacity on the
//! waiter's behalf. The next acquire for the key claims a reservation.
//! Unclaimed reservations expire after an algorithm-specific hold period.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::options::QueueProcessingOrder;

/// Capacity held for a promoted waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub(crate) enqueued_at: Instant,
    pub(crate) expires_at: Instant,
}

impl Reservation {
    /// How long the waiter spent queued before promotion was claimed.
    pub(crate) fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Backlog {
    waiters: VecDeque<Instant>,
    reservations: VecDeque<Reservation>,
}

impl Backlog {
    /// Queues a waiter if there is room. Returns false when full or disabled.
    pub(crate) fn try_enqueue(&mut self, now: Instant, limit: usize) -> bool {
        if self.waiters.len() >= limit {
            return false;
        }
        self.waiters.push_back(now);
        true
    }

    /// Promotes up to `max` waiters into reservations held until `expires_at`.
    ///
    /// Returns how many were promoted; the caller must account for the
    /// capacity they consumed.
    pub(crate) fn promote(&mut self, max: u32, order: QueueProcessingOrder, expires_at: Instant) -> u32 {
        let mut promoted = 0;
        while promoted < max {
            let next = match order {
                QueueProcessingOrder::OldestFirst => self.waiters.pop_front(),
                QueueProcessingOrder::NewestFirst => self.waiters.pop_back(),
            };
            let Some(enqueued_at) = next else { break };
            self.reservations.push_back(Reservation {
                enqueued_at,
                expires_at,
            });
            promoted += 1;
        }
        promoted
    }

    /// Claims the earliest-expiring live reservation.
    pub(crate) fn claim(&mut self, now: Instant) -> Option<Reservation> {
        self.expire(now);
        self.reservations.pop_front()
    }

    /// Drops reservations that expired at or before `now`. Returns the count.
    pub(crate) fn expire(&mut self, now: Instant) -> u32 {
        let mut expired = 0;
        while self
            .reservations
            .front()
            .is_some_and(|r| r.expires_at <= now)
        {
            self.reservations.pop_front();
            expired += 1;
        }
        expired
    }

    pub(crate) fn has_waiters(&self) -> bool {
        !self.waiters.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        self.waiters.len()
    }

    #[cfg(test)]
    pub(crate) fn reserved(&self) -> usize {
        self.reservations.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty() && self.reservations.is_empty()
    }
}
