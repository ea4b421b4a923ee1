//! Rate limiters for gatehouse.
//!
//! Four interchangeable strategies implement [`RateLimiter`]:
//!
//! | Limiter | Tracks per key | Denial retry hint |
//! |---------|----------------|-------------------|
//! | [`FixedWindowLimiter`] | count, window start | time left in the window |
//! | [`SlidingWindowLimiter`] | per-segment counts | until the oldest segment leaves the window |
//! | [`TokenBucketLimiter`] | tokens, last refill | time for one token |
//! | [`ConcurrencyLimiter`] | permits held | fixed hint |
//!
//! Every limiter keeps independent per-key state behind one lock per
//! instance, optionally queues denied requests in a bounded per-key wait
//! queue, and can evict keys that have gone idle.
//!
//! Limiters are registered by name in a [`LimiterRegistry`]; a request takes
//! permits from several limiters at once through a [`RateLimitLease`], which
//! returns them when dropped.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gatehouse_ratelimit::{ConcurrencyOptions, LimiterRegistry, RateLimitLease, TokenBucketOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gatehouse_ratelimit::RateLimitError> {
//! let mut registry = LimiterRegistry::new();
//! registry.add_token_bucket("burst", TokenBucketOptions::new(5, 1, Duration::from_secs(1)))?;
//! registry.add_concurrency("uploads", ConcurrencyOptions::new(2))?;
//!
//! let limiters = ["burst", "uploads"].iter().filter_map(|name| registry.get(name).cloned());
//! match RateLimitLease::acquire(limiters, "10.0.0.1") {
//!     Ok(lease) => {
//!         // handle the request; permits are returned when `lease` drops
//!         drop(lease);
//!     }
//!     Err(denied) => println!("retry in {:?}", denied.retry_after),
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-ratelimit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod background;
mod concurrency;
mod error;
mod fixed_window;
mod keyed;
mod limiter;
mod options;
mod queue;
mod registry;
mod sliding_window;
mod token_bucket;

pub use background::{spawn_sweeper, BackgroundTask};
pub use concurrency::ConcurrencyLimiter;
pub use error::{RateLimitError, RateLimitResult};
pub use fixed_window::FixedWindowLimiter;
pub use limiter::{Acquisition, Algorithm, RateLimiter};
pub use options::{
    ConcurrencyOptions, FixedWindowOptions, QueueProcessingOrder, SlidingWindowOptions, TokenBucketOptions,
};
pub use registry::{LimiterRegistry, RateLimitDenied, RateLimitLease, RegisteredLimiter};
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;
