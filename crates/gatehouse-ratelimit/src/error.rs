//! Error types for limiter construction and registration.

use thiserror::Error;

/// Result type alias using [`RateLimitError`].
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Errors raised while building or registering limiters.
///
/// Acquisition never fails with an error; denials are
/// [`Acquisition`](crate::Acquisition) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// An option value is out of range.
    #[error("invalid {algorithm} option '{option}': {reason}")]
    InvalidOption {
        /// Algorithm whose options were rejected.
        algorithm: &'static str,
        /// Name of the offending option.
        option: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Limiter names must be non-empty.
    #[error("limiter name must not be empty")]
    EmptyName,

    /// A limiter with this name is already registered.
    #[error("limiter '{0}' is already registered")]
    DuplicateLimiter(String),
}

impl RateLimitError {
    pub(crate) const fn invalid(
        algorithm: &'static str,
        option: &'static str,
        reason: &'static str,
    ) -> Self {
        Self::InvalidOption {
            algorithm,
            option,
            reason,
        }
    }
}
