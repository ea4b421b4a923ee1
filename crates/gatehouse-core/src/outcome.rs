//! Request-time decisions.

use std::fmt;
use std::time::Duration;

use http::StatusCode;

use crate::error::GatehouseError;

/// The decision handed back to the HTTP layer for one request stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request may proceed.
    Allowed,
    /// No applicable authentication scheme accepted the request.
    Unauthorized,
    /// An authorization policy rejected the principal.
    Forbidden,
    /// A rate limiter denied the request.
    RateLimited {
        /// How long the caller should wait before retrying.
        retry_after: Duration,
    },
}

impl Outcome {
    /// Returns true for [`Outcome::Allowed`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Status code the HTTP layer should answer with, or `None` to continue.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Allowed => None,
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden => Some(StatusCode::FORBIDDEN),
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
        }
    }

    /// Whole seconds for a `Retry-After` header.
    #[must_use]
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(retry_after_seconds(*retry_after)),
            _ => None,
        }
    }

    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
        }
    }

    /// Converts a denial into the matching error. `Allowed` yields `None`.
    #[must_use]
    pub fn into_error(self) -> Option<GatehouseError> {
        match self {
            Self::Allowed => None,
            Self::Unauthorized => Some(GatehouseError::authentication("authentication required")),
            Self::Forbidden => Some(GatehouseError::authorization(
                "access denied",
                None::<String>,
            )),
            Self::RateLimited { retry_after } => {
                Some(GatehouseError::rate_limited(retry_after_seconds(retry_after)))
            }
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { retry_after } => {
                write!(f, "rate_limited({}s)", retry_after_seconds(*retry_after))
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Rounds a retry hint up to whole seconds, never below one.
#[must_use]
pub fn retry_after_seconds(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    let rounded = if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
    rounded.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_seconds(Duration::from_millis(500)), 1);
        assert_eq!(retry_after_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_seconds(Duration::from_secs(5)), 5);
        assert_eq!(retry_after_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Outcome::Allowed.status_code(), None);
        assert_eq!(Outcome::Unauthorized.status_code(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(Outcome::Forbidden.status_code(), Some(StatusCode::FORBIDDEN));
        assert_eq!(
            Outcome::RateLimited {
                retry_after: Duration::from_secs(5)
            }
            .status_code(),
            Some(StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[test]
    fn test_retry_after_only_for_rate_limited() {
        let limited = Outcome::RateLimited {
            retry_after: Duration::from_millis(4200),
        };
        assert_eq!(limited.retry_after_seconds(), Some(5));
        assert_eq!(Outcome::Forbidden.retry_after_seconds(), None);
    }

    #[test]
    fn test_into_error() {
        assert!(Outcome::Allowed.into_error().is_none());
        let err = Outcome::Unauthorized.into_error().unwrap();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_display() {
        let limited = Outcome::RateLimited {
            retry_after: Duration::from_secs(2),
        };
        assert_eq!(limited.to_string(), "rate_limited(2s)");
        assert_eq!(Outcome::Allowed.to_string(), "allowed");
    }
}
