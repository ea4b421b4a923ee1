//! Error types for Gatehouse.
//!
//! [`GatehouseError`] covers configuration-time failures (which stop startup)
//! and the request-time denials a host may want to surface as HTTP errors.
//! Request-time decisions themselves are [`Outcome`](crate::Outcome) values,
//! never errors.

use std::fmt;

use gatehouse_ratelimit::RateLimitError;
use gatehouse_router::RouteError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`GatehouseError`].
pub type GatehouseResult<T> = Result<T, GatehouseError>;

/// The kind of named policy a route can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// An authentication scheme.
    Scheme,
    /// An authorization policy.
    Policy,
    /// A rate limiter.
    Limiter,
}

impl PolicyKind {
    /// Returns a lowercase label suitable for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheme => "scheme",
            Self::Policy => "policy",
            Self::Limiter => "limiter",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scheme => "authentication scheme",
            Self::Policy => "authorization policy",
            Self::Limiter => "rate limiter",
        };
        f.write_str(label)
    }
}

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid or contradictory security configuration.
    Configuration,
    /// Missing or invalid credentials.
    Authentication,
    /// Permission denied.
    Authorization,
    /// Rate limit exceeded.
    RateLimited,
    /// Internal failures.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Configuration | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Standard error type for Gatehouse.
///
/// # Example
///
/// ```
/// use gatehouse_core::{ErrorCategory, GatehouseError};
///
/// let err = GatehouseError::configuration_conflict(
///     "GET /health is allow-anonymous and cannot have authentication schemes",
/// );
/// assert_eq!(err.category(), ErrorCategory::Configuration);
/// ```
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// Two pieces of configuration contradict each other.
    #[error("Configuration conflict: {message}")]
    ConfigurationConflict {
        /// Human-readable error message.
        message: String,
    },

    /// A named scheme, policy or limiter was registered twice.
    #[error("Duplicate registration: {kind} '{name}' is already registered")]
    DuplicateRegistration {
        /// What was registered.
        kind: PolicyKind,
        /// The duplicated name.
        name: String,
    },

    /// A route declaration is malformed.
    #[error("Invalid route declaration: {message}")]
    InvalidDeclaration {
        /// Human-readable error message.
        message: String,
    },

    /// A route template could not be registered.
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    /// Limiter options were rejected.
    #[error("Invalid rate limiter: {0}")]
    InvalidLimiter(#[from] RateLimitError),

    /// Loaded configuration could not be applied.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Human-readable error message.
        message: String,
        /// The loader or schema error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A route references a name nothing was registered under.
    #[error("Unknown {kind} '{name}'")]
    UnknownPolicyReference {
        /// What kind of name was referenced.
        kind: PolicyKind,
        /// The unresolved name.
        name: String,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization denied.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
        /// The policy that denied the request.
        policy: Option<String>,
    },

    /// Rate limit exceeded.
    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Whole seconds until a retry may succeed.
        retry_after_seconds: u64,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatehouseError {
    /// Creates a configuration conflict error.
    #[must_use]
    pub fn configuration_conflict(message: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            message: message.into(),
        }
    }

    /// Creates a duplicate registration error.
    #[must_use]
    pub fn duplicate(kind: PolicyKind, name: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid declaration error.
    #[must_use]
    pub fn invalid_declaration(message: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error wrapping `source`.
    pub fn invalid_configuration(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an unknown reference error.
    #[must_use]
    pub fn unknown_reference(kind: PolicyKind, name: impl Into<String>) -> Self {
        Self::UnknownPolicyReference {
            kind,
            name: name.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error naming the denying policy.
    #[must_use]
    pub fn authorization(message: impl Into<String>, policy: Option<impl Into<String>>) -> Self {
        Self::Authorization {
            message: message.into(),
            policy: policy.map(Into::into),
        }
    }

    /// Creates a rate limited error.
    #[must_use]
    pub const fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited {
            retry_after_seconds,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationConflict { .. }
            | Self::DuplicateRegistration { .. }
            | Self::InvalidDeclaration { .. }
            | Self::InvalidRoute(_)
            | Self::InvalidLimiter(_)
            | Self::InvalidConfiguration { .. }
            | Self::UnknownPolicyReference { .. } => ErrorCategory::Configuration,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns true for errors that must stop startup.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationConflict { .. } => "CONFIGURATION_CONFLICT",
            Self::DuplicateRegistration { .. } => "DUPLICATE_REGISTRATION",
            Self::InvalidDeclaration { .. } => "INVALID_DECLARATION",
            Self::InvalidRoute(_) => "INVALID_ROUTE",
            Self::InvalidLimiter(_) => "INVALID_LIMITER",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::UnknownPolicyReference { .. } => "UNKNOWN_POLICY_REFERENCE",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DuplicateRegistration { kind, name }
            | Self::UnknownPolicyReference { kind, name } => Some(serde_json::json!({
                "kind": kind,
                "name": name
            })),
            Self::Authorization {
                policy: Some(policy),
                ..
            } => Some(serde_json::json!({ "policy": policy })),
            Self::RateLimited {
                retry_after_seconds,
            } => Some(serde_json::json!({
                "retry_after_seconds": retry_after_seconds
            })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_conflict() {
        let error = GatehouseError::configuration_conflict("GET /a is allow-anonymous");
        assert_eq!(error.category(), ErrorCategory::Configuration);
        assert!(error.is_configuration());
        assert!(error.to_string().contains("GET /a"));
    }

    #[test]
    fn test_duplicate_registration_message() {
        let error = GatehouseError::duplicate(PolicyKind::Scheme, "jwt");
        assert_eq!(
            error.to_string(),
            "Duplicate registration: authentication scheme 'jwt' is already registered"
        );
    }

    #[test]
    fn test_route_error_converts() {
        let error: GatehouseError = RouteError::EmptyPath.into();
        assert!(matches!(error, GatehouseError::InvalidRoute(_)));
        assert!(error.is_configuration());
    }

    #[test]
    fn test_invalid_configuration_keeps_source() {
        let error = GatehouseError::invalid_configuration("bad limiter", anyhow::anyhow!("zero window"));
        assert!(error.is_configuration());
        assert_eq!(error.to_envelope(None).error.code, "INVALID_CONFIGURATION");
        assert_eq!(std::error::Error::source(&error).unwrap().to_string(), "zero window");
    }

    #[test]
    fn test_authorization_error() {
        let error = GatehouseError::authorization("denied", Some("admins"));
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);

        let envelope = error.to_envelope(None);
        assert_eq!(envelope.error.details.unwrap()["policy"], "admins");
    }

    #[test]
    fn test_rate_limited() {
        let error = GatehouseError::rate_limited(5);
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let envelope = error.to_envelope(None);
        let details = envelope.error.details.unwrap();
        assert_eq!(details["retry_after_seconds"], 5);
    }

    #[test]
    fn test_internal_with_source() {
        let error = GatehouseError::internal_with_source("boom", anyhow::anyhow!("inner"));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_envelope_serialization() {
        let error = GatehouseError::authentication("missing bearer token");
        let envelope = error.to_envelope(Some("req-456"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"AUTHENTICATION_ERROR\""));
        assert!(json.contains("\"request_id\":\"req-456\""));
        assert!(json.contains("\"category\":\"authentication\""));
    }

    #[test]
    fn test_unknown_reference_details() {
        let error = GatehouseError::unknown_reference(PolicyKind::Limiter, "burst");
        let details = error.to_envelope(None).error.details.unwrap();
        assert_eq!(details["kind"], "limiter");
        assert_eq!(details["name"], "burst");
    }

    #[test]
    fn test_all_error_categories_have_status_codes() {
        let categories = [
            ErrorCategory::Configuration,
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::RateLimited,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }
}
