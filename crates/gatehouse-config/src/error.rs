//! Errors raised while loading or checking gatehouse configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
///
/// Every variant is a startup failure; none of them can occur while
/// requests are being served.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("no configuration file at {path}")]
    FileNotFound {
        /// The path that was tried.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}")]
    ReadError {
        /// The path that was tried.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Only `toml` and `json` are understood.
    #[error("unsupported configuration format '{format}' (expected toml or json)")]
    UnsupportedFormat {
        /// Extension or format name as given.
        format: String,
    },

    /// Malformed TOML, or TOML with unknown keys.
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or JSON with unknown keys.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file was found but could not be applied.
    #[error(".env: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A single field holds an unusable value.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path such as `limiters[2].window_ms`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment override has a malformed key or value.
    #[error("environment override {var}: {reason}")]
    EnvParseError {
        /// Full variable name including the prefix.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Settings that are individually fine but inconsistent together.
    #[error("inconsistent configuration: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Missing file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable file.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Format other than toml or json.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat { format: format.into() }
    }

    /// Bad value at `field`.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Bad environment override.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Cross-field inconsistency.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::file_not_found("/etc/gatehouse/missing.toml");
        assert_eq!(err.to_string(), "no configuration file at /etc/gatehouse/missing.toml");

        let err = ConfigError::invalid_value("limiters[0].permit_limit", "must be greater than zero");
        assert_eq!(err.to_string(), "limiters[0].permit_limit: must be greater than zero");

        let err = ConfigError::env_parse_error("GATEHOUSE__EVICTION__IDLE_TTL_SECS", "expected integer");
        assert!(err.to_string().contains("GATEHOUSE__EVICTION__IDLE_TTL_SECS"));
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = ConfigError::unsupported_format("yaml");
        assert!(err.to_string().contains("'yaml'"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::read_error("/etc/gatehouse.toml", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
