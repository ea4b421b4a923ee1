//! Layered configuration loading.
//!
//! [`ConfigLoader`] applies defaults, then a file or string, then
//! environment overrides, and validates the result.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use gatehouse_policy::UnknownLimiterPolicy;

use crate::{ConfigError, GatehouseConfig};

/// Configuration loader.
///
/// Later layers override earlier ones:
/// 1. defaults (or a preset)
/// 2. a TOML or JSON file or string
/// 3. environment variables for scalar settings
///
/// Route, group and limiter lists only come from files; the environment
/// can override defaults, resolver, eviction and telemetry settings.
///
/// # Example
///
/// ```no_run
/// use gatehouse_config::ConfigLoader;
///
/// # fn main() -> Result<(), gatehouse_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_file("gatehouse.toml")?
///     .with_env_prefix("GATEHOUSE")
///     .load()?;
/// # let _ = config;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatehouseConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatehouseConfig::default(),
            env_prefix: None,
        }
    }

    /// Resets to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = GatehouseConfig::default();
        self
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatehouseConfig::development();
        self
    }

    /// Starts from the production preset.
    ///
    /// ```
    /// use gatehouse_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_production().load().unwrap();
    /// assert!(config.telemetry.logging.json_format);
    /// ```
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatehouseConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file, chosen by extension.
    ///
    /// A file replaces the whole configuration; sections it omits take
    /// their defaults, not the preset's.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        self.config = match extension.as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => return Err(ConfigError::unsupported_format(other.unwrap_or_default())),
        };

        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` (`toml` or `json`).
    ///
    /// ```
    /// use gatehouse_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [defaults]
    ///     scheme = "bearer"
    ///
    ///     [[routes]]
    ///     methods = ["GET"]
    ///     path = "/health"
    ///     allow_anonymous = true
    /// "#;
    ///
    /// let config = ConfigLoader::new().with_string(toml, "toml").unwrap().load().unwrap();
    /// assert_eq!(config.defaults.scheme.as_deref(), Some("bearer"));
    /// assert_eq!(config.routes.len(), 1);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::unsupported_format(format)),
        };
        Ok(self)
    }

    /// Reads `PREFIX__SECTION__KEY` environment overrides at load time.
    ///
    /// - `GATEHOUSE__DEFAULTS__SCHEME=bearer`
    /// - `GATEHOUSE__RESOLVER__UNKNOWN_LIMITER=fail_closed`
    /// - `GATEHOUSE__TELEMETRY__LOGGING__LEVEL=debug`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<GatehouseConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> GatehouseConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars().filter(|(k, _)| k.starts_with(prefix)).collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["DEFAULTS", "SCHEME"] => config.defaults.scheme = optional(value),
            ["DEFAULTS", "POLICY"] => config.defaults.policy = optional(value),
            ["DEFAULTS", "LIMITER"] => config.defaults.limiter = optional(value),

            ["RESOLVER", "UNKNOWN_LIMITER"] => {
                config.resolver.unknown_limiter = match value.to_lowercase().as_str() {
                    "fail_open" => UnknownLimiterPolicy::FailOpen,
                    "fail_closed" => UnknownLimiterPolicy::FailClosed,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'fail_open' or 'fail_closed'")),
                };
            }

            ["EVICTION", "ENABLED"] => config.eviction.enabled = parse_flag(key, value)?,
            ["EVICTION", "IDLE_TTL_SECS"] => config.eviction.idle_ttl_secs = parse_number(key, value)?,
            ["EVICTION", "SWEEP_INTERVAL_SECS"] => {
                config.eviction.sweep_interval_secs = parse_number(key, value)?;
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => config.telemetry.logging.enabled = parse_flag(key, value)?,
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "JSON_FORMAT"] => {
                config.telemetry.logging.json_format = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => config.telemetry.metrics.enabled = parse_flag(key, value)?,
            ["TELEMETRY", "METRICS", "LISTEN_ADDR"] => config.telemetry.metrics.listen_addr = optional(value),

            _ => {}
        }

        Ok(())
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
