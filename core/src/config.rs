//! Startup configuration for the fanout and media pipelines.
//!
//! Routing topology limits, visibility timeouts, grant TTL bounds, and the
//! CORS allow-list are read once at startup into a [`Config`] and never
//! mutated afterwards. Components receive the values they need at
//! construction; there is no global registry.
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BINDERY_ENVIRONMENT` | `development` |
//! | `BINDERY_ALLOWED_ORIGINS` | `*` (comma-separated list) |
//! | `BINDERY_MAX_GRANT_TTL_SECS` | `900` |
//! | `BINDERY_VISIBILITY_TIMEOUT_SECS` | `30` |
//! | `BINDERY_MAX_VISIBILITY_TIMEOUT_SECS` | `43200` |
//! | `BINDERY_RETENTION_SECS` | `345600` (4 days) |
//! | `BINDERY_QUEUE_CAPACITY` | unbounded |
//! | `BINDERY_DLQ_CAPACITY` | `1000` |
//! | `BINDERY_ASSET_CACHE_TTL_SECS` | `300` |
//! | `BINDERY_RETRY_MAX_ATTEMPTS` | `5` |
//! | `BINDERY_RETRY_INITIAL_DELAY_MS` | `100` |
//! | `BINDERY_RETRY_MAX_DELAY_MS` | `30000` |
//! | `BINDERY_RETRY_MULTIPLIER` | `2.0` |

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// The variable that failed to parse.
        key: String,
        /// The offending value.
        value: String,
    },

    /// A configured value violated a cross-field constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Exponential backoff knobs for the delivery worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum delivery attempts before dead-lettering (initial try included).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on the backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Immutable startup configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment name (e.g. `development`, `production`).
    pub environment: String,

    /// Browser origins allowed to upload and read covers. `*` allows any.
    pub allowed_origins: Vec<String>,

    /// Upper bound on requested grant TTLs, in seconds.
    pub max_grant_ttl_seconds: u64,

    /// Visibility timeout applied to received messages, in seconds.
    pub visibility_timeout_seconds: u64,

    /// Hard cap on the per-queue visibility timeout, in seconds.
    pub max_visibility_timeout_seconds: u64,

    /// How long unacknowledged messages are retained, in seconds.
    pub retention_seconds: u64,

    /// Optional bound on ready messages per queue. `None` is unbounded.
    pub queue_capacity: Option<usize>,

    /// Maximum entries retained per dead-letter queue.
    pub dead_letter_capacity: usize,

    /// How long the delivery front end caches assets, in seconds.
    pub asset_cache_ttl_seconds: u64,

    /// Delivery retry policy.
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            allowed_origins: vec!["*".to_string()],
            max_grant_ttl_seconds: 900,
            visibility_timeout_seconds: 30,
            max_visibility_timeout_seconds: 43_200,
            retention_seconds: 345_600,
            queue_capacity: None,
            dead_letter_capacity: 1000,
            asset_cache_ttl_seconds: 300,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// Unset variables fall back to defaults; set variables must parse.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable fails to parse,
    /// or [`ConfigError::Invalid`] if the result fails [`Config::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an explicit variable lookup.
    ///
    /// This is the testable seam behind [`Config::from_env`]: tests pass a
    /// closure instead of mutating the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            environment: lookup("BINDERY_ENVIRONMENT").unwrap_or(defaults.environment),
            allowed_origins: match lookup("BINDERY_ALLOWED_ORIGINS") {
                Some(raw) => raw
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
                None => defaults.allowed_origins,
            },
            max_grant_ttl_seconds: parse_or(
                &lookup,
                "BINDERY_MAX_GRANT_TTL_SECS",
                defaults.max_grant_ttl_seconds,
            )?,
            visibility_timeout_seconds: parse_or(
                &lookup,
                "BINDERY_VISIBILITY_TIMEOUT_SECS",
                defaults.visibility_timeout_seconds,
            )?,
            max_visibility_timeout_seconds: parse_or(
                &lookup,
                "BINDERY_MAX_VISIBILITY_TIMEOUT_SECS",
                defaults.max_visibility_timeout_seconds,
            )?,
            retention_seconds: parse_or(
                &lookup,
                "BINDERY_RETENTION_SECS",
                defaults.retention_seconds,
            )?,
            queue_capacity: match lookup("BINDERY_QUEUE_CAPACITY") {
                Some(raw) => Some(parse_value("BINDERY_QUEUE_CAPACITY", &raw)?),
                None => defaults.queue_capacity,
            },
            dead_letter_capacity: parse_or(
                &lookup,
                "BINDERY_DLQ_CAPACITY",
                defaults.dead_letter_capacity,
            )?,
            asset_cache_ttl_seconds: parse_or(
                &lookup,
                "BINDERY_ASSET_CACHE_TTL_SECS",
                defaults.asset_cache_ttl_seconds,
            )?,
            retry: RetryConfig {
                max_attempts: parse_or(
                    &lookup,
                    "BINDERY_RETRY_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )?,
                initial_delay_ms: parse_or(
                    &lookup,
                    "BINDERY_RETRY_INITIAL_DELAY_MS",
                    defaults.retry.initial_delay_ms,
                )?,
                max_delay_ms: parse_or(
                    &lookup,
                    "BINDERY_RETRY_MAX_DELAY_MS",
                    defaults.retry.max_delay_ms,
                )?,
                multiplier: parse_or(
                    &lookup,
                    "BINDERY_RETRY_MULTIPLIER",
                    defaults.retry.multiplier,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the visibility timeout exceeds
    /// its configured cap, or if the retry policy can never attempt delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.visibility_timeout_seconds > self.max_visibility_timeout_seconds {
            return Err(ConfigError::Invalid(format!(
                "visibility timeout {}s exceeds maximum {}s",
                self.visibility_timeout_seconds, self.max_visibility_timeout_seconds
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The maximum grant TTL as a duration.
    #[must_use]
    pub const fn max_grant_ttl(&self) -> Duration {
        Duration::from_secs(self.max_grant_ttl_seconds)
    }

    /// The per-queue visibility timeout as a duration.
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    /// The message retention window as a duration.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    /// The asset cache TTL as a duration.
    #[must_use]
    pub const fn asset_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.asset_cache_ttl_seconds)
    }
}

fn parse_or<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
