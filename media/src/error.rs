//! Error taxonomy for the media pipeline.
//!
//! All authorization failures here are local, final, and non-retriable.
//! They are propagated as typed errors to the immediate caller and logged
//! with identity and resource for audit; none are silently swallowed.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for media pipeline operations.
pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors that can occur in the media pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The caller's identity or grant does not cover the resource.
    #[error("forbidden: '{identity}' may not access '{key}'")]
    Forbidden {
        /// The identity that was rejected.
        identity: String,
        /// The object key that was requested.
        key: String,
    },

    /// The presented grant's validity window has lapsed.
    #[error("upload grant expired at {expired_at}")]
    GrantExpired {
        /// When the grant stopped being valid.
        expired_at: DateTime<Utc>,
    },

    /// No issued grant matches the presented token.
    #[error("unknown upload grant token")]
    GrantNotFound,

    /// The requested TTL exceeds the configured maximum.
    #[error("requested ttl of {requested_seconds}s exceeds maximum of {max_seconds}s")]
    TtlTooLong {
        /// Seconds the caller asked for.
        requested_seconds: u64,
        /// The configured ceiling.
        max_seconds: u64,
    },

    /// No object exists at the requested key.
    #[error("no asset at key '{0}'")]
    NotFound(String),
}
