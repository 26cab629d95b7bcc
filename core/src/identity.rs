//! Identity types for authorization checks.
//!
//! Three distinct identities flow through the system and are deliberately
//! not interchangeable:
//!
//! - [`TopicIdentity`]: the published identity of a topic, checked on every
//!   queue enqueue (only the bound topic may enqueue).
//! - [`Principal`]: a caller of the upload authorizer (the backend service,
//!   or a test impersonating one).
//! - [`TrustIdentity`]: the fixed identity the delivery front end presents
//!   when reading the asset store. No other identity may read.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The published identity of a topic.
///
/// Queues are configured with the one `TopicIdentity` allowed to enqueue;
/// an enqueue presenting any other identity fails `Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicIdentity(String);

impl TopicIdentity {
    /// Create a topic identity from its stable topic name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A caller requesting upload grants.
///
/// Principals hold pre-provisioned entitlements; the authorizer can only
/// narrow what a principal already has, never widen it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal by name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The principal name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed trust identity of the delivery front end.
///
/// The asset store compares this by value on every read; equality is the
/// whole authorization check, so the value must be resolved exactly once at
/// pipeline assembly and never minted ad hoc.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustIdentity(String);

impl TrustIdentity {
    /// Create a trust identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_identities_compare_by_value() {
        let a = TopicIdentity::new("book-buy-topic");
        let b = TopicIdentity::new("book-buy-topic");
        let c = TopicIdentity::new("book-sell-topic");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn identity_types_display_their_names() {
        assert_eq!(Principal::new("backend").to_string(), "backend");
        assert_eq!(
            TrustIdentity::new("cover-delivery").to_string(),
            "cover-delivery"
        );
    }
}
