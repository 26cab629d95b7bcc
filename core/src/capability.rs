//! Domain capabilities routed by the fanout layer.
//!
//! A [`Capability`] names one of the fixed bookstore event types. The set is
//! closed: adding a capability means provisioning a matching topic, queue,
//! and subscription, so the enum is the single source of truth for the
//! routing topology.
//!
//! # Naming Convention
//!
//! Each capability owns a topic and a queue with stable wire names:
//!
//! - `checkout` → topic `book-checkout-topic`, queue `book-checkout-queue`
//! - `sell` → topic `book-sell-topic`, queue `book-sell-queue`
//!
//! # Example
//!
//! ```
//! use bindery_core::capability::Capability;
//!
//! let capability: Capability = "checkout".parse()?;
//! assert_eq!(capability, Capability::Checkout);
//! assert_eq!(capability.queue_name(), "book-checkout-queue");
//! # Ok::<(), bindery_core::capability::UnknownCapability>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a capability string is not one of the fixed set.
///
/// This is a client error: reject immediately, never retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

/// A bookstore domain event type.
///
/// The set is fixed by design. Every capability is wired to exactly one
/// topic + queue + subscription triplet at startup; there is no runtime
/// registration of new capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// A book was listed in the catalog.
    List,
    /// A customer checked out a cart.
    Checkout,
    /// A book was bought (purchase completed).
    Buy,
    /// A book was returned.
    Return,
    /// A book was sold back to the store.
    Sell,
}

impl Capability {
    /// All capabilities, in declaration order.
    ///
    /// Used to build the routing table at startup: one topic, queue, and
    /// subscription per entry.
    pub const ALL: [Self; 5] = [
        Self::List,
        Self::Checkout,
        Self::Buy,
        Self::Return,
        Self::Sell,
    ];

    /// The wire name of this capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Checkout => "checkout",
            Self::Buy => "buy",
            Self::Return => "return",
            Self::Sell => "sell",
        }
    }

    /// The name of the topic this capability publishes to.
    #[must_use]
    pub const fn topic_name(self) -> &'static str {
        match self {
            Self::List => "book-list-topic",
            Self::Checkout => "book-checkout-topic",
            Self::Buy => "book-buy-topic",
            Self::Return => "book-return-topic",
            Self::Sell => "book-sell-topic",
        }
    }

    /// The name of the queue bound to this capability's topic.
    #[must_use]
    pub const fn queue_name(self) -> &'static str {
        match self {
            Self::List => "book-list-queue",
            Self::Checkout => "book-checkout-queue",
            Self::Buy => "book-buy-queue",
            Self::Return => "book-return-queue",
            Self::Sell => "book-sell-queue",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Self::List),
            "checkout" => Ok(Self::Checkout),
            "buy" => Ok(Self::Buy),
            "return" => Ok(Self::Return),
            "sell" => Ok(Self::Sell),
            other => Err(UnknownCapability(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_capabilities() {
        for capability in Capability::ALL {
            let parsed: Capability = capability.as_str().parse().unwrap();
            assert_eq!(parsed, capability);
        }
    }

    #[test]
    fn parse_unknown_capability_fails() {
        let err = "refund".parse::<Capability>().unwrap_err();
        assert_eq!(err, UnknownCapability("refund".to_string()));
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!("Checkout".parse::<Capability>().is_err());
    }

    #[test]
    fn wire_names_follow_convention() {
        for capability in Capability::ALL {
            let name = capability.as_str();
            assert_eq!(capability.topic_name(), format!("book-{name}-topic"));
            assert_eq!(capability.queue_name(), format!("book-{name}-queue"));
        }
    }

    #[test]
    fn serde_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&Capability::Checkout).unwrap();
        assert_eq!(json, "\"checkout\"");
        let back: Capability = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(back, Capability::Sell);
    }
}
