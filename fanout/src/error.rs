//! Error taxonomy for the fanout layer.

use bindery_core::capability::{Capability, UnknownCapability};
use bindery_core::identity::TopicIdentity;
use thiserror::Error;

/// Errors that can occur during fanout operations.
///
/// Authorization failures ([`FanoutError::Unauthorized`]) are final and
/// non-retriable. Transient delivery failures are retried by the delivery
/// worker and dead-lettered once the retry budget is exhausted; see
/// [`FanoutError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FanoutError {
    /// The requested capability is not one of the fixed set.
    #[error(transparent)]
    UnknownCapability(#[from] UnknownCapability),

    /// No queue with the given name exists in the routing table.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// An enqueue presented a source identity other than the bound topic's.
    #[error("unauthorized enqueue on '{queue}': source '{presented}' is not the bound topic")]
    Unauthorized {
        /// The queue that rejected the enqueue.
        queue: String,
        /// The identity the caller presented.
        presented: TopicIdentity,
    },

    /// The queue's ready buffer is at capacity. Transient; retried.
    #[error("queue '{queue}' is full")]
    QueueFull {
        /// The queue that is full.
        queue: String,
    },

    /// Delivery to a subscription failed.
    #[error("delivery to '{queue}' failed: {reason}")]
    DeliveryFailed {
        /// The destination queue.
        queue: String,
        /// Why delivery failed.
        reason: String,
    },

    /// A topic or queue cannot be removed while a subscription binds it.
    #[error("topic '{topic}' still has a bound subscription")]
    SubscriptionStillBound {
        /// The topic still referenced.
        topic: String,
    },

    /// The publish could not be handed to the topic.
    #[error("publish failed for capability '{capability}': {reason}")]
    PublishFailed {
        /// The capability being published.
        capability: Capability,
        /// Why the publish failed.
        reason: String,
    },
}

impl FanoutError {
    /// Whether the delivery worker should retry after this error.
    ///
    /// Authorization and topology errors are final; only congestion-shaped
    /// failures are worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. } | Self::DeliveryFailed { .. }
        )
    }
}
