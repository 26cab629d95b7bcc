//! Subscriptions bind one topic to one queue, with bind-time validation.
//!
//! The authorization predicate ("only this topic may enqueue") lives in the
//! queue and runs on every enqueue; [`Subscription::bind`] validates at bind
//! time that the queue is actually configured for the topic being bound, so
//! a miswired topology fails at startup rather than at delivery time.

use crate::dead_letter::DeadLetterQueue;
use crate::error::FanoutError;
use crate::queue::MessageQueue;
use bindery_core::capability::Capability;
use bindery_core::identity::TopicIdentity;
use bindery_core::message::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A static binding from one topic to one queue.
///
/// Created once when the routing table is built; never re-bound at runtime.
/// Carries the dead-letter queue that receives messages whose delivery
/// retries are exhausted.
#[derive(Debug)]
pub struct Subscription {
    topic: TopicIdentity,
    queue: Arc<MessageQueue>,
    dead_letter: Arc<DeadLetterQueue>,
}

impl Subscription {
    /// Bind a topic to a queue.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::Unauthorized`] if the queue is configured to
    /// accept a different topic's identity, since such a binding would never
    /// be able to deliver.
    pub fn bind(
        topic: TopicIdentity,
        queue: Arc<MessageQueue>,
        dead_letter: Arc<DeadLetterQueue>,
    ) -> Result<Arc<Self>, FanoutError> {
        if *queue.allowed_source() != topic {
            return Err(FanoutError::Unauthorized {
                queue: queue.name().to_string(),
                presented: topic,
            });
        }

        tracing::info!(
            topic = %topic,
            queue = queue.name(),
            "subscription bound"
        );

        Ok(Arc::new(Self {
            topic,
            queue,
            dead_letter,
        }))
    }

    /// The bound topic's identity.
    #[must_use]
    pub const fn topic(&self) -> &TopicIdentity {
        &self.topic
    }

    /// The queue this subscription delivers into.
    #[must_use]
    pub const fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// The dead-letter queue for exhausted deliveries.
    #[must_use]
    pub const fn dead_letter(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letter
    }

    /// Deliver a message into the bound queue under the topic's identity.
    ///
    /// # Errors
    ///
    /// Propagates the queue's enqueue errors; [`FanoutError::QueueFull`] is
    /// transient and retried by the delivery worker.
    pub async fn deliver(&self, message: Message) -> Result<(), FanoutError> {
        self.queue.enqueue(&self.topic, message).await
    }
}

/// The routing table from capability to bound subscription.
///
/// Built once at startup from the full capability set; the only mutation
/// offered is [`SubscriptionRouter::detach`], which is the required first
/// step of tearing a topic down.
#[derive(Debug)]
pub struct SubscriptionRouter {
    routes: RwLock<HashMap<Capability, Arc<Subscription>>>,
}

impl SubscriptionRouter {
    /// Build the router from its complete set of bindings.
    #[must_use]
    pub fn new(routes: HashMap<Capability, Arc<Subscription>>) -> Self {
        Self {
            routes: RwLock::new(routes),
        }
    }

    /// The subscription bound for a capability, if still attached.
    pub async fn route(&self, capability: Capability) -> Option<Arc<Subscription>> {
        self.routes.read().await.get(&capability).cloned()
    }

    /// Whether a capability still has an attached subscription.
    pub async fn is_bound(&self, capability: Capability) -> bool {
        self.routes.read().await.contains_key(&capability)
    }

    /// Detach a capability's subscription, returning it.
    ///
    /// Detaching is a prerequisite for removing the topic or queue; see
    /// [`FanoutError::SubscriptionStillBound`].
    pub async fn detach(&self, capability: Capability) -> Option<Arc<Subscription>> {
        let detached = self.routes.write().await.remove(&capability);
        if detached.is_some() {
            tracing::info!(capability = %capability, "subscription detached");
        }
        detached
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bindery_core::environment::SystemClock;
    use std::time::Duration;

    fn queue_for(topic: &str) -> Arc<MessageQueue> {
        Arc::new(MessageQueue::new(
            "book-buy-queue",
            TopicIdentity::new(topic),
            Duration::from_secs(30),
            Duration::from_secs(3600),
            None,
            Arc::new(SystemClock),
        ))
    }

    fn dlq() -> Arc<DeadLetterQueue> {
        Arc::new(DeadLetterQueue::new("book-buy-queue", 10))
    }

    #[test]
    fn binding_matching_identities_succeeds() {
        let subscription = Subscription::bind(
            TopicIdentity::new("book-buy-topic"),
            queue_for("book-buy-topic"),
            dlq(),
        );
        assert!(subscription.is_ok());
    }

    #[test]
    fn binding_mismatched_identities_fails_at_bind_time() {
        let err = Subscription::bind(
            TopicIdentity::new("book-sell-topic"),
            queue_for("book-buy-topic"),
            dlq(),
        )
        .unwrap_err();
        assert!(matches!(err, FanoutError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn detach_removes_the_route() {
        let subscription = Subscription::bind(
            TopicIdentity::new("book-buy-topic"),
            queue_for("book-buy-topic"),
            dlq(),
        )
        .unwrap();

        let router = SubscriptionRouter::new(HashMap::from([(Capability::Buy, subscription)]));
        assert!(router.is_bound(Capability::Buy).await);

        assert!(router.detach(Capability::Buy).await.is_some());
        assert!(!router.is_bound(Capability::Buy).await);
        assert!(router.detach(Capability::Buy).await.is_none());
    }
}
