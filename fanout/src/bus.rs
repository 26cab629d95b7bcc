//! The event bus façade publishers talk to.
//!
//! [`EventBus::new`] builds the whole routing topology once from the startup
//! configuration: one topic, queue, subscription, and dead-letter queue per
//! capability. Publishing resolves the capability to its topic and hands the
//! message off; everything downstream (fanout, retry, dead-lettering) is the
//! delivery worker's problem, never the publisher's.
//!
//! # At-Least-Once
//!
//! A successful publish means exactly one message was created and handed to
//! the topic. Consumers may still see the message more than once (visibility
//! timeout redelivery) and must be idempotent. The bus does not dedupe.

use crate::dead_letter::DeadLetterQueue;
use crate::delivery::{DeliveryHandle, DeliveryWorker};
use crate::error::FanoutError;
use crate::queue::{MessageQueue, QueueStats};
use crate::retry::RetryPolicy;
use crate::subscription::{Subscription, SubscriptionRouter};
use crate::topic::Topic;
use bindery_core::capability::Capability;
use bindery_core::config::Config;
use bindery_core::environment::{Clock, SystemClock};
use bindery_core::message::{Message, MessageId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Publisher-facing façade over the fanout topology.
pub struct EventBus {
    topics: RwLock<HashMap<Capability, Arc<Topic>>>,
    router: SubscriptionRouter,
    queues: HashMap<String, Arc<MessageQueue>>,
    dead_letters: HashMap<String, Arc<DeadLetterQueue>>,
    delivery: DeliveryHandle,
    clock: Arc<dyn Clock>,
}

impl EventBus {
    /// Build the routing topology from configuration and spawn the delivery
    /// worker. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if any subscription fails bind-time validation,
    /// which indicates a miswired topology.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: &Config) -> Result<Self, FanoutError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`EventBus::new`] but with an injected clock, for tests that
    /// need to control time.
    ///
    /// # Errors
    ///
    /// Same as [`EventBus::new`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, FanoutError> {
        let policy = RetryPolicy::from_config(&config.retry);
        let delivery = DeliveryWorker::spawn(policy, Arc::clone(&clock));

        let mut topics = HashMap::new();
        let mut routes = HashMap::new();
        let mut queues = HashMap::new();
        let mut dead_letters = HashMap::new();

        for capability in Capability::ALL {
            let identity = bindery_core::identity::TopicIdentity::new(capability.topic_name());
            let queue = Arc::new(MessageQueue::new(
                capability.queue_name(),
                identity.clone(),
                config.visibility_timeout(),
                config.retention(),
                config.queue_capacity,
                Arc::clone(&clock),
            ));
            let dead_letter = Arc::new(DeadLetterQueue::new(
                capability.queue_name(),
                config.dead_letter_capacity,
            ));
            let subscription = Subscription::bind(
                identity,
                Arc::clone(&queue),
                Arc::clone(&dead_letter),
            )?;

            topics.insert(
                capability,
                Arc::new(Topic::with_subscriptions(
                    capability.topic_name(),
                    vec![Arc::clone(&subscription)],
                )),
            );
            routes.insert(capability, subscription);
            queues.insert(capability.queue_name().to_string(), queue);
            dead_letters.insert(capability.queue_name().to_string(), dead_letter);
        }

        tracing::info!(
            environment = %config.environment,
            capabilities = Capability::ALL.len(),
            "event bus routing table built"
        );

        Ok(Self {
            topics: RwLock::new(topics),
            router: SubscriptionRouter::new(routes),
            queues,
            dead_letters,
            delivery,
            clock,
        })
    }

    /// Publish a payload under a capability given by its wire name.
    ///
    /// Fire-and-forget: a successful return means the message was handed to
    /// the topic, not that any consumer has seen it.
    ///
    /// # Errors
    ///
    /// - [`FanoutError::UnknownCapability`] for a name outside the fixed set
    ///   (client error, never retried).
    /// - [`FanoutError::PublishFailed`] if the message could not be handed
    ///   to the topic.
    pub async fn publish(
        &self,
        capability: &str,
        payload: Vec<u8>,
    ) -> Result<MessageId, FanoutError> {
        let capability: Capability = capability.parse()?;
        self.publish_to(capability, payload).await
    }

    /// Publish a payload under an already-parsed capability.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::PublishFailed`] if the topic has been removed
    /// or the delivery worker cannot accept the job.
    pub async fn publish_to(
        &self,
        capability: Capability,
        payload: Vec<u8>,
    ) -> Result<MessageId, FanoutError> {
        let topic = self
            .topics
            .read()
            .await
            .get(&capability)
            .cloned()
            .ok_or_else(|| FanoutError::PublishFailed {
                capability,
                reason: "topic has been removed".to_string(),
            })?;

        let message = Message::new(capability, payload, self.clock.now());
        let message_id = message.id;
        topic.publish(&message, &self.delivery).await?;

        tracing::debug!(
            capability = %capability,
            message_id = %message_id,
            "event published"
        );
        metrics::counter!("fanout.bus.published", "capability" => capability.as_str())
            .increment(1);

        Ok(message_id)
    }

    /// Look up a queue by wire name.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownQueue`] for a name outside the routing
    /// table.
    pub fn queue(&self, name: &str) -> Result<Arc<MessageQueue>, FanoutError> {
        self.queues
            .get(name)
            .cloned()
            .ok_or_else(|| FanoutError::UnknownQueue(name.to_string()))
    }

    /// Look up a queue's dead-letter queue by the queue's wire name.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownQueue`] for a name outside the routing
    /// table.
    pub fn dead_letter(&self, queue_name: &str) -> Result<Arc<DeadLetterQueue>, FanoutError> {
        self.dead_letters
            .get(queue_name)
            .cloned()
            .ok_or_else(|| FanoutError::UnknownQueue(queue_name.to_string()))
    }

    /// Receive from a named queue, blocking up to `max_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownQueue`] for an unknown name. An empty
    /// queue is not an error; the batch is simply empty.
    pub async fn receive(
        &self,
        queue_name: &str,
        max_wait: Duration,
    ) -> Result<Vec<Message>, FanoutError> {
        Ok(self.queue(queue_name)?.receive(max_wait).await)
    }

    /// Acknowledge a message on a named queue. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownQueue`] for an unknown name.
    pub async fn acknowledge(
        &self,
        queue_name: &str,
        message_id: MessageId,
    ) -> Result<(), FanoutError> {
        self.queue(queue_name)?.acknowledge(message_id).await;
        Ok(())
    }

    /// Detach a capability's subscription from its topic and the router.
    ///
    /// Required before [`EventBus::remove_topic`] can succeed.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownQueue`] if nothing is bound for the
    /// capability.
    pub async fn detach(&self, capability: Capability) -> Result<(), FanoutError> {
        let subscription = self
            .router
            .detach(capability)
            .await
            .ok_or_else(|| FanoutError::UnknownQueue(capability.queue_name().to_string()))?;

        if let Some(topic) = self.topics.read().await.get(&capability) {
            topic.unsubscribe(subscription.queue().name()).await;
        }
        Ok(())
    }

    /// Remove a capability's topic.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::SubscriptionStillBound`] if the capability's
    /// subscription has not been detached first.
    pub async fn remove_topic(&self, capability: Capability) -> Result<(), FanoutError> {
        if self.router.is_bound(capability).await {
            return Err(FanoutError::SubscriptionStillBound {
                topic: capability.topic_name().to_string(),
            });
        }
        self.topics.write().await.remove(&capability);
        tracing::info!(topic = capability.topic_name(), "topic removed");
        Ok(())
    }

    /// Per-queue statistics in capability declaration order.
    pub async fn queue_stats(&self) -> Vec<(String, QueueStats)> {
        let mut stats = Vec::with_capacity(Capability::ALL.len());
        for capability in Capability::ALL {
            if let Some(queue) = self.queues.get(capability.queue_name()) {
                stats.push((queue.name().to_string(), queue.stats().await));
            }
        }
        stats
    }

    /// Pending dead-letter counts per queue, in capability declaration order.
    pub async fn dead_letter_counts(&self) -> Vec<(String, usize)> {
        let mut counts = Vec::with_capacity(Capability::ALL.len());
        for capability in Capability::ALL {
            if let Some(dead_letter) = self.dead_letters.get(capability.queue_name()) {
                counts.push((
                    capability.queue_name().to_string(),
                    dead_letter.count_pending().await,
                ));
            }
        }
        counts
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("queues", &self.queues.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn bus() -> EventBus {
        EventBus::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn unknown_capability_is_rejected() {
        let bus = bus();
        let err = bus.publish("refund", b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, FanoutError::UnknownCapability(_)));
    }

    #[tokio::test]
    async fn unknown_queue_is_rejected() {
        let bus = bus();
        let err = bus.queue("book-refund-queue").unwrap_err();
        assert!(matches!(err, FanoutError::UnknownQueue(_)));
    }

    #[tokio::test]
    async fn every_capability_has_a_queue_and_dead_letter() {
        let bus = bus();
        for capability in Capability::ALL {
            assert!(bus.queue(capability.queue_name()).is_ok());
            assert!(bus.dead_letter(capability.queue_name()).is_ok());
        }
    }

    #[tokio::test]
    async fn remove_topic_requires_detach_first() {
        let bus = bus();

        let err = bus.remove_topic(Capability::Sell).await.unwrap_err();
        assert!(matches!(err, FanoutError::SubscriptionStillBound { .. }));

        bus.detach(Capability::Sell).await.unwrap();
        bus.remove_topic(Capability::Sell).await.unwrap();

        // Publishing to the removed topic now fails.
        let err = bus.publish_to(Capability::Sell, b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, FanoutError::PublishFailed { .. }));
    }

    #[tokio::test]
    async fn detach_twice_fails() {
        let bus = bus();
        bus.detach(Capability::List).await.unwrap();
        assert!(bus.detach(Capability::List).await.is_err());
    }

    #[tokio::test]
    async fn queue_stats_cover_all_capabilities() {
        let bus = bus();
        let stats = bus.queue_stats().await;
        assert_eq!(stats.len(), Capability::ALL.len());
        assert_eq!(stats[1].0, "book-checkout-queue");
    }
}
