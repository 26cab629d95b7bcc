//! Named fanout points, one per capability.
//!
//! A topic broadcasts every published message to all of its bound
//! subscriptions. In this topology each topic carries exactly one
//! subscription, but fanout stays generalizable to N subscribers: every
//! delivery is dispatched as an independent job on the delivery worker, so
//! one slow or failing subscriber never blocks or fails another.

use crate::delivery::{DeliveryHandle, DeliveryJob};
use crate::error::FanoutError;
use crate::subscription::Subscription;
use bindery_core::identity::TopicIdentity;
use bindery_core::message::Message;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A named fanout point with an immutable published identity.
#[derive(Debug)]
pub struct Topic {
    name: String,
    identity: TopicIdentity,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl Topic {
    /// Create a topic with no subscriptions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_subscriptions(name, Vec::new())
    }

    /// Create a topic with its initial subscriptions.
    ///
    /// Used when the routing table is built at startup, before the topic is
    /// shared.
    #[must_use]
    pub fn with_subscriptions(
        name: impl Into<String>,
        subscriptions: Vec<Arc<Subscription>>,
    ) -> Self {
        let name = name.into();
        Self {
            identity: TopicIdentity::new(&name),
            name,
            subscriptions: RwLock::new(subscriptions),
        }
    }

    /// The topic's wire name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity this topic presents when enqueueing.
    #[must_use]
    pub const fn identity(&self) -> &TopicIdentity {
        &self.identity
    }

    /// Number of bound subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Remove the subscription delivering into the named queue.
    pub async fn unsubscribe(&self, queue_name: &str) -> Option<Arc<Subscription>> {
        let mut subscriptions = self.subscriptions.write().await;
        let position = subscriptions
            .iter()
            .position(|subscription| subscription.queue().name() == queue_name)?;
        Some(subscriptions.remove(position))
    }

    /// Broadcast a message to every bound subscription.
    ///
    /// Each subscription gets its own delivery job; retries and
    /// dead-lettering happen in the delivery worker, never in the
    /// publisher's call path.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::PublishFailed`] if a job cannot be handed to
    /// the delivery worker. Jobs dispatched before the failure stay
    /// dispatched.
    pub async fn publish(
        &self,
        message: &Message,
        delivery: &DeliveryHandle,
    ) -> Result<(), FanoutError> {
        let subscriptions = self.subscriptions.read().await;
        for subscription in subscriptions.iter() {
            delivery.dispatch(DeliveryJob {
                subscription: Arc::clone(subscription),
                message: message.clone(),
            })?;
        }
        Ok(())
    }
}
