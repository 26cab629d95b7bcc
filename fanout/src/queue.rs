//! At-least-once message queue bound to a single topic.
//!
//! Each queue is owned by exactly one subscription and accepts enqueues only
//! from its bound topic's identity; the check runs on every call, not at
//! configuration time. Consumers pull with [`MessageQueue::receive`], which
//! hides delivered messages for the visibility timeout, and confirm with
//! [`MessageQueue::acknowledge`]. A message that is not acknowledged before
//! the timeout lapses becomes eligible for redelivery to any consumer.
//!
//! # Delivery Semantics
//!
//! - **At-least-once**: unacknowledged messages are redelivered; consumers
//!   must be idempotent.
//! - **No ordering guarantee**: arrival order is preserved in the ready
//!   buffer, but redelivery re-appends, so consumers cannot rely on order.
//! - **Retention**: messages nobody consumes are dropped after the
//!   retention window, swept lazily on queue access.

use crate::error::FanoutError;
use bindery_core::environment::Clock;
use bindery_core::identity::TopicIdentity;
use bindery_core::message::{Message, MessageId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

/// Maximum messages returned by a single `receive` call.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Point-in-time counters for a queue, surfaced through readiness checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Messages waiting to be received.
    pub depth: usize,
    /// Messages delivered but not yet acknowledged.
    pub in_flight: usize,
    /// Total messages accepted since startup.
    pub enqueued: u64,
    /// Total messages acknowledged since startup.
    pub acknowledged: u64,
    /// Total visibility-timeout lapses since startup.
    pub redelivered: u64,
    /// Total messages dropped by the retention sweep.
    pub expired: u64,
}

#[derive(Debug)]
struct InFlight {
    message: Message,
    visible_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    in_flight: HashMap<MessageId, InFlight>,
    enqueued: u64,
    acknowledged: u64,
    redelivered: u64,
    expired: u64,
}

/// A durable, at-least-once FIFO-arrival message buffer for one capability.
pub struct MessageQueue {
    name: String,
    allowed_source: TopicIdentity,
    visibility_timeout: ChronoDuration,
    retention: ChronoDuration,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MessageQueue {
    /// Create a queue bound to a single topic identity.
    ///
    /// `capacity` bounds the ready buffer; `None` is unbounded. Durations
    /// that exceed chrono's representable range are clamped to its maximum.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        allowed_source: TopicIdentity,
        visibility_timeout: Duration,
        retention: Duration,
        capacity: Option<usize>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            allowed_source,
            visibility_timeout: ChronoDuration::from_std(visibility_timeout)
                .unwrap_or_else(|_| ChronoDuration::MAX),
            retention: ChronoDuration::from_std(retention)
                .unwrap_or_else(|_| ChronoDuration::MAX),
            capacity,
            clock,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// The queue's wire name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The one topic identity allowed to enqueue.
    #[must_use]
    pub const fn allowed_source(&self) -> &TopicIdentity {
        &self.allowed_source
    }

    /// Enqueue a message on behalf of `source`.
    ///
    /// The authorization predicate runs on every call: a source identity
    /// other than the bound topic's fails [`FanoutError::Unauthorized`],
    /// is logged with identity and resource for audit, and never reaches
    /// the queue.
    ///
    /// # Errors
    ///
    /// - [`FanoutError::Unauthorized`] if `source` is not the bound topic.
    /// - [`FanoutError::QueueFull`] if the ready buffer is at capacity
    ///   (transient; the delivery worker retries it).
    pub async fn enqueue(
        &self,
        source: &TopicIdentity,
        message: Message,
    ) -> Result<(), FanoutError> {
        if *source != self.allowed_source {
            tracing::warn!(
                queue = %self.name,
                source = %source,
                message_id = %message.id,
                "enqueue denied: source is not the bound topic"
            );
            metrics::counter!("fanout.queue.enqueue_denied", "queue" => self.name.clone())
                .increment(1);
            return Err(FanoutError::Unauthorized {
                queue: self.name.clone(),
                presented: source.clone(),
            });
        }

        let mut state = self.state.lock().await;
        self.reclaim(&mut state);

        if let Some(capacity) = self.capacity {
            if state.ready.len() >= capacity {
                return Err(FanoutError::QueueFull {
                    queue: self.name.clone(),
                });
            }
        }

        tracing::debug!(queue = %self.name, message_id = %message.id, "message enqueued");
        state.ready.push_back(message);
        state.enqueued += 1;
        drop(state);

        metrics::counter!("fanout.queue.enqueued", "queue" => self.name.clone()).increment(1);
        self.notify.notify_one();
        Ok(())
    }

    /// Receive up to [`MAX_RECEIVE_BATCH`] messages, blocking up to `max_wait`.
    ///
    /// Returns an empty vec on timeout; an empty queue is never an error.
    /// Delivered messages are hidden for the visibility timeout and carry an
    /// incremented `receive_count`.
    pub async fn receive(&self, max_wait: Duration) -> Vec<Message> {
        let deadline = tokio::time::Instant::now() + max_wait;

        loop {
            let wait_hint = {
                let mut state = self.state.lock().await;
                self.reclaim(&mut state);
                let now = self.clock.now();

                let mut batch = Vec::new();
                while batch.len() < MAX_RECEIVE_BATCH {
                    let Some(mut message) = state.ready.pop_front() else {
                        break;
                    };
                    message.receive_count += 1;
                    let visible_at = now
                        .checked_add_signed(self.visibility_timeout)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    state.in_flight.insert(
                        message.id,
                        InFlight {
                            message: message.clone(),
                            visible_at,
                        },
                    );
                    batch.push(message);
                }

                if !batch.is_empty() {
                    tracing::debug!(
                        queue = %self.name,
                        count = batch.len(),
                        "messages received"
                    );
                    return batch;
                }

                Self::until_next_visibility(&state, now)
            };

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Vec::new();
            }

            // Wake early if an in-flight claim will lapse before the deadline.
            let wait = match wait_hint {
                Some(hint) => remaining.min(hint.max(Duration::from_millis(1))),
                None => remaining,
            };
            let _ = timeout(wait, self.notify.notified()).await;
        }
    }

    /// Acknowledge a delivered message, deleting it from the queue.
    ///
    /// Idempotent: acknowledging twice or acknowledging an unknown id is a
    /// no-op, not an error. An acknowledgment that arrives after the
    /// visibility timeout lapsed still deletes the message if it has not
    /// been redelivered yet.
    pub async fn acknowledge(&self, id: MessageId) {
        let mut state = self.state.lock().await;

        if state.in_flight.remove(&id).is_some() {
            state.acknowledged += 1;
        } else if let Some(position) = state.ready.iter().position(|m| m.id == id) {
            // Claim lapsed but the consumer finished the work; delete before
            // anyone receives the duplicate.
            state.ready.remove(position);
            state.acknowledged += 1;
        } else {
            tracing::debug!(queue = %self.name, message_id = %id, "acknowledge no-op");
            return;
        }
        drop(state);

        tracing::debug!(queue = %self.name, message_id = %id, "message acknowledged");
        metrics::counter!("fanout.queue.acknowledged", "queue" => self.name.clone()).increment(1);
    }

    /// Current queue counters. Runs the reclaim sweep first so the numbers
    /// reflect lapsed claims and retention drops.
    pub async fn stats(&self) -> QueueStats {
        let mut state = self.state.lock().await;
        self.reclaim(&mut state);
        QueueStats {
            depth: state.ready.len(),
            in_flight: state.in_flight.len(),
            enqueued: state.enqueued,
            acknowledged: state.acknowledged,
            redelivered: state.redelivered,
            expired: state.expired,
        }
    }

    /// Move lapsed in-flight claims back to the ready buffer and drop
    /// messages past the retention window.
    fn reclaim(&self, state: &mut QueueState) {
        let now = self.clock.now();

        let lapsed: Vec<MessageId> = state
            .in_flight
            .iter()
            .filter(|(_, in_flight)| in_flight.visible_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in lapsed {
            if let Some(in_flight) = state.in_flight.remove(&id) {
                tracing::debug!(
                    queue = %self.name,
                    message_id = %id,
                    receive_count = in_flight.message.receive_count,
                    "visibility timeout lapsed, message eligible for redelivery"
                );
                metrics::counter!("fanout.queue.redelivered", "queue" => self.name.clone())
                    .increment(1);
                state.redelivered += 1;
                state.ready.push_back(in_flight.message);
            }
        }

        if let Some(horizon) = now.checked_sub_signed(self.retention) {
            let before = state.ready.len();
            state.ready.retain(|message| message.published_at > horizon);
            let dropped = before - state.ready.len();
            if dropped > 0 {
                tracing::warn!(
                    queue = %self.name,
                    dropped,
                    "retention window lapsed, unconsumed messages dropped"
                );
                state.expired += dropped as u64;
            }
        }
    }

    fn until_next_visibility(state: &QueueState, now: DateTime<Utc>) -> Option<Duration> {
        state
            .in_flight
            .values()
            .map(|in_flight| in_flight.visible_at)
            .min()
            .map(|visible_at| (visible_at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("allowed_source", &self.allowed_source)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bindery_core::capability::Capability;
    use bindery_core::environment::SystemClock;
    use bindery_testing::ManualClock;

    fn bound_topic() -> TopicIdentity {
        TopicIdentity::new("book-checkout-topic")
    }

    fn system_queue() -> MessageQueue {
        MessageQueue::new(
            "book-checkout-queue",
            bound_topic(),
            Duration::from_secs(30),
            Duration::from_secs(345_600),
            None,
            Arc::new(SystemClock),
        )
    }

    fn message(payload: &[u8]) -> Message {
        Message::new(Capability::Checkout, payload.to_vec(), Utc::now())
    }

    #[tokio::test]
    async fn bound_topic_can_enqueue_and_consumer_receives() {
        let queue = system_queue();
        queue
            .enqueue(&bound_topic(), message(b"{\"orderId\":\"A1\"}"))
            .await
            .unwrap();

        let batch = queue.receive(Duration::from_secs(5)).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, b"{\"orderId\":\"A1\"}");
        assert_eq!(batch[0].receive_count, 1);
    }

    #[tokio::test]
    async fn foreign_source_is_rejected_and_queue_unchanged() {
        let queue = system_queue();
        let foreign = TopicIdentity::new("book-sell-topic");

        let err = queue.enqueue(&foreign, message(b"x")).await.unwrap_err();
        assert!(matches!(err, FanoutError::Unauthorized { .. }));

        let stats = queue.stats().await;
        assert_eq!(stats.depth, 0);
        assert_eq!(stats.enqueued, 0);
    }

    #[tokio::test]
    async fn receive_times_out_with_empty_batch() {
        let queue = system_queue();
        let batch = queue.receive(Duration::from_millis(20)).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn acknowledge_is_idempotent() {
        let queue = system_queue();
        queue.enqueue(&bound_topic(), message(b"x")).await.unwrap();

        let batch = queue.receive(Duration::from_secs(1)).await;
        let id = batch[0].id;

        queue.acknowledge(id).await;
        queue.acknowledge(id).await;
        queue.acknowledge(MessageId::new()).await;

        let stats = queue.stats().await;
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test]
    async fn unacknowledged_message_is_redelivered_after_visibility_lapse() {
        let clock = Arc::new(ManualClock::default());
        let queue = MessageQueue::new(
            "book-checkout-queue",
            bound_topic(),
            Duration::from_secs(30),
            Duration::from_secs(345_600),
            None,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        queue
            .enqueue(&bound_topic(), Message::new(Capability::Checkout, b"x".to_vec(), clock.now()))
            .await
            .unwrap();

        let first = queue.receive(Duration::from_secs(1)).await;
        assert_eq!(first[0].receive_count, 1);

        // No ack; claim lapses.
        clock.advance(Duration::from_secs(31));

        let second = queue.receive(Duration::from_secs(1)).await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].receive_count, 2);

        let stats = queue.stats().await;
        assert_eq!(stats.redelivered, 1);
    }

    #[tokio::test]
    async fn acknowledged_message_is_not_redelivered() {
        let clock = Arc::new(ManualClock::default());
        let queue = MessageQueue::new(
            "book-checkout-queue",
            bound_topic(),
            Duration::from_secs(30),
            Duration::from_secs(345_600),
            None,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        queue
            .enqueue(&bound_topic(), Message::new(Capability::Checkout, b"x".to_vec(), clock.now()))
            .await
            .unwrap();

        let batch = queue.receive(Duration::from_secs(1)).await;
        queue.acknowledge(batch[0].id).await;

        clock.advance(Duration::from_secs(60));
        assert!(queue.receive(Duration::ZERO).await.is_empty());
    }

    #[tokio::test]
    async fn full_queue_rejects_with_transient_error() {
        let queue = MessageQueue::new(
            "book-checkout-queue",
            bound_topic(),
            Duration::from_secs(30),
            Duration::from_secs(345_600),
            Some(1),
            Arc::new(SystemClock),
        );

        queue.enqueue(&bound_topic(), message(b"a")).await.unwrap();
        let err = queue.enqueue(&bound_topic(), message(b"b")).await.unwrap_err();
        assert!(matches!(err, FanoutError::QueueFull { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn retention_sweep_drops_stale_messages() {
        let clock = Arc::new(ManualClock::default());
        let queue = MessageQueue::new(
            "book-checkout-queue",
            bound_topic(),
            Duration::from_secs(30),
            Duration::from_secs(3600),
            None,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        queue
            .enqueue(&bound_topic(), Message::new(Capability::Checkout, b"x".to_vec(), clock.now()))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(3601));

        assert!(queue.receive(Duration::ZERO).await.is_empty());
        let stats = queue.stats().await;
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test]
    async fn blocked_receive_wakes_on_enqueue() {
        let queue = Arc::new(system_queue());
        let consumer = Arc::clone(&queue);

        let handle =
            tokio::spawn(async move { consumer.receive(Duration::from_secs(5)).await });

        // Give the consumer a moment to block.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(&bound_topic(), message(b"late")).await.unwrap();

        let batch = handle.await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, b"late");
    }
}
