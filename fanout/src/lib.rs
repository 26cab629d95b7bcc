//! # Bindery Fanout
//!
//! The event-driven fanout layer of the bookstore backend: topics, queues,
//! subscriptions, and the delivery machinery between them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐  publish(capability, payload)
//! │ Publisher │─────────────┐
//! └───────────┘             ▼
//!                    ┌─────────────┐
//!                    │  Event Bus  │ ◄── routing table built once at startup
//!                    └──────┬──────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │    Topic    │ ◄── fanout: one delivery job per subscription
//!                    └──────┬──────┘
//!                           ▼
//!              ┌────────────────────────┐
//!              │    Delivery Worker     │ ◄── backoff retries, off the publish path
//!              └──────┬──────────┬──────┘
//!                     ▼          ▼
//!              ┌───────────┐  ┌───────────┐
//!              │   Queue   │  │    DLQ    │ ◄── exhausted retries, full message kept
//!              └───────────┘  └───────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once**: a message that is received but not acknowledged within
//! the visibility timeout is redelivered. Consumers must be idempotent. No
//! ordering is guaranteed across messages in a queue.
//!
//! # Authorization
//!
//! Each queue accepts enqueues only from its bound topic's identity, checked
//! on every call. Authorization failures are final, logged for audit, and
//! never retried.

pub mod bus;
pub mod dead_letter;
pub mod delivery;
pub mod error;
pub mod queue;
pub mod retry;
pub mod subscription;
pub mod topic;

pub use bus::EventBus;
pub use dead_letter::{DeadLetterQueue, DlqStatus, FailedDelivery};
pub use delivery::{DeliveryHandle, DeliveryJob, DeliveryWorker};
pub use error::FanoutError;
pub use queue::{MessageQueue, QueueStats, MAX_RECEIVE_BATCH};
pub use retry::RetryPolicy;
pub use subscription::{Subscription, SubscriptionRouter};
pub use topic::Topic;
