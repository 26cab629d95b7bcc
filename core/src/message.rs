//! Message envelope carried from publishers to consumer queues.
//!
//! A [`Message`] wraps an opaque payload with the metadata the fanout layer
//! needs: the capability it was published under, a unique id, the publish
//! timestamp, and a receive counter for at-least-once bookkeeping. The
//! payload itself is never inspected by the fanout layer.

use crate::capability::Capability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier assigned to a message at publish time.
///
/// Ids are random (UUID v4); the bus does not dedupe, so two publishes of
/// the same payload produce two distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh message id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A published message held by a queue until acknowledged.
///
/// Delivery is at-least-once: a message that is received but not
/// acknowledged within the queue's visibility timeout becomes eligible for
/// redelivery, with `receive_count` incremented on each delivery. Consumers
/// must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id assigned at publish time.
    pub id: MessageId,

    /// The capability this message was published under.
    pub capability: Capability,

    /// Opaque payload bytes. The fanout layer never interprets these.
    pub payload: Vec<u8>,

    /// When the event bus accepted the publish.
    pub published_at: DateTime<Utc>,

    /// How many times this message has been delivered to a consumer.
    ///
    /// Zero until the first `receive`; greater than one indicates
    /// redelivery after a lapsed visibility timeout.
    pub receive_count: u32,
}

impl Message {
    /// Create a new message envelope with a fresh id.
    #[must_use]
    pub fn new(capability: Capability, payload: Vec<u8>, published_at: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            capability,
            payload,
            published_at,
            receive_count: 0,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ id: {}, capability: {}, size: {} bytes }}",
            self.id,
            self.capability,
            self.payload.len()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn message_id_roundtrips_through_string() {
        let id = MessageId::new();
        let parsed: MessageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_message_starts_undelivered() {
        let message = Message::new(Capability::Buy, b"payload".to_vec(), Utc::now());
        assert_eq!(message.receive_count, 0);
        assert_eq!(message.capability, Capability::Buy);
    }

    #[test]
    fn message_display_includes_id_and_size() {
        let message = Message::new(Capability::List, vec![0; 5], Utc::now());
        let display = format!("{message}");
        assert!(display.contains("list"));
        assert!(display.contains("5 bytes"));
    }
}
