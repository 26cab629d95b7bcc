//! Publish, receive, and acknowledge endpoints for the fanout layer.
//!
//! Publishers hit `POST /api/v1/events/:capability` with the raw payload as
//! the request body. Consumers long-poll `POST /api/v1/queues/:queue/receive`
//! and confirm with `POST /api/v1/queues/:queue/ack`; both operate on queue
//! wire names (e.g. `book-checkout-queue`).

use crate::error::AppError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bindery_core::capability::Capability;
use bindery_core::message::{Message, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on consumer long-polling, independent of what the caller asks for.
pub const MAX_WAIT_CAP_SECONDS: u64 = 20;

/// Response body for a successful publish.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// Id assigned to the created message.
    pub message_id: MessageId,
}

/// Accept a payload for fanout under the named capability.
///
/// Fire-and-forget: `202 Accepted` means the message was handed to the
/// topic, not that any consumer has processed it.
///
/// # Errors
///
/// `400 UNKNOWN_CAPABILITY` for names outside the fixed set.
pub async fn publish_event(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let message_id = state.bus.publish(&capability, body.to_vec()).await?;
    Ok((StatusCode::ACCEPTED, Json(PublishResponse { message_id })))
}

/// Request body for a receive call.
#[derive(Debug, Default, Deserialize)]
pub struct ReceiveRequest {
    /// How long to wait for messages before returning empty, in seconds.
    #[serde(default)]
    pub max_wait_seconds: u64,
}

/// A delivered message as seen by HTTP consumers.
#[derive(Debug, Serialize)]
pub struct MessageDto {
    /// Id to acknowledge with.
    pub message_id: MessageId,
    /// The capability the message was published under.
    pub capability: Capability,
    /// Payload, rendered as UTF-8 (lossy for binary payloads).
    pub payload: String,
    /// When the bus accepted the publish.
    pub published_at: DateTime<Utc>,
    /// Delivery count, for duplicate detection.
    pub receive_count: u32,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            capability: message.capability,
            payload: String::from_utf8_lossy(&message.payload).into_owned(),
            published_at: message.published_at,
            receive_count: message.receive_count,
        }
    }
}

/// Long-poll a queue for messages.
///
/// Returns an empty array on timeout; an empty queue is not an error.
///
/// # Errors
///
/// `404 UNKNOWN_QUEUE` for names outside the routing table.
pub async fn receive_messages(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Json(request): Json<ReceiveRequest>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let max_wait = Duration::from_secs(request.max_wait_seconds.min(MAX_WAIT_CAP_SECONDS));
    let batch = state.bus.receive(&queue, max_wait).await?;
    Ok(Json(batch.into_iter().map(MessageDto::from).collect()))
}

/// Request body for an acknowledge call.
#[derive(Debug, Deserialize)]
pub struct AckRequest {
    /// The id of the message to acknowledge.
    pub message_id: String,
}

/// Acknowledge a delivered message.
///
/// Idempotent: acknowledging twice, or acknowledging an unknown id, returns
/// `204` just like the first call.
///
/// # Errors
///
/// `404 UNKNOWN_QUEUE` for names outside the routing table; `400` for a
/// malformed message id.
pub async fn acknowledge_message(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Json(request): Json<AckRequest>,
) -> Result<StatusCode, AppError> {
    let message_id: MessageId = request
        .message_id
        .parse()
        .map_err(|_| AppError::bad_request("malformed message id"))?;
    state.bus.acknowledge(&queue, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
