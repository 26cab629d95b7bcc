//! Dead-letter queue for deliveries that exhausted their retries.
//!
//! Each subscription owns one dead-letter queue. Entries preserve the full
//! message (plus a serialized snapshot of the envelope) so operators can
//! inspect, reprocess, or discard failures without data loss.

use bindery_core::message::Message;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Status of a failed delivery in the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DlqStatus {
    /// Entry is pending investigation or reprocessing.
    Pending,
    /// Entry was successfully reprocessed.
    Resolved,
    /// Entry was permanently discarded (cannot be fixed).
    Discarded,
}

impl DlqStatus {
    /// The status as its wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }
}

/// A delivery that exhausted its retry budget.
///
/// Carries the failed message plus failure metadata for troubleshooting.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDelivery {
    /// Unique identifier for this entry within its queue.
    pub id: u64,

    /// The destination queue the delivery was bound for.
    pub queue: String,

    /// The message that failed, preserved in full.
    pub message: Message,

    /// The message envelope serialized at dead-letter time, kept verbatim
    /// for manual inspection even if the in-memory shape evolves.
    pub snapshot: Vec<u8>,

    /// Human-readable error from the final attempt.
    pub error_message: String,

    /// Full error details, if any (debug output of the error chain).
    pub error_details: Option<String>,

    /// Number of delivery attempts made before giving up.
    pub retry_count: u32,

    /// When the delivery first failed.
    pub first_failed_at: DateTime<Utc>,

    /// When the delivery most recently failed.
    pub last_failed_at: DateTime<Utc>,

    /// Current processing status.
    pub status: DlqStatus,

    /// When the entry was resolved or discarded, if it was.
    pub resolved_at: Option<DateTime<Utc>>,

    /// Who or what resolved the entry.
    pub resolved_by: Option<String>,

    /// Notes about the resolution.
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Default)]
struct DlqState {
    entries: VecDeque<FailedDelivery>,
    next_id: u64,
}

/// In-memory dead-letter queue for one subscription.
///
/// Bounded: when at capacity, the oldest entry is evicted with a warning so
/// a persistent failure cannot grow memory without bound.
///
/// # Example
///
/// ```ignore
/// let pending = dlq.list_pending(100).await;
/// dlq.mark_resolved(pending[0].id, "ops-oncall", Some("replayed manually")).await;
/// ```
#[derive(Debug)]
pub struct DeadLetterQueue {
    queue_name: String,
    capacity: usize,
    state: Mutex<DlqState>,
}

impl DeadLetterQueue {
    /// Create a dead-letter queue for the named destination queue.
    #[must_use]
    pub fn new(queue_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            queue_name: queue_name.into(),
            capacity: capacity.max(1),
            state: Mutex::new(DlqState::default()),
        }
    }

    /// The destination queue this dead-letter queue shadows.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Record a delivery that exhausted its retries.
    ///
    /// Returns the id of the created entry.
    pub async fn add_entry(
        &self,
        message: Message,
        error_message: &str,
        error_details: Option<String>,
        retry_count: u32,
        now: DateTime<Utc>,
    ) -> u64 {
        let snapshot = bincode::serialize(&message).unwrap_or_else(|e| {
            tracing::error!(
                queue = %self.queue_name,
                message_id = %message.id,
                error = %e,
                "failed to snapshot dead-lettered message"
            );
            Vec::new()
        });

        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;

        if state.entries.len() >= self.capacity {
            if let Some(evicted) = state.entries.pop_front() {
                tracing::warn!(
                    queue = %self.queue_name,
                    evicted_id = evicted.id,
                    "dead-letter queue at capacity, evicting oldest entry"
                );
            }
        }

        state.entries.push_back(FailedDelivery {
            id,
            queue: self.queue_name.clone(),
            message: message.clone(),
            snapshot,
            error_message: error_message.to_string(),
            error_details,
            retry_count,
            first_failed_at: now,
            last_failed_at: now,
            status: DlqStatus::Pending,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        });
        drop(state);

        tracing::warn!(
            dlq_id = id,
            queue = %self.queue_name,
            message_id = %message.id,
            error = error_message,
            retry_count,
            "message dead-lettered"
        );
        metrics::counter!("fanout.dlq.added", "queue" => self.queue_name.clone()).increment(1);

        id
    }

    /// List pending entries, oldest first.
    pub async fn list_pending(&self, limit: usize) -> Vec<FailedDelivery> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|entry| entry.status == DlqStatus::Pending)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of pending entries. Useful for readiness checks.
    pub async fn count_pending(&self) -> usize {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|entry| entry.status == DlqStatus::Pending)
            .count()
    }

    /// Fetch a specific entry by id.
    pub async fn get_by_id(&self, id: u64) -> Option<FailedDelivery> {
        let state = self.state.lock().await;
        state.entries.iter().find(|entry| entry.id == id).cloned()
    }

    /// Mark an entry as resolved.
    ///
    /// Returns `false` if no entry with the id exists.
    pub async fn mark_resolved(
        &self,
        id: u64,
        resolved_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) else {
            return false;
        };
        entry.status = DlqStatus::Resolved;
        entry.resolved_at = Some(now);
        entry.resolved_by = Some(resolved_by.to_string());
        entry.resolution_notes = notes.map(ToString::to_string);
        drop(state);

        tracing::info!(dlq_id = id, queue = %self.queue_name, resolved_by, "dead-letter entry resolved");
        metrics::counter!("fanout.dlq.resolved", "queue" => self.queue_name.clone()).increment(1);
        true
    }

    /// Mark an entry as permanently discarded.
    ///
    /// Use when a failure cannot be fixed. Returns `false` if no entry with
    /// the id exists.
    pub async fn mark_discarded(&self, id: u64, reason: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) else {
            return false;
        };
        entry.status = DlqStatus::Discarded;
        entry.resolved_at = Some(now);
        entry.resolution_notes = Some(reason.to_string());
        drop(state);

        tracing::warn!(dlq_id = id, queue = %self.queue_name, reason, "dead-letter entry discarded");
        metrics::counter!("fanout.dlq.discarded", "queue" => self.queue_name.clone()).increment(1);
        true
    }
}
