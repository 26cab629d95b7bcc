//! Health check endpoints.
//!
//! `GET /health` is plain liveness and checks nothing. `GET /health/ready`
//! reports per-queue counters and dead-letter depth; pending dead letters
//! degrade the report without failing it, since the service can still serve
//! traffic while an operator works the backlog.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bindery_fanout::QueueStats;
use serde::Serialize;

/// Simple liveness check.
///
/// Returns 200 OK to indicate the service is running; does not check any
/// dependencies.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// One queue's slice of the readiness report.
#[derive(Debug, Serialize)]
pub struct QueueReport {
    /// The queue's wire name.
    pub name: String,
    /// Live counters.
    pub stats: QueueStats,
    /// Pending dead-letter entries.
    pub dead_letters_pending: usize,
}

/// Readiness report body.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Deployment environment name.
    pub environment: String,
    /// Per-queue counters in capability order.
    pub queues: Vec<QueueReport>,
}

/// Readiness check with queue diagnostics.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let stats = state.bus.queue_stats().await;
    let dead_letters = state.bus.dead_letter_counts().await;

    let queues: Vec<QueueReport> = stats
        .into_iter()
        .zip(dead_letters)
        .map(|((name, stats), (_, dead_letters_pending))| QueueReport {
            name,
            stats,
            dead_letters_pending,
        })
        .collect();

    let degraded = queues.iter().any(|queue| queue.dead_letters_pending > 0);
    let report = ReadinessReport {
        status: if degraded { "degraded" } else { "ok" },
        environment: state.environment.clone(),
        queues,
    };

    (StatusCode::OK, Json(report))
}
