//! Dead-letter inspection for operators.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use bindery_fanout::FailedDelivery;
use serde::Deserialize;

/// Query parameters for dead-letter listing.
#[derive(Debug, Deserialize)]
pub struct DlqQuery {
    /// Maximum entries returned, oldest first.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    100
}

/// List a queue's pending dead-letter entries, oldest first.
///
/// # Errors
///
/// `404 UNKNOWN_QUEUE` for names outside the routing table.
pub async fn list_dead_letters(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(query): Query<DlqQuery>,
) -> Result<Json<Vec<FailedDelivery>>, AppError> {
    let dead_letter = state.bus.dead_letter(&queue)?;
    Ok(Json(dead_letter.list_pending(query.limit).await))
}
