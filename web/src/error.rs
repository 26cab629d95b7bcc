//! Error types for web handlers.
//!
//! This module bridges the fanout and media error taxonomies to HTTP
//! responses, implementing Axum's `IntoResponse` trait. Client errors keep
//! their typed error codes so callers can branch without parsing messages;
//! server errors are logged with their source chain and surfaced opaquely.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bindery_fanout::FanoutError;
use bindery_media::MediaError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Wraps domain errors with an HTTP status and a stable error code.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let id = state.bus.publish(&capability, payload).await?;
///     Ok(Json(PublishResponse { message_id: id }))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code.
    status: StatusCode,
    /// Error message (user-facing).
    message: String,
    /// Error code (for client error handling).
    code: String,
    /// Internal error (for logging, not exposed to the client).
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// The HTTP status this error renders as.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<FanoutError> for AppError {
    fn from(err: FanoutError) -> Self {
        let message = err.to_string();
        match err {
            FanoutError::UnknownCapability(_) => Self::new(
                StatusCode::BAD_REQUEST,
                message,
                "UNKNOWN_CAPABILITY".to_string(),
            ),
            FanoutError::UnknownQueue(_) => {
                Self::new(StatusCode::NOT_FOUND, message, "UNKNOWN_QUEUE".to_string())
            }
            FanoutError::Unauthorized { .. } => {
                Self::new(StatusCode::FORBIDDEN, message, "UNAUTHORIZED".to_string())
            }
            FanoutError::QueueFull { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                message,
                "QUEUE_FULL".to_string(),
            ),
            FanoutError::SubscriptionStillBound { .. } => Self::new(
                StatusCode::CONFLICT,
                message,
                "SUBSCRIPTION_STILL_BOUND".to_string(),
            ),
            FanoutError::DeliveryFailed { .. } | FanoutError::PublishFailed { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                message,
                "PUBLISH_FAILED".to_string(),
            ),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        let message = err.to_string();
        match err {
            MediaError::Forbidden { .. } => {
                Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN".to_string())
            }
            MediaError::GrantExpired { .. } => {
                Self::new(StatusCode::FORBIDDEN, message, "GRANT_EXPIRED".to_string())
            }
            MediaError::GrantNotFound => {
                Self::new(StatusCode::FORBIDDEN, message, "GRANT_NOT_FOUND".to_string())
            }
            MediaError::TtlTooLong { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "TTL_TOO_LONG".to_string())
            }
            MediaError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND".to_string())
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::capability::UnknownCapability;

    #[test]
    fn unknown_capability_maps_to_400() {
        let err: AppError = FanoutError::from(UnknownCapability("refund".to_string())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("UNKNOWN_CAPABILITY"));
    }

    #[test]
    fn media_denials_map_to_403() {
        let forbidden: AppError = MediaError::Forbidden {
            identity: "mobile-app".to_string(),
            key: "covers/1.jpg".to_string(),
        }
        .into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let expired: AppError = MediaError::GrantExpired {
            expired_at: chrono::Utc::now(),
        }
        .into();
        assert_eq!(expired.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn ttl_too_long_is_a_client_error() {
        let err: AppError = MediaError::TtlTooLong {
            requested_seconds: 3600,
            max_seconds: 900,
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
