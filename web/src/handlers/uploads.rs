//! Grant issuance and direct upload endpoints.
//!
//! The backend requests a grant from `POST /api/v1/uploads/authorize`
//! (bearer principal required), hands the returned URL to its client, and
//! the client performs a single `PUT` against it with the file body. The
//! storage-assigned version id comes back in the `ETag` header.

use crate::error::AppError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bindery_core::identity::Principal;
use bindery_media::grant::{GrantToken, UploadVerb};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body for grant issuance.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// The exact key the grant will be scoped to.
    pub key: String,
    /// Requested verbs; defaults to PUT only.
    #[serde(default = "default_verbs")]
    pub verbs: Vec<UploadVerb>,
    /// Requested validity window, in seconds.
    pub ttl_seconds: u64,
}

fn default_verbs() -> Vec<UploadVerb> {
    vec![UploadVerb::Put]
}

/// Response body for a successful grant.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Token to present on the upload.
    pub token: GrantToken,
    /// Ready-made upload URL carrying the token.
    pub url: String,
    /// Last instant the grant is valid.
    pub expires_at: DateTime<Utc>,
}

/// Issue a scoped upload grant to the bearer principal.
///
/// # Errors
///
/// - `401` without a bearer principal.
/// - `400 TTL_TOO_LONG` if the requested window exceeds the maximum.
/// - `403 FORBIDDEN` if the principal holds no matching entitlement.
pub async fn authorize_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let principal = bearer_principal(&headers)?;
    let grant = state
        .authorizer
        .authorize(
            &principal,
            &request.key,
            &request.verbs,
            Duration::from_secs(request.ttl_seconds),
        )
        .await?;

    Ok(Json(AuthorizeResponse {
        token: grant.token,
        url: format!("/api/v1/uploads/{}?token={}", request.key, grant.token),
        expires_at: grant.expires_at,
    }))
}

/// Query parameters for the upload endpoint.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// The grant token from [`authorize_upload`].
    pub token: String,
}

/// Write a cover image under a previously issued grant.
///
/// # Errors
///
/// `403` for an unknown token, an expired grant, or a grant whose scope
/// does not cover the key.
pub async fn upload_asset(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token: GrantToken = query
        .token
        .parse()
        .map_err(|_| AppError::forbidden("unrecognized grant token"))?;
    let grant = state.authorizer.redeem(token).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");

    let version = state
        .store
        .put(&grant, &key, body.to_vec(), content_type)
        .await?;

    let mut response = StatusCode::OK.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{version}\"")) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

fn bearer_principal(headers: &HeaderMap) -> Result<Principal, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(Principal::new)
        .ok_or_else(|| AppError::unauthorized("missing bearer principal"))
}
