//! The delivery front end: the only public read path for cover images.
//!
//! `GET /assets/*key` serves from the edge cache when fresh (cache hits
//! never touch the asset store) and otherwise reads from the store under
//! the front end's fixed trust identity. The store accepts no other reader,
//! which is what keeps it fully private while covers stay publicly
//! servable. Responses carry the version id as an `ETag` and permissive
//! CORS headers are layered onto this route so browsers can render covers
//! cross-origin.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Serve the current version of a cover image.
///
/// # Errors
///
/// `404 NOT_FOUND` if no object exists at the key.
pub async fn get_asset(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    if let Some(cached) = state.cache.get(&key).await {
        tracing::debug!(key = %key, "asset served from cache");
        return Ok(asset_response(
            cached.bytes,
            &cached.content_type,
            &cached.etag,
            state.cache.ttl_seconds(),
            "HIT",
        ));
    }

    let version = state.store.get(&state.reader, &key).await?;
    state.cache.insert(&key, &version).await;

    Ok(asset_response(
        version.bytes.clone(),
        &version.content_type,
        &version.version_id.to_string(),
        state.cache.ttl_seconds(),
        "MISS",
    ))
}

fn asset_response(
    bytes: Vec<u8>,
    content_type: &str,
    etag: &str,
    max_age: i64,
    cache_status: &'static str,
) -> Response {
    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert("X-Cache", HeaderValue::from_static(cache_status));

    response
}
