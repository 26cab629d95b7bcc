//! # Bindery Web
//!
//! Axum HTTP surface for bindery: the delivery front end for cover images,
//! the upload grant endpoints, and the publish/receive/acknowledge API for
//! the event fanout.
//!
//! # Routes
//!
//! ```text
//! GET  /health                            liveness
//! GET  /health/ready                      readiness + queue diagnostics
//! POST /api/v1/events/:capability         publish (body = payload bytes)
//! POST /api/v1/queues/:queue/receive      long-poll consume
//! POST /api/v1/queues/:queue/ack          acknowledge (idempotent)
//! GET  /api/v1/queues/:queue/dead-letters operator DLQ inspection
//! POST /api/v1/uploads/authorize          issue upload grant (bearer principal)
//! PUT  /api/v1/uploads/*key?token=...     direct upload under a grant
//! GET  /assets/*key                       public cached cover read (CORS)
//! ```
//!
//! # Trust Boundary
//!
//! The `/assets` route is the only public read path: handlers there present
//! the front end's fixed trust identity to the asset store, and the store
//! rejects every other identity. Upload handlers never touch the store
//! without a redeemed grant. CORS is permissive for asset GETs only.

pub mod cache;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use cache::AssetCache;
pub use error::AppError;
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Assemble the full application router.
///
/// `allowed_origins` is the browser CORS allow-list for asset reads; a `*`
/// entry allows any origin.
#[must_use]
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let assets = Router::new()
        .route("/assets/*key", get(handlers::assets::get_asset))
        .layer(cors_layer(allowed_origins));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/api/v1/events/:capability", post(handlers::events::publish_event))
        .route(
            "/api/v1/queues/:queue/receive",
            post(handlers::events::receive_messages),
        )
        .route(
            "/api/v1/queues/:queue/ack",
            post(handlers::events::acknowledge_message),
        )
        .route(
            "/api/v1/queues/:queue/dead-letters",
            get(handlers::dlq::list_dead_letters),
        )
        .route(
            "/api/v1/uploads/authorize",
            post(handlers::uploads::authorize_upload),
        )
        .route("/api/v1/uploads/*key", put(handlers::uploads::upload_asset))
        .merge(assets)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

/// Permissive CORS for asset GETs, restricted to the configured origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
