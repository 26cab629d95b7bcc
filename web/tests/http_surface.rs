//! HTTP surface tests: publish/receive/ack, the upload grant flow, and the
//! cached public read path.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use bindery_core::config::Config;
use bindery_testing::ManualClock;
use bindery_web::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn server_with_clock() -> (TestServer, Arc<ManualClock>) {
    let config = Config::default();
    let clock = Arc::new(ManualClock::default());
    let state = AppState::with_clock(&config, Arc::clone(&clock) as _).unwrap();
    let server = TestServer::new(router(state, &config.allowed_origins)).unwrap();
    (server, clock)
}

fn server() -> TestServer {
    server_with_clock().0
}

fn bearer() -> HeaderValue {
    HeaderValue::from_static("Bearer bookstore-backend")
}

#[tokio::test]
async fn liveness_endpoint_answers() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn readiness_reports_every_queue() {
    let server = server();
    let response = server.get("/health/ready").await;
    response.assert_status(StatusCode::OK);

    let report: Value = response.json();
    assert_eq!(report["status"], "ok");
    assert_eq!(report["queues"].as_array().unwrap().len(), 5);
    assert_eq!(report["queues"][1]["name"], "book-checkout-queue");
}

#[tokio::test]
async fn unknown_capability_is_rejected() {
    let server = server();
    let response = server
        .post("/api/v1/events/refund")
        .bytes(b"{}".to_vec().into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNKNOWN_CAPABILITY");
}

#[tokio::test]
async fn checkout_publish_then_receive_then_ack() {
    let server = server();

    let publish = server
        .post("/api/v1/events/checkout")
        .bytes(br#"{"orderId":"A1"}"#.to_vec().into())
        .await;
    publish.assert_status(StatusCode::ACCEPTED);
    let publish_body: Value = publish.json();
    let message_id = publish_body["message_id"].as_str().unwrap().to_string();

    let receive = server
        .post("/api/v1/queues/book-checkout-queue/receive")
        .json(&json!({ "max_wait_seconds": 5 }))
        .await;
    receive.assert_status(StatusCode::OK);
    let batch: Value = receive.json();
    let messages = batch.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["payload"], r#"{"orderId":"A1"}"#);
    assert_eq!(messages[0]["capability"], "checkout");
    assert_eq!(messages[0]["message_id"].as_str().unwrap(), message_id);

    // Acknowledge is idempotent: both calls are 204.
    for _ in 0..2 {
        let ack = server
            .post("/api/v1/queues/book-checkout-queue/ack")
            .json(&json!({ "message_id": message_id }))
            .await;
        ack.assert_status(StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn receive_on_unknown_queue_is_not_found() {
    let server = server();
    let response = server
        .post("/api/v1/queues/book-refund-queue/receive")
        .json(&json!({ "max_wait_seconds": 0 }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNKNOWN_QUEUE");
}

#[tokio::test]
async fn upload_flow_authorize_put_then_public_read() {
    let server = server();

    let authorize = server
        .post("/api/v1/uploads/authorize")
        .add_header(AUTHORIZATION, bearer())
        .json(&json!({
            "key": "covers/123.jpg",
            "verbs": ["PUT"],
            "ttl_seconds": 300
        }))
        .await;
    authorize.assert_status(StatusCode::OK);
    let grant: Value = authorize.json();
    let token = grant["token"].as_str().unwrap().to_string();
    assert!(grant["url"].as_str().unwrap().contains("covers/123.jpg"));

    let upload = server
        .put("/api/v1/uploads/covers/123.jpg")
        .add_query_param("token", &token)
        .add_header(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"))
        .bytes(b"jpegbytes".to_vec().into())
        .await;
    upload.assert_status(StatusCode::OK);
    let etag = upload.headers().get("etag").unwrap().clone();

    let read = server
        .get("/assets/covers/123.jpg")
        .add_header(ORIGIN, HeaderValue::from_static("https://shop.example.com"))
        .await;
    read.assert_status(StatusCode::OK);
    assert_eq!(read.as_bytes().as_ref(), b"jpegbytes");
    assert_eq!(
        read.headers().get("content-type").unwrap(),
        &HeaderValue::from_static("image/jpeg")
    );
    assert_eq!(read.headers().get("etag").unwrap(), &etag);
    assert_eq!(
        read.headers().get("access-control-allow-origin").unwrap(),
        &HeaderValue::from_static("*")
    );
    assert_eq!(
        read.headers().get("x-cache").unwrap(),
        &HeaderValue::from_static("MISS")
    );

    // Second read is a cache hit and never touches the store.
    let cached = server.get("/assets/covers/123.jpg").await;
    cached.assert_status(StatusCode::OK);
    assert_eq!(
        cached.headers().get("x-cache").unwrap(),
        &HeaderValue::from_static("HIT")
    );
}

#[tokio::test]
async fn authorize_without_bearer_principal_is_unauthorized() {
    let server = server();
    let response = server
        .post("/api/v1/uploads/authorize")
        .json(&json!({ "key": "covers/123.jpg", "ttl_seconds": 300 }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn overlong_ttl_is_rejected() {
    let server = server();
    let response = server
        .post("/api/v1/uploads/authorize")
        .add_header(AUTHORIZATION, bearer())
        .json(&json!({ "key": "covers/123.jpg", "ttl_seconds": 86_400 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "TTL_TOO_LONG");
}

#[tokio::test]
async fn expired_grant_cannot_upload() {
    let (server, clock) = server_with_clock();

    let authorize = server
        .post("/api/v1/uploads/authorize")
        .add_header(AUTHORIZATION, bearer())
        .json(&json!({ "key": "covers/123.jpg", "ttl_seconds": 300 }))
        .await;
    authorize.assert_status(StatusCode::OK);
    let grant: Value = authorize.json();
    let token = grant["token"].as_str().unwrap().to_string();

    clock.advance(Duration::from_secs(301));

    let upload = server
        .put("/api/v1/uploads/covers/123.jpg")
        .add_query_param("token", &token)
        .bytes(b"late".to_vec().into())
        .await;
    upload.assert_status(StatusCode::FORBIDDEN);
    let body: Value = upload.json();
    assert_eq!(body["code"], "GRANT_EXPIRED");
}

#[tokio::test]
async fn grant_scope_does_not_cover_other_keys() {
    let server = server();

    let authorize = server
        .post("/api/v1/uploads/authorize")
        .add_header(AUTHORIZATION, bearer())
        .json(&json!({ "key": "covers/123.jpg", "ttl_seconds": 300 }))
        .await;
    let grant: Value = authorize.json();
    let token = grant["token"].as_str().unwrap().to_string();

    let upload = server
        .put("/api/v1/uploads/covers/999.jpg")
        .add_query_param("token", &token)
        .bytes(b"sneaky".to_vec().into())
        .await;
    upload.assert_status(StatusCode::FORBIDDEN);

    // Nothing was written.
    let read = server.get("/assets/covers/999.jpg").await;
    read.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bogus_grant_token_is_forbidden() {
    let server = server();
    let upload = server
        .put("/api/v1/uploads/covers/123.jpg")
        .add_query_param("token", "not-a-token")
        .bytes(b"x".to_vec().into())
        .await;
    upload.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_asset_is_not_found() {
    let server = server();
    let response = server.get("/assets/covers/missing.jpg").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dead_letter_listing_is_empty_on_a_healthy_queue() {
    let server = server();
    let response = server
        .get("/api/v1/queues/book-checkout-queue/dead-letters")
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn responses_carry_correlation_ids() {
    let server = server();
    let response = server.get("/health").await;
    assert!(response.headers().get("x-correlation-id").is_some());
}
