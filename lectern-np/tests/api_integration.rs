//! HTTP API integration tests
//!
//! Drives the router directly with tower's oneshot, no listening socket.

mod helpers;

use axum::body::Body;
use axum::Router;
use helpers::{ChunkScript, MockFallback, MockSynthesizer, test_engine};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use lectern_np::api::{create_router, AppContext};
use tower::ServiceExt;

fn test_router(script: Vec<ChunkScript>) -> Router {
    let synthesizer = MockSynthesizer::new(script);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer, fallback);
    create_router(AppContext { state, engine })
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_module_and_version() {
    let app = test_router(vec![]);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "narration_player");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn speak_empty_text_is_a_noop() {
    let app = test_router(vec![]);

    let response = app
        .oneshot(post_json("/narration/speak", serde_json::json!({ "text": "  \n " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "empty");
    assert!(body["session_id"].is_null());
}

#[tokio::test]
async fn speak_returns_session_and_second_speak_conflicts() {
    // Long single chunk keeps the session busy
    let app = test_router(vec![ChunkScript::Audio(240_000)]);

    let response = app
        .clone()
        .oneshot(post_json("/narration/speak", serde_json::json!({ "text": "Hello there." })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "started");
    assert!(body["session_id"].is_string());

    let conflict = app
        .oneshot(post_json("/narration/speak", serde_json::json!({ "text": "More." })))
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_reflects_idle_engine() {
    let app = test_router(vec![]);

    let response = app
        .oneshot(Request::builder().uri("/narration/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["state"], "idle");
    assert_eq!(body["voice"], "Kore");
    assert_eq!(body["position_seconds"], 0.0);
    assert!(body["session_id"].is_null());
}

#[tokio::test]
async fn stop_when_idle_is_ok() {
    let app = test_router(vec![]);

    let response = app
        .oneshot(post_json("/narration/stop", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "stopped");
}

#[tokio::test]
async fn pause_when_idle_conflicts() {
    let app = test_router(vec![]);

    let response = app
        .oneshot(post_json("/narration/pause", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn volume_roundtrip_and_validation() {
    let app = test_router(vec![]);

    let response = app
        .clone()
        .oneshot(post_json("/audio/volume", serde_json::json!({ "volume": 40 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/audio/volume").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["volume"], 40);

    let response = app
        .oneshot(post_json("/audio/volume", serde_json::json!({ "volume": 101 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn voice_change_rejects_blank_and_accepts_named_voice() {
    let app = test_router(vec![]);

    let response = app
        .clone()
        .oneshot(post_json_put("/narration/voice", serde_json::json!({ "voice": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json_put("/narration/voice", serde_json::json!({ "voice": "Puck" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/narration/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["voice"], "Puck");
}

fn post_json_put(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
