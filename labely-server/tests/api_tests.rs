//! Integration tests for labely-server HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Image dataset endpoints (list, manifest, image bytes, setcat)
//! - Text dataset endpoints (get, getitem, setlabel)
//! - Session endpoints and the error body taxonomy
//! - Profile and leaderboard

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use labely_common::db::init_memory_database;
use labely_common::events::EventBus;
use labely_server::engine::EngineConfig;
use labely_server::registry::DatasetRegistry;
use labely_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

/// Test helper: write two datasets to a temp directory
fn write_datasets() -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    let muffin = dir.path().join("muffin-vs-chihuahua");
    std::fs::create_dir_all(&muffin).unwrap();
    std::fs::write(
        muffin.join("index.json"),
        json!({
            "dataset_name": "muffin-vs-chihuahua",
            "categories": [{"label": "muffin", "value": 0}, {"label": "chihuahua", "value": 1}],
            "data": [
                {"id": 0, "filename": "0001.jpg", "category": -1, "correct_answer": "chihuahua"},
                {"id": 1, "filename": "0002.jpg", "category": -1},
                {"id": 2, "filename": "0003.jpg", "category": -1}
            ]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(muffin.join("0001.jpg"), JPEG_BYTES).unwrap();

    let imdb = dir.path().join("imdb-movie-review");
    std::fs::create_dir_all(&imdb).unwrap();
    std::fs::write(
        imdb.join("index.json"),
        json!({
            "dataset_name": "imdb-movie-review",
            "data": [
                {"id": 0, "review": "A masterpiece of quiet tension.", "label": null},
                {"id": 1, "review": "Dull and far too long.", "label": null}
            ]
        })
        .to_string(),
    )
    .unwrap();

    dir
}

/// Test helper: router over the temp datasets and an in-memory database
async fn setup_app() -> (Router, TempDir) {
    let dir = write_datasets();
    let registry = Arc::new(DatasetRegistry::load_dir(dir.path()).unwrap());
    let pool = init_memory_database().await.unwrap();
    let state = AppState::new(pool, registry, EngineConfig::default(), EventBus::new(64));
    (build_router(state), dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: send a request and decode the JSON body
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "labely-server");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

// =============================================================================
// Image datasets
// =============================================================================

#[tokio::test]
async fn test_dataset_list() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/dataset/list")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["imdb-movie-review", "muffin-vs-chihuahua"]));
}

#[tokio::test]
async fn test_dataset_manifest_reflects_consensus() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/dataset/get?name=muffin-vs-chihuahua")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataset_name"], "muffin-vs-chihuahua");
    assert_eq!(body["categories"][1]["label"], "chihuahua");
    assert_eq!(body["data"][1]["category"], -1);
    assert!(body["data"][0].get("correct_answer").is_none());

    for (user, label) in [("a", "chihuahua"), ("b", "chihuahua"), ("c", "muffin")] {
        let (status, ack) = send(
            &app,
            post_json(
                "/dataset/setcat",
                json!({"name": "muffin-vs-chihuahua", "id": 1, "label": label, "user_id": user}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["success"], true);
    }

    let (_, body) = send(&app, get("/dataset/get?name=muffin-vs-chihuahua")).await;
    assert_eq!(body["data"][1]["category"], 1);
    assert_eq!(body["data"][2]["category"], -1);
}

#[tokio::test]
async fn test_setcat_rejects_unknown_category() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/dataset/setcat",
            json!({"name": "muffin-vs-chihuahua", "id": 1, "label": "blueberry"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_LABEL");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_unknown_dataset_is_404_with_error_body() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/dataset/get?name=cats-vs-dogs")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["retryable"], false);
    assert!(body["error"].as_str().unwrap().contains("cats-vs-dogs"));
}

#[tokio::test]
async fn test_get_image_bytes() {
    let (app, _dir) = setup_app().await;

    let response = app
        .clone()
        .oneshot(get("/dataset/getimg?name=muffin-vs-chihuahua&id=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], JPEG_BYTES);

    // Listed in the manifest but missing on disk
    let (status, _) = send(&app, get("/dataset/getimg?name=muffin-vs-chihuahua&id=1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_endpoints_reject_text_dataset() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/dataset/get?name=imdb-movie-review")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

// =============================================================================
// Text datasets
// =============================================================================

#[tokio::test]
async fn test_text_dataset_round() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/textdataset/get?name=imdb-movie-review")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["review"], "A masterpiece of quiet tension.");
    assert_eq!(body["data"][0]["label"], Value::Null);

    let (status, body) = send(
        &app,
        post_json(
            "/textdataset/setlabel",
            json!({"name": "imdb-movie-review", "id": 1, "label": "neutral"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_LABEL");

    let (status, _) = send(
        &app,
        post_json(
            "/textdataset/setlabel",
            json!({"name": "imdb-movie-review", "id": 1, "label": "negative"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/textdataset/getitem?name=imdb-movie-review&id=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["review"], "Dull and far too long.");
    assert_eq!(body["label"], "negative");

    let (status, _) = send(&app, get("/textdataset/getitem?name=imdb-movie-review&id=7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_session_flow_and_error_taxonomy() {
    let (app, _dir) = setup_app().await;

    let (status, session) = send(
        &app,
        post_json(
            "/session/start",
            json!({"user_id": "alice", "dataset": "muffin-vs-chihuahua", "task_limit": 2}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "open");
    assert_eq!(session["task_type"], "binary");
    let id = session["session_id"].as_str().unwrap().to_string();

    let (status, task) = send(&app, get(&format!("/session/{}/next", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["item_id"], 0);
    assert_eq!(task["categories"], json!(["muffin", "chihuahua"]));
    assert_eq!(task["image_url"], "/dataset/getimg?name=muffin-vs-chihuahua&id=0");

    let (status, body) = send(
        &app,
        post_json(&format!("/session/{}/submit", id), json!({"item_id": 2, "label": "muffin"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OUT_OF_SEQUENCE");
    assert_eq!(body["retryable"], false);

    let (status, result) = send(
        &app,
        post_json(&format!("/session/{}/submit", id), json!({"item_id": 0, "label": "muffin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["is_correct"], false);
    assert_eq!(result["verdict"], "incorrect");
    assert_eq!(result["new_streak"], 0);
    assert_eq!(result["session_terminal"], false);

    let (_, result) = send(
        &app,
        post_json(&format!("/session/{}/submit", id), json!({"item_id": 1, "label": "chihuahua"})),
    )
    .await;
    assert_eq!(result["session_terminal"], true);
    assert_eq!(result["tasks_completed"], 2);

    let (status, body) = send(
        &app,
        post_json(&format!("/session/{}/submit", id), json!({"item_id": 2, "label": "muffin"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SESSION_TERMINAL");
    assert_eq!(body["retryable"], false);

    let (status, session) = send(&app, get(&format!("/session/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "completed");
    assert_eq!(session["earned_accum"], 10);
}

#[tokio::test]
async fn test_submit_rejects_wrong_label_shape() {
    let (app, _dir) = setup_app().await;

    let (_, session) = send(
        &app,
        post_json("/session/start", json!({"user_id": "bob", "dataset": "muffin-vs-chihuahua"})),
    )
    .await;
    let id = session["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post_json(
            &format!("/session/{}/submit", id),
            json!({"item_id": 0, "label": {"boxes": [{"x": 0, "y": 0, "width": 30, "height": 30}]}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_LABEL");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, get("/session/7f1d9a7e-9c1b-4a7e-8a55-0f2e64b7d3c1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// =============================================================================
// Standings
// =============================================================================

#[tokio::test]
async fn test_profile_and_leaderboard() {
    let (app, _dir) = setup_app().await;

    let (status, profile) = send(&app, get("/profile/newcomer")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["elo"], 1500);
    assert_eq!(profile["accuracy"], Value::Null);

    let (_, session) = send(
        &app,
        post_json(
            "/session/start",
            json!({"user_id": "alice", "dataset": "muffin-vs-chihuahua", "task_limit": 1}),
        ),
    )
    .await;
    let id = session["session_id"].as_str().unwrap().to_string();
    send(
        &app,
        post_json(&format!("/session/{}/submit", id), json!({"item_id": 0, "label": "chihuahua"})),
    )
    .await;

    let (_, profile) = send(&app, get("/profile/alice")).await;
    assert_eq!(profile["total_tasks_completed"], 1);
    assert_eq!(profile["wallet_balance"], 5);
    assert_eq!(profile["accuracy"], 100.0);

    let (status, board) = send(&app, get("/leaderboard?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["user_id"], "alice");
    assert_eq!(board.as_array().unwrap().len(), 1);
}
