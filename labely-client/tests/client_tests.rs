//! End-to-end tests: LabelyClient against a live labely-server router
//!
//! Each test serves the router on an ephemeral localhost port with an
//! in-memory database.

use labely_client::{ClientError, LabelyClient};
use labely_common::db::init_memory_database;
use labely_common::events::EventBus;
use labely_common::models::{Label, SessionState, Verdict};
use labely_server::engine::EngineConfig;
use labely_server::registry::DatasetRegistry;
use labely_server::{build_router, AppState};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

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

/// Test helper: serve the router on 127.0.0.1 and return a client for it
async fn spawn_server() -> (LabelyClient, TempDir) {
    let dir = write_datasets();
    let registry = Arc::new(DatasetRegistry::load_dir(dir.path()).unwrap());
    let pool = init_memory_database().await.unwrap();
    let state = AppState::new(pool, registry, EngineConfig::default(), EventBus::new(64));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    let client = LabelyClient::new(format!("http://{}", addr)).unwrap();
    (client, dir)
}

#[tokio::test]
async fn test_health() {
    let (client, _dir) = spawn_server().await;
    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.module, "labely-server");
}

#[tokio::test]
async fn test_dataset_round() {
    let (client, _dir) = spawn_server().await;

    let names = client.list_datasets().await.unwrap();
    assert_eq!(names, vec!["imdb-movie-review", "muffin-vs-chihuahua"]);

    let ack = client
        .set_category("muffin-vs-chihuahua", 1, "muffin", Some("u1"))
        .await
        .unwrap();
    assert!(ack.success);

    let manifest = client.get_dataset("muffin-vs-chihuahua").await.unwrap();
    assert_eq!(manifest.data[1].category, 0);
    assert_eq!(manifest.data[2].category, -1);

    let image = client.get_image("muffin-vs-chihuahua", 0).await.unwrap();
    assert_eq!(image, JPEG_BYTES);
}

#[tokio::test]
async fn test_text_round() {
    let (client, _dir) = spawn_server().await;

    client
        .set_text_label("imdb-movie-review", 1, "negative", None)
        .await
        .unwrap();
    let item = client.get_text_item("imdb-movie-review", 1).await.unwrap();
    assert_eq!(item.label.as_deref(), Some("negative"));

    let dataset = client.get_text_dataset("imdb-movie-review").await.unwrap();
    assert_eq!(dataset.data.len(), 2);
    assert_eq!(dataset.data[0].label, None);
}

#[tokio::test]
async fn test_session_flow() {
    let (client, _dir) = spawn_server().await;

    let session = client
        .start_session("u1", "muffin-vs-chihuahua", Some(2))
        .await
        .unwrap();
    assert_eq!(session.state, SessionState::Open);

    let task = client.next_task(session.session_id).await.unwrap();
    assert_eq!(task.item_id, 0);
    assert_eq!(task.position, 1);

    let first = client
        .submit_label(session.session_id, 0, Label::choice("chihuahua"))
        .await
        .unwrap();
    assert_eq!(first.verdict, Verdict::Correct);
    assert!(!first.session_terminal);

    let second = client
        .submit_label(session.session_id, 1, Label::choice("muffin"))
        .await
        .unwrap();
    assert!(second.session_terminal);

    let closed = client.get_session(session.session_id).await.unwrap();
    assert_eq!(closed.state, SessionState::Completed);

    let profile = client.profile("u1").await.unwrap();
    assert_eq!(profile.total_tasks_completed, 2);
    assert_eq!(profile.current_streak, 2);

    let board = client.leaderboard(Some(5)).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].user_id, "u1");
}

#[tokio::test]
async fn test_terminal_errors_are_not_retryable() {
    let (client, _dir) = spawn_server().await;

    let session = client
        .start_session("u1", "muffin-vs-chihuahua", Some(1))
        .await
        .unwrap();
    let id = session.session_id;

    let err = client
        .submit_label(id, 2, Label::choice("muffin"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("OUT_OF_SEQUENCE"));
    assert!(!err.is_retryable());

    let err = client
        .submit_label(id, 0, Label::choice("poodle"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(!err.is_retryable());

    client.submit_label(id, 0, Label::choice("chihuahua")).await.unwrap();
    let err = client
        .submit_label(id, 1, Label::choice("muffin"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("SESSION_TERMINAL"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unknown_resources() {
    let (client, _dir) = spawn_server().await;

    let err = client.get_session(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("NOT_FOUND"));

    let err = client.get_dataset("no-such-dataset").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_connection_refused_is_retryable() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LabelyClient::new(format!("http://{}", addr)).unwrap();
    let err = client.list_datasets().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert!(err.is_retryable());
}
