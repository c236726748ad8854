//! labely-server library - Labeling session accounting
//!
//! Dataset registry, label validation, the session engine and the HTTP
//! surface the Labely mobile client talks to.

use axum::Router;
use chrono::{DateTime, Utc};
use labely_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod registry;
pub mod validation;

pub use error::{Error, Result};

use engine::{EngineConfig, SessionEngine};
use registry::DatasetRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub registry: Arc<DatasetRegistry>,
    pub engine: Arc<SessionEngine>,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        registry: Arc<DatasetRegistry>,
        config: EngineConfig,
        event_bus: EventBus,
    ) -> Self {
        let engine = Arc::new(SessionEngine::new(
            db.clone(),
            registry.clone(),
            config,
            event_bus.clone(),
        ));
        Self {
            db,
            registry,
            engine,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let datasets = Router::new()
        .route("/dataset/list", get(api::list_datasets))
        .route("/dataset/get", get(api::get_dataset))
        .route("/dataset/getimg", get(api::get_image))
        .route("/dataset/setcat", post(api::set_category))
        .route("/textdataset/get", get(api::get_text_dataset))
        .route("/textdataset/getitem", get(api::get_text_item))
        .route("/textdataset/setlabel", post(api::set_text_label));

    let sessions = Router::new()
        .route("/session/start", post(api::start_session))
        .route("/session/:id", get(api::get_session))
        .route("/session/:id/next", get(api::next_task))
        .route("/session/:id/submit", post(api::submit_label))
        .route("/profile/:user_id", get(api::get_profile))
        .route("/leaderboard", get(api::get_leaderboard));

    Router::new()
        .merge(datasets)
        .merge(sessions)
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
