//! HTTP API handlers for labely-server

pub mod datasets;
pub mod health;
pub mod sessions;
pub mod sse;
pub mod standings;
pub mod text_datasets;

pub use datasets::{get_dataset, get_image, list_datasets, set_category};
pub use health::health_routes;
pub use sessions::{get_session, next_task, start_session, submit_label};
pub use sse::event_stream;
pub use standings::{get_leaderboard, get_profile};
pub use text_datasets::{get_text_dataset, get_text_item, set_text_label};
