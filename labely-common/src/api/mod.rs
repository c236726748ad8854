//! API module for shared HTTP API types
//!
//! # Design Principle
//!
//! This module contains ONLY plain serde types. The server wraps them in
//! axum handlers and the client decodes them from reqwest responses.

pub mod types;

pub use types::{
    CategoryEntry, DatasetManifest, ErrorBody, LeaderboardEntry, ManifestItem, PostAck,
    ProfileResponse, SetLabelRequest, StartSessionRequest, SubmitLabelRequest,
    TextDatasetResponse, TextItem,
};
