//! # Labely Common Library
//!
//! Shared code for the Labely server and client including:
//! - Domain models (task types, labels, sessions, profiles)
//! - API request/response types
//! - Configuration loading and root folder resolution
//! - Database schema initialization
//! - Event types and SSE helpers

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
