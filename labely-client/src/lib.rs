//! # Labely Client
//!
//! Typed HTTP client for labely-server, covering the dataset endpoints the
//! mobile app already calls plus the session and standings endpoints.
//!
//! Errors say whether the same request is worth retrying
//! ([`ClientError::is_retryable`]): transport failures, busy databases and
//! concurrent submissions are; invalid labels and closed sessions are not.

pub mod client;
pub mod error;

pub use client::LabelyClient;
pub use error::{ClientError, Result};
