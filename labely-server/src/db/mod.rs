//! Database access layer for labely-server
//!
//! Read helpers take the pool. Writes that must land atomically with a
//! session update take a `&mut SqliteConnection` borrowed from an open
//! transaction, so a transaction never waits on a second pool connection.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub mod profiles;
pub mod retry;
pub mod sessions;
pub mod submissions;

pub use retry::retry_on_lock;

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
