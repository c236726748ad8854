//! Label submission persistence and consensus
//!
//! The current label of an item is the choice submitted most often; ties go
//! to the choice submitted most recently.

use chrono::{DateTime, Utc};
use labely_common::models::{Label, Verdict};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A label about to be persisted
#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
    /// None for direct (session-less) submissions
    pub session_id: Option<Uuid>,
    /// 1-based position within the session
    pub position: Option<u32>,
    pub dataset: &'a str,
    pub item_id: u64,
    pub user_id: &'a str,
    pub label: &'a Label,
    pub verdict: Verdict,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    submission: &NewSubmission<'_>,
    submitted_at: DateTime<Utc>,
) -> Result<i64> {
    let label_json = serde_json::to_string(submission.label)
        .map_err(|e| Error::Internal(format!("Failed to serialize label: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO submissions (session_id, position, dataset, item_id, user_id,
                                 label, label_key, verdict, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission.session_id.map(|id| id.to_string()))
    .bind(submission.position.map(i64::from))
    .bind(submission.dataset)
    .bind(submission.item_id as i64)
    .bind(submission.user_id)
    .bind(label_json)
    .bind(submission.label.tally_key())
    .bind(submission.verdict.as_str())
    .bind(submitted_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::ConcurrentModification(format!(
                "position {:?} of session {:?} already recorded",
                submission.position, submission.session_id
            ))
        }
        other => Error::Database(other),
    })?;

    Ok(result.last_insert_rowid())
}

/// Tally rows grouped by (item, choice), reduced to each item's winner
async fn tally(pool: &SqlitePool, dataset: &str, item_id: Option<u64>) -> Result<HashMap<u64, String>> {
    let rows = sqlx::query(
        r#"
        SELECT item_id, label_key, COUNT(*) AS votes, MAX(id) AS latest
        FROM submissions
        WHERE dataset = ? AND label_key IS NOT NULL AND (? IS NULL OR item_id = ?)
        GROUP BY item_id, label_key
        "#,
    )
    .bind(dataset)
    .bind(item_id.map(|id| id as i64))
    .bind(item_id.map(|id| id as i64))
    .fetch_all(pool)
    .await?;

    let mut best: HashMap<u64, (i64, i64, String)> = HashMap::new();
    for row in rows {
        let item_id = row.get::<i64, _>("item_id") as u64;
        let key: String = row.get("label_key");
        let votes: i64 = row.get("votes");
        let latest: i64 = row.get("latest");

        let replace = match best.get(&item_id) {
            Some((best_votes, best_latest, _)) => (votes, latest) > (*best_votes, *best_latest),
            None => true,
        };
        if replace {
            best.insert(item_id, (votes, latest, key));
        }
    }

    Ok(best
        .into_iter()
        .map(|(item_id, (_, _, key))| (item_id, key))
        .collect())
}

/// Consensus label of every labeled item in a dataset
pub async fn consensus_labels(pool: &SqlitePool, dataset: &str) -> Result<HashMap<u64, String>> {
    tally(pool, dataset, None).await
}

pub async fn consensus_label(pool: &SqlitePool, dataset: &str, item_id: u64) -> Result<Option<String>> {
    Ok(tally(pool, dataset, Some(item_id)).await?.remove(&item_id))
}

pub async fn count_for_session(pool: &SqlitePool, session_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
