//! Session persistence
//!
//! Updates are guarded by the `version` column: an update only lands when
//! the stored version still matches the one the caller loaded.

use labely_common::models::{Session, SessionState, TaskType};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;
use crate::error::{Error, Result};

const SESSION_COLUMNS: &str = r#"
    session_id, user_id, dataset, task_type, state, task_limit, start_offset,
    tasks_completed, correct_count, gold_answered, gold_correct, streak,
    elo_delta_accum, earned_accum, version, started_at, last_activity_at, ended_at
"#;

fn row_to_session(row: &SqliteRow) -> Result<Session> {
    let session_id: String = row.get("session_id");
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))?;

    let task_type: String = row.get("task_type");
    let task_type: TaskType = task_type.parse().map_err(Error::Internal)?;

    let state: String = row.get("state");
    let state: SessionState = state.parse().map_err(Error::Internal)?;

    let started_at: String = row.get("started_at");
    let last_activity_at: String = row.get("last_activity_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(Session {
        session_id,
        user_id: row.get("user_id"),
        dataset: row.get("dataset"),
        task_type,
        state,
        task_limit: row.get::<i64, _>("task_limit") as u32,
        start_offset: row.get::<i64, _>("start_offset") as u64,
        tasks_completed: row.get::<i64, _>("tasks_completed") as u32,
        correct_count: row.get::<i64, _>("correct_count") as u32,
        gold_answered: row.get::<i64, _>("gold_answered") as u32,
        gold_correct: row.get::<i64, _>("gold_correct") as u32,
        streak: row.get::<i64, _>("streak") as u32,
        elo_delta_accum: row.get("elo_delta_accum"),
        earned_accum: row.get("earned_accum"),
        version: row.get("version"),
        started_at: parse_timestamp("started_at", &started_at)?,
        last_activity_at: parse_timestamp("last_activity_at", &last_activity_at)?,
        ended_at: ended_at
            .map(|value| parse_timestamp("ended_at", &value))
            .transpose()?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, session: &Session) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO sessions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        SESSION_COLUMNS
    ))
    .bind(session.session_id.to_string())
    .bind(&session.user_id)
    .bind(&session.dataset)
    .bind(session.task_type.as_str())
    .bind(session.state.as_str())
    .bind(i64::from(session.task_limit))
    .bind(session.start_offset as i64)
    .bind(i64::from(session.tasks_completed))
    .bind(i64::from(session.correct_count))
    .bind(i64::from(session.gold_answered))
    .bind(i64::from(session.gold_correct))
    .bind(i64::from(session.streak))
    .bind(session.elo_delta_accum)
    .bind(session.earned_accum)
    .bind(session.version)
    .bind(session.started_at.to_rfc3339())
    .bind(session.last_activity_at.to_rfc3339())
    .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE session_id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_session).transpose()
}

/// Most recent open session for a (user, dataset) pair
pub async fn find_open(pool: &SqlitePool, user_id: &str, dataset: &str) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM sessions
        WHERE user_id = ? AND dataset = ? AND state = 'open'
        ORDER BY started_at DESC
        LIMIT 1
        "#,
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(dataset)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_session).transpose()
}

pub async fn list_open(pool: &SqlitePool) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE state = 'open' ORDER BY last_activity_at",
        SESSION_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_session).collect()
}

/// Write the session's mutable columns if the stored row is still open at
/// `expected_version`
///
/// Returns false when the guard fails; the stored version is bumped by one
/// on success.
pub async fn update(
    conn: &mut SqliteConnection,
    session: &Session,
    expected_version: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sessions SET
            state = ?,
            tasks_completed = ?,
            correct_count = ?,
            gold_answered = ?,
            gold_correct = ?,
            streak = ?,
            elo_delta_accum = ?,
            earned_accum = ?,
            last_activity_at = ?,
            ended_at = ?,
            version = version + 1
        WHERE session_id = ? AND version = ? AND state = 'open'
        "#,
    )
    .bind(session.state.as_str())
    .bind(i64::from(session.tasks_completed))
    .bind(i64::from(session.correct_count))
    .bind(i64::from(session.gold_answered))
    .bind(i64::from(session.gold_correct))
    .bind(i64::from(session.streak))
    .bind(session.elo_delta_accum)
    .bind(session.earned_accum)
    .bind(session.last_activity_at.to_rfc3339())
    .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
    .bind(session.session_id.to_string())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
