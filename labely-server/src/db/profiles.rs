//! Labeler profile persistence and standings

use labely_common::models::{Session, UserProfile};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::parse_timestamp;
use crate::error::Result;

const PROFILE_COLUMNS: &str = r#"
    user_id, elo, total_tasks_completed, current_streak, best_streak,
    gold_answered, gold_correct, wallet_balance, updated_at
"#;

fn row_to_profile(row: &SqliteRow) -> Result<UserProfile> {
    let updated_at: String = row.get("updated_at");
    Ok(UserProfile {
        user_id: row.get("user_id"),
        elo: row.get("elo"),
        total_tasks_completed: row.get::<i64, _>("total_tasks_completed") as u64,
        current_streak: row.get::<i64, _>("current_streak") as u32,
        best_streak: row.get::<i64, _>("best_streak") as u32,
        gold_answered: row.get::<i64, _>("gold_answered") as u64,
        gold_correct: row.get::<i64, _>("gold_correct") as u64,
        wallet_balance: row.get("wallet_balance"),
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub async fn get(pool: &SqlitePool, user_id: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_profile).transpose()
}

/// Stored profile, or a fresh one at `default_elo` for unknown users
pub async fn get_or_default(pool: &SqlitePool, user_id: &str, default_elo: i64) -> Result<UserProfile> {
    Ok(get(pool, user_id)
        .await?
        .unwrap_or_else(|| UserProfile::new(user_id, default_elo)))
}

async fn upsert(conn: &mut SqliteConnection, profile: &UserProfile) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO profiles ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            elo = excluded.elo,
            total_tasks_completed = excluded.total_tasks_completed,
            current_streak = excluded.current_streak,
            best_streak = excluded.best_streak,
            gold_answered = excluded.gold_answered,
            gold_correct = excluded.gold_correct,
            wallet_balance = excluded.wallet_balance,
            updated_at = excluded.updated_at
        "#,
        PROFILE_COLUMNS
    ))
    .bind(&profile.user_id)
    .bind(profile.elo)
    .bind(profile.total_tasks_completed as i64)
    .bind(i64::from(profile.current_streak))
    .bind(i64::from(profile.best_streak))
    .bind(profile.gold_answered as i64)
    .bind(profile.gold_correct as i64)
    .bind(profile.wallet_balance)
    .bind(profile.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Fold a closed session into its owner's profile
///
/// Runs on the caller's connection so it commits with the session update.
pub async fn flush_session(
    conn: &mut SqliteConnection,
    session: &Session,
    default_elo: i64,
    elo_floor: i64,
) -> Result<UserProfile> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(&session.user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut profile = match row {
        Some(row) => row_to_profile(&row)?,
        None => UserProfile::new(session.user_id.clone(), default_elo),
    };

    profile.apply_session(session, elo_floor);
    upsert(conn, &profile).await?;

    Ok(profile)
}

/// Profiles ranked by ELO, then tasks completed, then user id
pub async fn leaderboard(pool: &SqlitePool, limit: u32) -> Result<Vec<UserProfile>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM profiles
        ORDER BY elo DESC, total_tasks_completed DESC, user_id ASC
        LIMIT ?
        "#,
        PROFILE_COLUMNS
    ))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_profile).collect()
}
