//! Profile and leaderboard endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use labely_common::api::{LeaderboardEntry, ProfileResponse};
use serde::Deserialize;

use crate::error::Result;
use crate::AppState;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
const MAX_LEADERBOARD_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

/// GET /profile/:user_id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let profile = state.engine.profile(&user_id).await?;
    Ok(Json(ProfileResponse::from(&profile)))
}

/// GET /leaderboard?limit=
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    Ok(Json(state.engine.leaderboard(limit).await?))
}
