use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::dto::PersonalBestQuery;
use crate::error::AppResult;
use crate::models::stats::{PersonalBest, UserStats};
use crate::services::stats::{DEFAULT_TOP_PERSONAL_BESTS, MAX_TOP_PERSONAL_BESTS};
use crate::AppState;

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserStats>> {
    let stats = state.stats.user_stats(auth_user.id).await?;
    Ok(Json(stats))
}

pub async fn list_personal_bests(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<PersonalBestQuery>,
) -> AppResult<Json<Vec<PersonalBest>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_PERSONAL_BESTS)
        .clamp(1, MAX_TOP_PERSONAL_BESTS);

    let bests = state.stats.top_personal_bests(auth_user.id, limit).await?;
    Ok(Json(bests))
}

/// Responds with `null` when the user has never logged the exercise.
pub async fn get_personal_best(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(exercise_id): Path<Uuid>,
) -> AppResult<Json<Option<PersonalBest>>> {
    let best = state.stats.personal_best(auth_user.id, exercise_id).await?;
    Ok(Json(best))
}
