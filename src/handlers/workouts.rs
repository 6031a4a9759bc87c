use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::{CatalogStore, EventLogStore};
use crate::dto::{StartWorkoutRequest, UpdateWorkoutRequest};
use crate::error::{AppError, AppResult};
use crate::models::activity::{WorkoutProgress, WorkoutStart};
use crate::AppState;

pub async fn start_workout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<StartWorkoutRequest>,
) -> AppResult<(StatusCode, Json<WorkoutStart>)> {
    if !state.store.workout_exists(body.workout_id).await? {
        return Err(AppError::NotFound("Workout not found".into()));
    }

    state.store.ensure_user(auth_user.id).await?;
    let start = state
        .store
        .insert_workout_start(auth_user.id, body.workout_id)
        .await?;

    Ok((StatusCode::CREATED, Json(start)))
}

pub async fn list_workouts(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<WorkoutStart>>> {
    let starts = state.store.workout_starts(auth_user.id).await?;
    Ok(Json(starts))
}

pub async fn update_workout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkoutRequest>,
) -> AppResult<Json<WorkoutStart>> {
    body.validate()?;
    let progress = WorkoutProgress::from(body);

    let updated = state
        .store
        .update_workout_progress(auth_user.id, id, &progress)
        .await?
        .ok_or_else(|| AppError::NotFound("Workout not found".into()))?;

    Ok(Json(updated))
}
