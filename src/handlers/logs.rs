use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::{CatalogStore, EventLogStore};
use crate::dto::{CreateExerciseLogRequest, CreateMealLogRequest, LogQuery};
use crate::error::{AppError, AppResult};
use crate::models::activity::{ExerciseLogEntry, MealLogEntry};
use crate::AppState;

pub async fn create_exercise_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateExerciseLogRequest>,
) -> AppResult<(StatusCode, Json<ExerciseLogEntry>)> {
    body.validate()?;

    if !state.store.exercise_exists(body.exercise_id).await? {
        return Err(AppError::NotFound("Exercise not found".into()));
    }

    state.store.ensure_user(auth_user.id).await?;
    let log = state
        .store
        .insert_exercise_log(body.into_new_log(auth_user.id))
        .await?;

    tracing::debug!(
        user_id = %auth_user.id,
        exercise_id = %log.exercise_id,
        weight = log.weight,
        "Exercise logged"
    );

    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn list_exercise_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<ExerciseLogEntry>>> {
    let logs = state
        .store
        .recent_exercise_logs(auth_user.id, query.limit())
        .await?;
    Ok(Json(logs))
}

pub async fn create_meal_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateMealLogRequest>,
) -> AppResult<(StatusCode, Json<MealLogEntry>)> {
    let new_log = body.into_new_log(auth_user.id)?;

    if !state.store.meal_exists(new_log.meal_id).await? {
        return Err(AppError::NotFound("Meal not found".into()));
    }

    state.store.ensure_user(auth_user.id).await?;
    let log = state.store.insert_meal_log(new_log).await?;

    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn list_meal_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<MealLogEntry>>> {
    let logs = state
        .store
        .recent_meal_logs(auth_user.id, query.limit())
        .await?;
    Ok(Json(logs))
}
