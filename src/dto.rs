//! Request DTOs. JSON field names are camelCase to match the web client.
//!
//! Conventions:
//! - `*Request` → deserialized from client JSON body
//! - `*Query`   → deserialized from query params
//! - Validation is expressed via `validator` derive macros

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::activity::{NewExerciseLog, NewMealLog, WorkoutProgress};

pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 200;

// ============================================================================
// Event logs
// ============================================================================

/// POST /api/user/exercise-logs
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExerciseLogRequest {
    pub exercise_id: Uuid,

    #[validate(range(min = 1, max = 100, message = "sets must be between 1 and 100"))]
    pub sets: i32,

    #[validate(range(min = 1, max = 1000, message = "reps must be between 1 and 1000"))]
    pub reps: i32,

    #[validate(range(min = 0.0, max = 1000.0, message = "weight must be between 0 and 1000"))]
    pub weight: f64,

    #[validate(length(max = 1000, message = "notes must be under 1000 characters"))]
    pub notes: Option<String>,

    pub workout_session_id: Option<Uuid>,
}

impl CreateExerciseLogRequest {
    pub fn into_new_log(self, user_id: Uuid) -> NewExerciseLog {
        NewExerciseLog {
            user_id,
            exercise_id: self.exercise_id,
            workout_session_id: self.workout_session_id,
            sets: self.sets,
            reps: self.reps,
            weight: self.weight,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// POST /api/user/meal-logs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealLogRequest {
    pub meal_id: Uuid,

    /// Default: 1, range: (0, 50]
    pub servings: Option<f64>,
}

impl CreateMealLogRequest {
    pub fn into_new_log(self, user_id: Uuid) -> AppResult<NewMealLog> {
        let servings = self.servings.unwrap_or(1.0);
        if !(servings > 0.0 && servings <= 50.0) {
            return Err(AppError::Validation(
                "servings must be greater than 0 and at most 50".into(),
            ));
        }

        Ok(NewMealLog {
            user_id,
            meal_id: self.meal_id,
            servings,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

impl LogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
    }
}

// ============================================================================
// Workouts
// ============================================================================

/// POST /api/user/workouts
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkoutRequest {
    pub workout_id: Uuid,
}

/// PATCH /api/user/workouts/:id (partial update)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkoutRequest {
    #[validate(range(min = 1, max = 365, message = "currentDay must be between 1 and 365"))]
    pub current_day: Option<i32>,
    pub completed: Option<bool>,
    pub is_active: Option<bool>,
}

impl From<UpdateWorkoutRequest> for WorkoutProgress {
    fn from(req: UpdateWorkoutRequest) -> Self {
        Self {
            current_day: req.current_day,
            completed: req.completed,
            is_active: req.is_active,
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PersonalBestQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Billing
// ============================================================================

/// POST /api/create-payment
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub plan: String,
}

/// Provider webhook body; only the payment id is read.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub id: String,
}
