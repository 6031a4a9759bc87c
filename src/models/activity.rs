use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub workout_session_id: Option<Uuid>,
    pub sets: i32,
    pub reps: i32,
    pub weight: f64,
    pub notes: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExerciseLog {
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub workout_session_id: Option<Uuid>,
    pub sets: i32,
    pub reps: i32,
    pub weight: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` once the meal has been removed from the catalog.
    pub meal_id: Option<Uuid>,
    pub servings: f64,
    pub consumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub user_id: Uuid,
    pub meal_id: Uuid,
    pub servings: f64,
}

/// A meal log joined to the catalog calorie value. `calories` is `None`
/// when the meal has no calorie figure or no longer exists.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct MealIntake {
    pub servings: Option<f64>,
    pub calories: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_day: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutProgress {
    pub current_day: Option<i32>,
    pub completed: Option<bool>,
    pub is_active: Option<bool>,
}
