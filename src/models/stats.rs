use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_workouts: i64,
    pub total_exercise_logs: i64,
    /// Distinct active days in the trailing 30-day window.
    pub current_streak: i64,
    /// Consecutive active days ending today (or yesterday).
    pub consecutive_days: i64,
    pub longest_streak: i64,
    pub total_calories_logged: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBest {
    pub exercise_id: Uuid,
    pub log_id: Uuid,
    pub weight: f64,
    pub reps: i32,
    pub date: DateTime<Utc>,
}
