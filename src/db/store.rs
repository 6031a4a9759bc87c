//! Storage seams. Services receive an `Arc<dyn Store>` so the Postgres
//! store can be swapped for the in-memory one in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::activity::{
    ExerciseLogEntry, MealIntake, MealLogEntry, NewExerciseLog, NewMealLog, WorkoutProgress,
    WorkoutStart,
};
use crate::models::subscription::{LedgerWrite, SubscriptionEvent, SubscriptionTransaction};
use crate::models::user::LedgerRecord;

/// Append-only activity logs.
#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Creates the user row with default subscription fields if missing.
    async fn ensure_user(&self, user_id: Uuid) -> AppResult<()>;

    async fn insert_exercise_log(&self, log: NewExerciseLog) -> AppResult<ExerciseLogEntry>;

    async fn insert_meal_log(&self, log: NewMealLog) -> AppResult<MealLogEntry>;

    async fn insert_workout_start(&self, user_id: Uuid, workout_id: Uuid)
        -> AppResult<WorkoutStart>;

    /// Patches progress fields of a workout start owned by `user_id`.
    /// Returns `None` when no such row exists for the user.
    async fn update_workout_progress(
        &self,
        user_id: Uuid,
        id: Uuid,
        progress: &WorkoutProgress,
    ) -> AppResult<Option<WorkoutStart>>;

    async fn exercise_logs(&self, user_id: Uuid) -> AppResult<Vec<ExerciseLogEntry>>;

    async fn exercise_logs_for(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
    ) -> AppResult<Vec<ExerciseLogEntry>>;

    /// Newest first.
    async fn recent_exercise_logs(&self, user_id: Uuid, limit: i64)
        -> AppResult<Vec<ExerciseLogEntry>>;

    /// Newest first.
    async fn recent_meal_logs(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<MealLogEntry>>;

    /// Meal logs joined to the catalog calorie value (left join).
    async fn meal_intake(&self, user_id: Uuid) -> AppResult<Vec<MealIntake>>;

    /// Newest first.
    async fn workout_starts(&self, user_id: Uuid) -> AppResult<Vec<WorkoutStart>>;

    async fn count_workout_starts(&self, user_id: Uuid) -> AppResult<i64>;
}

/// Read-only reference data.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn exercise_exists(&self, exercise_id: Uuid) -> AppResult<bool>;
    async fn meal_exists(&self, meal_id: Uuid) -> AppResult<bool>;
    async fn workout_exists(&self, workout_id: Uuid) -> AppResult<bool>;
}

/// Subscription fields on the user row plus their audit trail.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn ledger(&self, user_id: Uuid) -> AppResult<Option<LedgerRecord>>;

    /// Atomically applies `tx` unless the payment was already applied or a
    /// newer payment is already reflected. Appends a subscription event
    /// when applied.
    async fn apply_subscription(&self, tx: &SubscriptionTransaction) -> AppResult<LedgerWrite>;

    /// Newest first.
    async fn subscription_events(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionEvent>>;
}

#[async_trait]
pub trait Store: EventLogStore + CatalogStore + LedgerStore {
    /// Readiness probe.
    async fn ping(&self) -> AppResult<()>;
}
