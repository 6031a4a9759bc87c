use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::{CatalogStore, EventLogStore, LedgerStore, Store};
use crate::error::AppResult;
use crate::models::activity::{
    ExerciseLogEntry, MealIntake, MealLogEntry, NewExerciseLog, NewMealLog, WorkoutProgress,
    WorkoutStart,
};
use crate::models::subscription::{LedgerWrite, SubscriptionEvent, SubscriptionTransaction};
use crate::models::user::LedgerRecord;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

#[async_trait]
impl EventLogStore for PgStore {
    async fn ensure_user(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_exercise_log(&self, log: NewExerciseLog) -> AppResult<ExerciseLogEntry> {
        let entry = sqlx::query_as::<_, ExerciseLogEntry>(
            r#"
            INSERT INTO exercise_logs
                (id, user_id, exercise_id, workout_session_id, sets, reps, weight, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, exercise_id, workout_session_id, sets, reps, weight, notes,
                      completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(log.exercise_id)
        .bind(log.workout_session_id)
        .bind(log.sets)
        .bind(log.reps)
        .bind(log.weight)
        .bind(&log.notes)
        .fetch_one(&self.db)
        .await?;

        Ok(entry)
    }

    async fn insert_meal_log(&self, log: NewMealLog) -> AppResult<MealLogEntry> {
        let entry = sqlx::query_as::<_, MealLogEntry>(
            r#"
            INSERT INTO meal_logs (id, user_id, meal_id, servings)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, meal_id, servings, consumed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(log.meal_id)
        .bind(log.servings)
        .fetch_one(&self.db)
        .await?;

        Ok(entry)
    }

    async fn insert_workout_start(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
    ) -> AppResult<WorkoutStart> {
        let start = sqlx::query_as::<_, WorkoutStart>(
            r#"
            INSERT INTO user_workouts (id, user_id, workout_id)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, workout_id, started_at, completed_at, current_day, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(workout_id)
        .fetch_one(&self.db)
        .await?;

        Ok(start)
    }

    async fn update_workout_progress(
        &self,
        user_id: Uuid,
        id: Uuid,
        progress: &WorkoutProgress,
    ) -> AppResult<Option<WorkoutStart>> {
        // completed = true stamps completed_at once; false clears it
        let start = sqlx::query_as::<_, WorkoutStart>(
            r#"
            UPDATE user_workouts SET
                current_day = COALESCE($3, current_day),
                completed_at = CASE
                    WHEN $4::BOOLEAN IS NULL THEN completed_at
                    WHEN $4 THEN COALESCE(completed_at, NOW())
                    ELSE NULL
                END,
                is_active = COALESCE($5, is_active)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, workout_id, started_at, completed_at, current_day, is_active
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(progress.current_day)
        .bind(progress.completed)
        .bind(progress.is_active)
        .fetch_optional(&self.db)
        .await?;

        Ok(start)
    }

    async fn exercise_logs(&self, user_id: Uuid) -> AppResult<Vec<ExerciseLogEntry>> {
        let logs = sqlx::query_as::<_, ExerciseLogEntry>(
            r#"
            SELECT id, user_id, exercise_id, workout_session_id, sets, reps, weight, notes,
                   completed_at
            FROM exercise_logs
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    async fn exercise_logs_for(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
    ) -> AppResult<Vec<ExerciseLogEntry>> {
        let logs = sqlx::query_as::<_, ExerciseLogEntry>(
            r#"
            SELECT id, user_id, exercise_id, workout_session_id, sets, reps, weight, notes,
                   completed_at
            FROM exercise_logs
            WHERE user_id = $1 AND exercise_id = $2
            "#,
        )
        .bind(user_id)
        .bind(exercise_id)
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    async fn recent_exercise_logs(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ExerciseLogEntry>> {
        let logs = sqlx::query_as::<_, ExerciseLogEntry>(
            r#"
            SELECT id, user_id, exercise_id, workout_session_id, sets, reps, weight, notes,
                   completed_at
            FROM exercise_logs
            WHERE user_id = $1
            ORDER BY completed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    async fn recent_meal_logs(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<MealLogEntry>> {
        let logs = sqlx::query_as::<_, MealLogEntry>(
            r#"
            SELECT id, user_id, meal_id, servings, consumed_at
            FROM meal_logs
            WHERE user_id = $1
            ORDER BY consumed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    async fn meal_intake(&self, user_id: Uuid) -> AppResult<Vec<MealIntake>> {
        let rows = sqlx::query_as::<_, MealIntake>(
            r#"
            SELECT l.servings, m.calories
            FROM meal_logs l
            LEFT JOIN meals m ON m.id = l.meal_id
            WHERE l.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn workout_starts(&self, user_id: Uuid) -> AppResult<Vec<WorkoutStart>> {
        let starts = sqlx::query_as::<_, WorkoutStart>(
            r#"
            SELECT id, user_id, workout_id, started_at, completed_at, current_day, is_active
            FROM user_workouts
            WHERE user_id = $1
            ORDER BY started_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(starts)
    }

    async fn count_workout_starts(&self, user_id: Uuid) -> AppResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_workouts WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        Ok(count)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn exercise_exists(&self, exercise_id: Uuid) -> AppResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM exercises WHERE id = $1)")
                .bind(exercise_id)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn meal_exists(&self, meal_id: Uuid) -> AppResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM meals WHERE id = $1)")
                .bind(meal_id)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn workout_exists(&self, workout_id: Uuid) -> AppResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM workouts WHERE id = $1)")
                .bind(workout_id)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn ledger(&self, user_id: Uuid) -> AppResult<Option<LedgerRecord>> {
        let record = sqlx::query_as::<_, LedgerRecord>(
            r#"
            SELECT subscription_plan, subscription_status, subscription_expires_at,
                   subscription_paid_at, last_payment_id
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn apply_subscription(&self, tx: &SubscriptionTransaction) -> AppResult<LedgerWrite> {
        let mut db_tx = self.db.begin().await?;

        // Single conditional write: concurrent deliveries of the same payment
        // serialize on the row lock and the loser matches zero rows.
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users SET
                subscription_plan = $2,
                subscription_status = $3,
                subscription_expires_at = $4,
                subscription_paid_at = $5,
                last_payment_id = $6,
                updated_at = NOW()
            WHERE id = $1
              AND last_payment_id IS DISTINCT FROM $6
              AND (subscription_paid_at IS NULL OR subscription_paid_at <= $5)
              AND NOT EXISTS (SELECT 1 FROM subscription_events WHERE payment_id = $6)
            RETURNING id
            "#,
        )
        .bind(tx.user_id)
        .bind(tx.plan)
        .bind(tx.status)
        .bind(tx.expires_at)
        .bind(tx.paid_at)
        .bind(&tx.payment_id)
        .fetch_optional(&mut *db_tx)
        .await?;

        if updated.is_some() {
            sqlx::query(
                r#"
                INSERT INTO subscription_events
                    (id, user_id, payment_id, plan, status, paid_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (payment_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tx.user_id)
            .bind(&tx.payment_id)
            .bind(tx.plan)
            .bind(tx.status)
            .bind(tx.paid_at)
            .bind(tx.expires_at)
            .execute(&mut *db_tx)
            .await?;

            db_tx.commit().await?;
            return Ok(LedgerWrite::Applied);
        }

        db_tx.rollback().await?;

        let already_recorded = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subscription_events WHERE payment_id = $1)",
        )
        .bind(&tx.payment_id)
        .fetch_one(&self.db)
        .await?;

        let last_payment_id = sqlx::query_scalar::<_, Option<String>>(
            "SELECT last_payment_id FROM users WHERE id = $1",
        )
        .bind(tx.user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(match last_payment_id {
            None => LedgerWrite::UnknownUser,
            Some(last) if already_recorded || last.as_deref() == Some(tx.payment_id.as_str()) => {
                LedgerWrite::AlreadyApplied
            }
            Some(_) => LedgerWrite::Superseded,
        })
    }

    async fn subscription_events(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionEvent>> {
        let events = sqlx::query_as::<_, SubscriptionEvent>(
            r#"
            SELECT id, user_id, payment_id, plan, status, paid_at, expires_at, recorded_at
            FROM subscription_events
            WHERE user_id = $1
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}
