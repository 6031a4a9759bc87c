//! In-process store used by the test suite and for running the API
//! without Postgres. Mirrors the semantics of [`PgStore`](super::PgStore).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::store::{CatalogStore, EventLogStore, LedgerStore, Store};
use crate::error::AppResult;
use crate::models::activity::{
    ExerciseLogEntry, MealIntake, MealLogEntry, NewExerciseLog, NewMealLog, WorkoutProgress,
    WorkoutStart,
};
use crate::models::subscription::{LedgerWrite, SubscriptionEvent, SubscriptionTransaction};
use crate::models::user::LedgerRecord;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, LedgerRecord>,
    exercises: HashSet<Uuid>,
    workouts: HashSet<Uuid>,
    /// meal id -> calories
    meals: HashMap<Uuid, Option<i32>>,
    exercise_logs: Vec<ExerciseLogEntry>,
    meal_logs: Vec<MealLogEntry>,
    workout_starts: Vec<WorkoutStart>,
    subscription_events: Vec<SubscriptionEvent>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Catalog seeding ──────────────────────────────────────────────────

    pub async fn add_exercise(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.write().await.exercises.insert(id);
        id
    }

    pub async fn add_workout(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.write().await.workouts.insert(id);
        id
    }

    pub async fn add_meal(&self, calories: Option<i32>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.write().await.meals.insert(id, calories);
        id
    }

    /// Removes a meal from the catalog; existing logs keep their row with
    /// the reference cleared, like `ON DELETE SET NULL`.
    pub async fn remove_meal(&self, meal_id: Uuid) {
        let mut tables = self.tables.write().await;
        tables.meals.remove(&meal_id);
        for log in tables.meal_logs.iter_mut() {
            if log.meal_id == Some(meal_id) {
                log.meal_id = None;
            }
        }
    }

    // ── Direct writes for time-dependent fixtures ────────────────────────

    pub async fn insert_exercise_log_at(
        &self,
        log: NewExerciseLog,
        completed_at: DateTime<Utc>,
    ) -> ExerciseLogEntry {
        let entry = ExerciseLogEntry {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            exercise_id: log.exercise_id,
            workout_session_id: log.workout_session_id,
            sets: log.sets,
            reps: log.reps,
            weight: log.weight,
            notes: log.notes,
            completed_at,
        };
        let mut tables = self.tables.write().await;
        tables.users.entry(log.user_id).or_default();
        tables.exercise_logs.push(entry.clone());
        entry
    }

    pub async fn set_ledger(&self, user_id: Uuid, record: LedgerRecord) {
        self.tables.write().await.users.insert(user_id, record);
    }
}

#[async_trait]
impl EventLogStore for MemoryStore {
    async fn ensure_user(&self, user_id: Uuid) -> AppResult<()> {
        self.tables.write().await.users.entry(user_id).or_default();
        Ok(())
    }

    async fn insert_exercise_log(&self, log: NewExerciseLog) -> AppResult<ExerciseLogEntry> {
        Ok(self.insert_exercise_log_at(log, Utc::now()).await)
    }

    async fn insert_meal_log(&self, log: NewMealLog) -> AppResult<MealLogEntry> {
        let entry = MealLogEntry {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            meal_id: Some(log.meal_id),
            servings: log.servings,
            consumed_at: Utc::now(),
        };
        self.tables.write().await.meal_logs.push(entry.clone());
        Ok(entry)
    }

    async fn insert_workout_start(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
    ) -> AppResult<WorkoutStart> {
        let start = WorkoutStart {
            id: Uuid::new_v4(),
            user_id,
            workout_id,
            started_at: Utc::now(),
            completed_at: None,
            current_day: 1,
            is_active: true,
        };
        self.tables.write().await.workout_starts.push(start.clone());
        Ok(start)
    }

    async fn update_workout_progress(
        &self,
        user_id: Uuid,
        id: Uuid,
        progress: &WorkoutProgress,
    ) -> AppResult<Option<WorkoutStart>> {
        let mut tables = self.tables.write().await;
        let Some(start) = tables
            .workout_starts
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(day) = progress.current_day {
            start.current_day = day;
        }
        match progress.completed {
            Some(true) => {
                start.completed_at.get_or_insert_with(Utc::now);
            }
            Some(false) => start.completed_at = None,
            None => {}
        }
        if let Some(active) = progress.is_active {
            start.is_active = active;
        }
        Ok(Some(start.clone()))
    }

    async fn exercise_logs(&self, user_id: Uuid) -> AppResult<Vec<ExerciseLogEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .exercise_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn exercise_logs_for(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
    ) -> AppResult<Vec<ExerciseLogEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .exercise_logs
            .iter()
            .filter(|l| l.user_id == user_id && l.exercise_id == exercise_id)
            .cloned()
            .collect())
    }

    async fn recent_exercise_logs(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ExerciseLogEntry>> {
        let mut logs = self.exercise_logs(user_id).await?;
        logs.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }

    async fn recent_meal_logs(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<MealLogEntry>> {
        let tables = self.tables.read().await;
        let mut logs: Vec<MealLogEntry> = tables
            .meal_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| {
            b.consumed_at
                .cmp(&a.consumed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }

    async fn meal_intake(&self, user_id: Uuid) -> AppResult<Vec<MealIntake>> {
        let tables = self.tables.read().await;
        Ok(tables
            .meal_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| MealIntake {
                servings: Some(l.servings),
                calories: l
                    .meal_id
                    .and_then(|id| tables.meals.get(&id).copied().flatten()),
            })
            .collect())
    }

    async fn workout_starts(&self, user_id: Uuid) -> AppResult<Vec<WorkoutStart>> {
        let tables = self.tables.read().await;
        let mut starts: Vec<WorkoutStart> = tables
            .workout_starts
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        starts.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        Ok(starts)
    }

    async fn count_workout_starts(&self, user_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .workout_starts
            .iter()
            .filter(|s| s.user_id == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn exercise_exists(&self, exercise_id: Uuid) -> AppResult<bool> {
        Ok(self.tables.read().await.exercises.contains(&exercise_id))
    }

    async fn meal_exists(&self, meal_id: Uuid) -> AppResult<bool> {
        Ok(self.tables.read().await.meals.contains_key(&meal_id))
    }

    async fn workout_exists(&self, workout_id: Uuid) -> AppResult<bool> {
        Ok(self.tables.read().await.workouts.contains(&workout_id))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ledger(&self, user_id: Uuid) -> AppResult<Option<LedgerRecord>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn apply_subscription(&self, tx: &SubscriptionTransaction) -> AppResult<LedgerWrite> {
        // Write lock held across check and write, the equivalent of the
        // conditional UPDATE.
        let mut tables = self.tables.write().await;

        let already_recorded = tables
            .subscription_events
            .iter()
            .any(|e| e.payment_id == tx.payment_id);

        let Some(record) = tables.users.get_mut(&tx.user_id) else {
            return Ok(LedgerWrite::UnknownUser);
        };

        if already_recorded || record.last_payment_id.as_deref() == Some(tx.payment_id.as_str()) {
            return Ok(LedgerWrite::AlreadyApplied);
        }
        if record.paid_at.is_some_and(|paid_at| paid_at > tx.paid_at) {
            return Ok(LedgerWrite::Superseded);
        }

        *record = LedgerRecord {
            plan: tx.plan,
            status: tx.status,
            expires_at: Some(tx.expires_at),
            paid_at: Some(tx.paid_at),
            last_payment_id: Some(tx.payment_id.clone()),
        };

        tables.subscription_events.push(SubscriptionEvent {
            id: Uuid::new_v4(),
            user_id: tx.user_id,
            payment_id: tx.payment_id.clone(),
            plan: tx.plan,
            status: tx.status,
            paid_at: tx.paid_at,
            expires_at: tx.expires_at,
            recorded_at: Utc::now(),
        });

        Ok(LedgerWrite::Applied)
    }

    async fn subscription_events(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<SubscriptionEvent> = tables
            .subscription_events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then_with(|| b.id.cmp(&a.id)));
        Ok(events)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
