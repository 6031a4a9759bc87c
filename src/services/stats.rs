//! Aggregation engine. Every figure is recomputed from the event logs on
//! each call; nothing is cached or materialized.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{EventLogStore, Store};
use crate::error::AppResult;
use crate::models::activity::{ExerciseLogEntry, MealIntake};
use crate::models::stats::{PersonalBest, UserStats};

/// Trailing window for the active-days count.
pub const ACTIVITY_WINDOW_DAYS: i64 = 30;

pub const DEFAULT_TOP_PERSONAL_BESTS: usize = 5;
pub const MAX_TOP_PERSONAL_BESTS: usize = 50;

#[derive(Clone)]
pub struct StatsEngine {
    store: Arc<dyn Store>,
}

impl StatsEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        self.user_stats_at(user_id, Utc::now()).await
    }

    pub async fn user_stats_at(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<UserStats> {
        let total_workouts = self.store.count_workout_starts(user_id).await?;
        let logs = self.store.exercise_logs(user_id).await?;
        let intake = self.store.meal_intake(user_id).await?;

        let today = now.date_naive();
        let dates = active_dates(&logs);

        Ok(UserStats {
            total_workouts,
            total_exercise_logs: logs.len() as i64,
            current_streak: active_days_in_window(&logs, now, ACTIVITY_WINDOW_DAYS),
            consecutive_days: consecutive_days(&dates, today),
            longest_streak: longest_streak(&dates),
            total_calories_logged: total_calories(&intake),
        })
    }

    pub async fn personal_best(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
    ) -> AppResult<Option<PersonalBest>> {
        let logs = self.store.exercise_logs_for(user_id, exercise_id).await?;
        Ok(select_personal_best(&logs).map(PersonalBest::from))
    }

    /// One personal best per logged exercise, most recently set first.
    pub async fn top_personal_bests(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> AppResult<Vec<PersonalBest>> {
        let logs = self.store.exercise_logs(user_id).await?;
        Ok(rank_personal_bests(&logs, limit))
    }
}

impl From<&ExerciseLogEntry> for PersonalBest {
    fn from(entry: &ExerciseLogEntry) -> Self {
        Self {
            exercise_id: entry.exercise_id,
            log_id: entry.id,
            weight: entry.weight,
            reps: entry.reps,
            date: entry.completed_at,
        }
    }
}

/// Heavier wins, then the later entry, then the larger id.
fn compare_for_best(a: &ExerciseLogEntry, b: &ExerciseLogEntry) -> Ordering {
    a.weight
        .total_cmp(&b.weight)
        .then_with(|| a.completed_at.cmp(&b.completed_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn select_personal_best(logs: &[ExerciseLogEntry]) -> Option<&ExerciseLogEntry> {
    logs.iter().max_by(|a, b| compare_for_best(a, b))
}

pub fn rank_personal_bests(logs: &[ExerciseLogEntry], limit: usize) -> Vec<PersonalBest> {
    let mut best: HashMap<Uuid, &ExerciseLogEntry> = HashMap::new();
    for entry in logs {
        best.entry(entry.exercise_id)
            .and_modify(|current| {
                if compare_for_best(entry, *current) == Ordering::Greater {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }

    let mut ranked: Vec<PersonalBest> = best.into_values().map(PersonalBest::from).collect();
    ranked.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.exercise_id.cmp(&b.exercise_id))
    });
    ranked.truncate(limit);
    ranked
}

fn active_dates(logs: &[ExerciseLogEntry]) -> BTreeSet<NaiveDate> {
    logs.iter().map(|l| l.completed_at.date_naive()).collect()
}

/// Distinct calendar dates with at least one entry on or after
/// `today - window_days`. Contiguity is not required.
pub fn active_days_in_window(logs: &[ExerciseLogEntry], now: DateTime<Utc>, window_days: i64) -> i64 {
    let since = now.date_naive() - Duration::days(window_days);
    logs.iter()
        .map(|l| l.completed_at.date_naive())
        .filter(|d| *d >= since)
        .collect::<BTreeSet<_>>()
        .len() as i64
}

/// Run of consecutive active dates ending today. A run ending yesterday
/// still counts so the streak does not drop before today's session.
pub fn consecutive_days(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> i64 {
    let mut check = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0i64;
    while dates.contains(&check) {
        streak += 1;
        check -= Duration::days(1);
    }
    streak
}

pub fn longest_streak(dates: &BTreeSet<NaiveDate>) -> i64 {
    let mut longest = 0i64;
    let mut run = 0i64;
    let mut prev: Option<NaiveDate> = None;

    for date in dates {
        run = match prev {
            Some(p) if *date == p + Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*date);
    }
    longest
}

/// Missing calories (unknown or deleted meal) count as 0, missing
/// servings as 1.
pub fn total_calories(intake: &[MealIntake]) -> f64 {
    intake
        .iter()
        .map(|i| f64::from(i.calories.unwrap_or(0)) * i.servings.unwrap_or(1.0))
        .sum()
}
