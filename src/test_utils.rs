//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - In-memory store doubles for the engine

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::sync::{watch, Semaphore};

use crate::models::{PlanWithExercises, WorkoutPlan, WorkoutSession};
use crate::store::{ChangeFeed, PlanSource, SessionSource, StoreError, StoreResult};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let options = SqliteConnectOptions::from_str("sqlite::memory:")
    .expect("Invalid in-memory database url")
    .foreign_keys(true);

  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect_with(options)
    .await
    .expect("Failed to create in-memory database");

  crate::db::migrate(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Seed two plans: "Push Day" (goal 2) and "Legs" (goal 1)
/// Returns their ids in insertion order
pub async fn seed_test_plans(pool: &SqlitePool) -> Vec<i64> {
  let plans = vec![
    ("Push Day", Some(2_i64), vec!["Bench Press", "Overhead Press"]),
    ("Legs", Some(1_i64), vec!["Squat"]),
  ];

  let mut ids = Vec::new();

  for (name, goal, exercises) in plans {
    let result = sqlx::query("INSERT INTO workout_plans (name, weekly_goal) VALUES (?1, ?2)")
      .bind(name)
      .bind(goal)
      .execute(pool)
      .await
      .expect("Failed to seed plan");
    let plan_id = result.last_insert_rowid();

    for exercise in exercises {
      sqlx::query("INSERT INTO plan_exercises (plan_id, exercise_name) VALUES (?1, ?2)")
        .bind(plan_id)
        .bind(exercise)
        .execute(pool)
        .await
        .expect("Failed to seed plan exercise");
    }

    ids.push(plan_id);
  }

  ids
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, h, min, s)
    .single()
    .expect("Invalid test timestamp")
}

pub fn mock_plan(id: i64, name: &str, weekly_goal: Option<u32>, exercises: &[&str]) -> PlanWithExercises {
  PlanWithExercises::new(
    WorkoutPlan {
      id,
      name: name.to_string(),
      weekly_goal,
      created_at: None,
      updated_at: None,
    },
    exercises.iter().map(|e| e.to_string()),
  )
}

/// Session with no sets
pub fn mock_session(id: i64, exercise_name: &str, timestamp: DateTime<Utc>, plan_id: Option<i64>) -> WorkoutSession {
  WorkoutSession {
    id,
    exercise_name: exercise_name.to_string(),
    timestamp,
    plan_id,
    sets: Vec::new(),
  }
}

/// ---------------------------------------------------------------------------
/// Store Doubles
/// ---------------------------------------------------------------------------

/// In-memory plan source with failure injection and an optional read gate
#[derive(Default)]
pub struct MockPlanSource {
  plans: Mutex<Vec<PlanWithExercises>>,
  feed: ChangeFeed,
  fail: AtomicBool,
  reads: AtomicUsize,
  gate: Option<Arc<Semaphore>>,
}

impl MockPlanSource {
  pub fn new(plans: Vec<PlanWithExercises>) -> Self {
    Self {
      plans: Mutex::new(plans),
      ..Default::default()
    }
  }

  /// Every read waits for one permit on `gate`
  pub fn gated(plans: Vec<PlanWithExercises>, gate: Arc<Semaphore>) -> Self {
    Self {
      gate: Some(gate),
      ..Self::new(plans)
    }
  }

  pub fn replace(&self, plans: Vec<PlanWithExercises>) {
    *self.plans.lock().unwrap() = plans;
    self.feed.bump();
  }

  pub fn touch(&self) {
    self.feed.bump();
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  /// Number of reads started so far
  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }
}

#[async_trait::async_trait]
impl PlanSource for MockPlanSource {
  async fn list_plans_with_exercises(&self) -> StoreResult<Vec<PlanWithExercises>> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      gate.acquire().await.expect("gate closed").forget();
    }
    if self.fail.load(Ordering::SeqCst) {
      return Err(StoreError::InvalidData("injected plan read failure".to_string()));
    }
    Ok(self.plans.lock().unwrap().clone())
  }

  fn subscribe_plans(&self) -> watch::Receiver<u64> {
    self.feed.subscribe()
  }
}

/// In-memory session source honouring the `[start, end)` range
#[derive(Default)]
pub struct MockSessionSource {
  sessions: Mutex<Vec<WorkoutSession>>,
  feed: ChangeFeed,
}

impl MockSessionSource {
  pub fn new(sessions: Vec<WorkoutSession>) -> Self {
    Self {
      sessions: Mutex::new(sessions),
      feed: ChangeFeed::new(),
    }
  }

  pub fn push(&self, session: WorkoutSession) {
    self.sessions.lock().unwrap().push(session);
    self.feed.bump();
  }

  pub fn touch(&self) {
    self.feed.bump();
  }
}

#[async_trait::async_trait]
impl SessionSource for MockSessionSource {
  async fn list_sessions_in_range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> StoreResult<Vec<WorkoutSession>> {
    Ok(
      self
        .sessions
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp < end)
        .cloned()
        .collect(),
    )
  }

  fn subscribe_sessions(&self) -> watch::Receiver<u64> {
    self.feed.subscribe()
  }
}

/// ---------------------------------------------------------------------------
/// Async Helpers
/// ---------------------------------------------------------------------------

/// Poll `condition` until it holds, panicking after a few seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
  let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
  while !condition() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "Condition not reached within 5s"
    );
    tokio::time::sleep(StdDuration::from_millis(5)).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_seed_plans_returns_ids() {
    let pool = setup_test_db().await;

    let ids = seed_test_plans(&pool).await;
    assert_eq!(ids.len(), 2);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_exercises")
      .fetch_one(&pool)
      .await
      .expect("Failed to count plan exercises");
    assert_eq!(count, 3);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_mock_session_source_filters_range() {
    let source = MockSessionSource::new(vec![
      mock_session(1, "Squat", utc(2024, 3, 10, 23, 0, 0), None),
      mock_session(2, "Squat", utc(2024, 3, 11, 0, 0, 0), None),
      mock_session(3, "Squat", utc(2024, 3, 18, 0, 0, 0), None),
    ]);

    let sessions = source
      .list_sessions_in_range(utc(2024, 3, 11, 0, 0, 0), utc(2024, 3, 18, 0, 0, 0))
      .await
      .unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, 2);
  }
}
