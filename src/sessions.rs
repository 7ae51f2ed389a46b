//! Session store operations
//!
//! Sessions are immutable once logged; the only mutation is deletion.
//! Timestamps are stored as UTC epoch milliseconds.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::models::{ExerciseSet, NewWorkoutSession, WorkoutSession};
use crate::plans::ensure_plan_exists;
use crate::store::{StoreError, StoreResult};

type SessionRow = (i64, String, i64, Option<i64>);
type SetRow = (i64, i64, f64);

fn timestamp_from_millis(session_id: i64, ms: i64) -> StoreResult<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms)
    .ok_or_else(|| StoreError::InvalidData(format!("Session {} has invalid timestamp {}", session_id, ms)))
}

fn set_from_row(session_id: i64, reps: i64, weight: f64) -> StoreResult<ExerciseSet> {
  let reps = u32::try_from(reps)
    .map_err(|_| StoreError::InvalidData(format!("Session {} has invalid reps {}", session_id, reps)))?;
  Ok(ExerciseSet::new(reps, weight))
}

fn assemble(rows: Vec<SessionRow>, set_rows: Vec<SetRow>) -> StoreResult<Vec<WorkoutSession>> {
  let mut sets: HashMap<i64, Vec<ExerciseSet>> = HashMap::new();
  for (session_id, reps, weight) in set_rows {
    sets
      .entry(session_id)
      .or_default()
      .push(set_from_row(session_id, reps, weight)?);
  }

  rows
    .into_iter()
    .map(|(id, exercise_name, performed_at_ms, plan_id)| {
      Ok(WorkoutSession {
        id,
        exercise_name,
        timestamp: timestamp_from_millis(id, performed_at_ms)?,
        plan_id,
        sets: sets.remove(&id).unwrap_or_default(),
      })
    })
    .collect()
}

fn validate(session: &NewWorkoutSession) -> StoreResult<String> {
  let name = session.exercise_name.trim();
  if name.is_empty() {
    return Err(StoreError::InvalidData("Exercise name must not be empty".to_string()));
  }
  if let Some((idx, set)) = session.sets.iter().enumerate().find(|(_, s)| !s.is_valid()) {
    return Err(StoreError::InvalidData(format!(
      "Set {} is invalid: reps must be positive and weight non-negative (got {} x {})",
      idx + 1,
      set.reps,
      set.weight
    )));
  }
  Ok(name.to_string())
}

/// ---------------------------------------------------------------------------
/// Queries
/// ---------------------------------------------------------------------------

/// Sessions with `start <= timestamp < end`, oldest first, sets in logged order
pub async fn list_sessions_in_range(
  pool: &SqlitePool,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> StoreResult<Vec<WorkoutSession>> {
  let start_ms = start.timestamp_millis();
  let end_ms = end.timestamp_millis();

  let rows: Vec<SessionRow> = sqlx::query_as(
    r#"
    SELECT id, exercise_name, performed_at_ms, plan_id
    FROM workout_sessions
    WHERE performed_at_ms >= ?1 AND performed_at_ms < ?2
    ORDER BY performed_at_ms, id
    "#,
  )
  .bind(start_ms)
  .bind(end_ms)
  .fetch_all(pool)
  .await?;

  let set_rows: Vec<SetRow> = sqlx::query_as(
    r#"
    SELECT s.session_id, s.reps, s.weight
    FROM session_sets s
    JOIN workout_sessions w ON w.id = s.session_id
    WHERE w.performed_at_ms >= ?1 AND w.performed_at_ms < ?2
    ORDER BY s.session_id, s.position
    "#,
  )
  .bind(start_ms)
  .bind(end_ms)
  .fetch_all(pool)
  .await?;

  assemble(rows, set_rows)
}

pub async fn load_session(pool: &SqlitePool, session_id: i64) -> StoreResult<WorkoutSession> {
  let row: Option<SessionRow> = sqlx::query_as(
    "SELECT id, exercise_name, performed_at_ms, plan_id FROM workout_sessions WHERE id = ?1",
  )
  .bind(session_id)
  .fetch_optional(pool)
  .await?;

  let row = row.ok_or_else(|| StoreError::NotFound(format!("Session {}", session_id)))?;

  let set_rows: Vec<SetRow> = sqlx::query_as(
    "SELECT session_id, reps, weight FROM session_sets WHERE session_id = ?1 ORDER BY position",
  )
  .bind(session_id)
  .fetch_all(pool)
  .await?;

  assemble(vec![row], set_rows)?
    .pop()
    .ok_or_else(|| StoreError::NotFound(format!("Session {}", session_id)))
}

/// ---------------------------------------------------------------------------
/// Mutations
/// ---------------------------------------------------------------------------

/// Insert a session and its sets in one transaction
pub async fn log_session(pool: &SqlitePool, session: &NewWorkoutSession) -> StoreResult<WorkoutSession> {
  let exercise_name = validate(session)?;
  if let Some(plan_id) = session.plan_id {
    ensure_plan_exists(pool, plan_id).await?;
  }

  let mut tx = pool.begin().await?;

  let result = sqlx::query(
    "INSERT INTO workout_sessions (exercise_name, performed_at_ms, plan_id) VALUES (?1, ?2, ?3)",
  )
  .bind(&exercise_name)
  .bind(session.timestamp.timestamp_millis())
  .bind(session.plan_id)
  .execute(&mut *tx)
  .await?;
  let session_id = result.last_insert_rowid();

  for (position, set) in session.sets.iter().enumerate() {
    sqlx::query("INSERT INTO session_sets (session_id, position, reps, weight) VALUES (?1, ?2, ?3, ?4)")
      .bind(session_id)
      .bind(position as i64)
      .bind(i64::from(set.reps))
      .bind(set.weight)
      .execute(&mut *tx)
      .await?;
  }

  tx.commit().await?;

  load_session(pool, session_id).await
}

/// Delete a session and its sets
pub async fn delete_session(pool: &SqlitePool, session_id: i64) -> StoreResult<()> {
  let result = sqlx::query("DELETE FROM workout_sessions WHERE id = ?1")
    .bind(session_id)
    .execute(pool)
    .await?;

  if result.rows_affected() == 0 {
    return Err(StoreError::NotFound(format!("Session {}", session_id)));
  }
  Ok(())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::plans::delete_plan;
  use crate::test_utils::{seed_test_plans, setup_test_db, teardown_test_db, utc};
  use chrono::Duration;

  #[tokio::test]
  async fn test_log_session_keeps_set_order() {
    let pool = setup_test_db().await;
    let ids = seed_test_plans(&pool).await;

    let logged = log_session(
      &pool,
      &NewWorkoutSession::new("Bench Press", utc(2024, 3, 11, 9, 0, 0))
        .for_plan(ids[0])
        .with_set(10, 60.0)
        .with_set(8, 70.0)
        .with_set(6, 80.0),
    )
    .await
    .expect("Should log session");

    assert_eq!(logged.plan_id, Some(ids[0]));
    assert_eq!(logged.timestamp, utc(2024, 3, 11, 9, 0, 0));
    let reps: Vec<u32> = logged.sets.iter().map(|s| s.reps).collect();
    assert_eq!(reps, vec![10, 8, 6]);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_log_session_without_plan_or_sets() {
    let pool = setup_test_db().await;

    let logged = log_session(&pool, &NewWorkoutSession::new("Plank", utc(2024, 3, 11, 9, 0, 0)))
      .await
      .expect("Should log session");

    assert_eq!(logged.plan_id, None);
    assert!(logged.sets.is_empty());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_log_session_rejects_invalid_sets() {
    let pool = setup_test_db().await;
    let at = utc(2024, 3, 11, 9, 0, 0);

    let zero_reps = log_session(&pool, &NewWorkoutSession::new("Squat", at).with_set(0, 100.0)).await;
    assert!(matches!(zero_reps, Err(StoreError::InvalidData(_))));

    let negative = log_session(&pool, &NewWorkoutSession::new("Squat", at).with_set(5, -1.0)).await;
    assert!(matches!(negative, Err(StoreError::InvalidData(_))));

    let nan = log_session(&pool, &NewWorkoutSession::new("Squat", at).with_set(5, f64::NAN)).await;
    assert!(matches!(nan, Err(StoreError::InvalidData(_))));

    let unknown_plan = log_session(&pool, &NewWorkoutSession::new("Squat", at).for_plan(404)).await;
    assert!(matches!(unknown_plan, Err(StoreError::NotFound(_))));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_range_is_half_open() {
    let pool = setup_test_db().await;
    let start = utc(2024, 3, 11, 0, 0, 0);
    let end = utc(2024, 3, 18, 0, 0, 0);

    for (name, at) in [
      ("Before", start - Duration::milliseconds(1)),
      ("Start", start),
      ("Last", end - Duration::milliseconds(1)),
      ("End", end),
    ] {
      log_session(&pool, &NewWorkoutSession::new(name, at))
        .await
        .expect("Should log session");
    }

    let sessions = list_sessions_in_range(&pool, start, end)
      .await
      .expect("Should list sessions");

    let names: Vec<&str> = sessions.iter().map(|s| s.exercise_name.as_str()).collect();
    assert_eq!(names, vec!["Start", "Last"]);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_range_attaches_sets_to_their_session() {
    let pool = setup_test_db().await;
    let at = utc(2024, 3, 12, 9, 0, 0);

    log_session(&pool, &NewWorkoutSession::new("Squat", at).with_set(5, 100.0))
      .await
      .expect("Should log");
    log_session(&pool, &NewWorkoutSession::new("Row", at + Duration::minutes(5)).with_set(12, 40.0).with_set(10, 45.0))
      .await
      .expect("Should log");

    let sessions = list_sessions_in_range(&pool, utc(2024, 3, 11, 0, 0, 0), utc(2024, 3, 18, 0, 0, 0))
      .await
      .expect("Should list");

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].exercise_name, "Squat");
    assert_eq!(sessions[0].sets, vec![ExerciseSet::new(5, 100.0)]);
    assert_eq!(sessions[1].sets, vec![ExerciseSet::new(12, 40.0), ExerciseSet::new(10, 45.0)]);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_delete_session_removes_sets() {
    let pool = setup_test_db().await;

    let logged = log_session(&pool, &NewWorkoutSession::new("Squat", utc(2024, 3, 12, 9, 0, 0)).with_set(5, 100.0))
      .await
      .expect("Should log");

    delete_session(&pool, logged.id).await.expect("Should delete");

    let sets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_sets")
      .fetch_one(&pool)
      .await
      .expect("Failed to count sets");
    assert_eq!(sets, 0);
    assert!(matches!(load_session(&pool, logged.id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(delete_session(&pool, logged.id).await, Err(StoreError::NotFound(_))));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_deleting_plan_detaches_sessions() {
    let pool = setup_test_db().await;
    let ids = seed_test_plans(&pool).await;

    let logged = log_session(&pool, &NewWorkoutSession::new("Squat", utc(2024, 3, 12, 9, 0, 0)).for_plan(ids[1]))
      .await
      .expect("Should log");

    delete_plan(&pool, ids[1]).await.expect("Should delete plan");

    let reloaded = load_session(&pool, logged.id).await.expect("Session should survive");
    assert_eq!(reloaded.plan_id, None);

    teardown_test_db(pool).await;
  }
}
