//! Plan store operations
//!
//! Plans own their exercise list; deleting a plan removes its exercises via
//! `ON DELETE CASCADE` and detaches sessions via `ON DELETE SET NULL`.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::models::{NewWorkoutPlan, PlanExercise, PlanWithExercises, WorkoutPlan};
use crate::store::{StoreError, StoreResult};

type PlanRow = (i64, String, Option<i64>, Option<String>, Option<String>);

/// ---------------------------------------------------------------------------
/// Row Mapping
/// ---------------------------------------------------------------------------

/// Parse SQLite `CURRENT_TIMESTAMP` text ("YYYY-MM-DD HH:MM:SS", UTC)
pub(crate) fn parse_sqlite_timestamp(s: &str) -> Option<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|naive| naive.and_utc())
    .ok()
    .or_else(|| {
      DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
    })
}

fn goal_from_db(plan_id: i64, goal: Option<i64>) -> StoreResult<Option<u32>> {
  goal
    .map(|g| {
      u32::try_from(g)
        .map_err(|_| StoreError::InvalidData(format!("Plan {} has invalid weekly goal {}", plan_id, g)))
    })
    .transpose()
}

fn plan_from_row(row: PlanRow) -> StoreResult<WorkoutPlan> {
  let (id, name, weekly_goal, created_at, updated_at) = row;
  Ok(WorkoutPlan {
    id,
    name,
    weekly_goal: goal_from_db(id, weekly_goal)?,
    created_at: created_at.as_deref().and_then(parse_sqlite_timestamp),
    updated_at: updated_at.as_deref().and_then(parse_sqlite_timestamp),
  })
}

fn validate_name(kind: &str, name: &str) -> StoreResult<String> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(StoreError::InvalidData(format!("{} name must not be empty", kind)));
  }
  Ok(trimmed.to_string())
}

/// ---------------------------------------------------------------------------
/// Queries
/// ---------------------------------------------------------------------------

/// All plans ordered by id, each with its exercises in name order
pub async fn list_plans_with_exercises(pool: &SqlitePool) -> StoreResult<Vec<PlanWithExercises>> {
  let rows: Vec<PlanRow> = sqlx::query_as(
    r#"
    SELECT id, name, weekly_goal, created_at, updated_at
    FROM workout_plans
    ORDER BY id
    "#,
  )
  .fetch_all(pool)
  .await?;

  let exercises: Vec<PlanExercise> = sqlx::query_as(
    r#"
    SELECT plan_id, exercise_name
    FROM plan_exercises
    ORDER BY plan_id, exercise_name
    "#,
  )
  .fetch_all(pool)
  .await?;

  let mut by_plan: HashMap<i64, Vec<String>> = HashMap::new();
  for PlanExercise { plan_id, exercise_name } in exercises {
    by_plan.entry(plan_id).or_default().push(exercise_name);
  }

  rows
    .into_iter()
    .map(|row| {
      let plan = plan_from_row(row)?;
      let exercises = by_plan.remove(&plan.id).unwrap_or_default();
      Ok(PlanWithExercises::new(plan, exercises))
    })
    .collect()
}

/// Load a single plan by id
pub async fn load_plan(pool: &SqlitePool, plan_id: i64) -> StoreResult<PlanWithExercises> {
  let row: Option<PlanRow> = sqlx::query_as(
    "SELECT id, name, weekly_goal, created_at, updated_at FROM workout_plans WHERE id = ?1",
  )
  .bind(plan_id)
  .fetch_optional(pool)
  .await?;

  let plan = plan_from_row(row.ok_or_else(|| StoreError::NotFound(format!("Plan {}", plan_id)))?)?;

  let exercises: Vec<String> = sqlx::query_scalar(
    "SELECT exercise_name FROM plan_exercises WHERE plan_id = ?1 ORDER BY exercise_name",
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;

  Ok(PlanWithExercises::new(plan, exercises))
}

/// ---------------------------------------------------------------------------
/// Mutations
/// ---------------------------------------------------------------------------

/// Insert a plan and its exercises in one transaction
pub async fn create_plan(pool: &SqlitePool, new_plan: &NewWorkoutPlan) -> StoreResult<PlanWithExercises> {
  let name = validate_name("Plan", &new_plan.name)?;
  let exercises = new_plan
    .exercises
    .iter()
    .map(|e| validate_name("Exercise", e))
    .collect::<StoreResult<Vec<_>>>()?;

  let mut tx = pool.begin().await?;

  let result = sqlx::query("INSERT INTO workout_plans (name, weekly_goal) VALUES (?1, ?2)")
    .bind(&name)
    .bind(new_plan.weekly_goal.map(i64::from))
    .execute(&mut *tx)
    .await?;
  let plan_id = result.last_insert_rowid();

  for exercise in &exercises {
    sqlx::query("INSERT OR IGNORE INTO plan_exercises (plan_id, exercise_name) VALUES (?1, ?2)")
      .bind(plan_id)
      .bind(exercise)
      .execute(&mut *tx)
      .await?;
  }

  tx.commit().await?;

  load_plan(pool, plan_id).await
}

pub async fn rename_plan(pool: &SqlitePool, plan_id: i64, name: &str) -> StoreResult<()> {
  let name = validate_name("Plan", name)?;

  let result = sqlx::query(
    "UPDATE workout_plans SET name = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
  )
  .bind(&name)
  .bind(plan_id)
  .execute(pool)
  .await?;

  if result.rows_affected() == 0 {
    return Err(StoreError::NotFound(format!("Plan {}", plan_id)));
  }
  Ok(())
}

pub async fn set_weekly_goal(pool: &SqlitePool, plan_id: i64, goal: Option<u32>) -> StoreResult<()> {
  let result = sqlx::query(
    "UPDATE workout_plans SET weekly_goal = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
  )
  .bind(goal.map(i64::from))
  .bind(plan_id)
  .execute(pool)
  .await?;

  if result.rows_affected() == 0 {
    return Err(StoreError::NotFound(format!("Plan {}", plan_id)));
  }
  Ok(())
}

pub async fn delete_plan(pool: &SqlitePool, plan_id: i64) -> StoreResult<()> {
  let result = sqlx::query("DELETE FROM workout_plans WHERE id = ?1")
    .bind(plan_id)
    .execute(pool)
    .await?;

  if result.rows_affected() == 0 {
    return Err(StoreError::NotFound(format!("Plan {}", plan_id)));
  }
  Ok(())
}

/// Add an exercise to a plan. Returns false if it was already there.
pub async fn add_plan_exercise(pool: &SqlitePool, plan_id: i64, exercise_name: &str) -> StoreResult<bool> {
  let exercise_name = validate_name("Exercise", exercise_name)?;
  ensure_plan_exists(pool, plan_id).await?;

  let result = sqlx::query("INSERT OR IGNORE INTO plan_exercises (plan_id, exercise_name) VALUES (?1, ?2)")
    .bind(plan_id)
    .bind(&exercise_name)
    .execute(pool)
    .await?;

  if result.rows_affected() > 0 {
    touch_plan(pool, plan_id).await?;
  }
  Ok(result.rows_affected() > 0)
}

/// Remove an exercise from a plan. Returns false if it wasn't there.
pub async fn remove_plan_exercise(pool: &SqlitePool, plan_id: i64, exercise_name: &str) -> StoreResult<bool> {
  ensure_plan_exists(pool, plan_id).await?;

  let result = sqlx::query("DELETE FROM plan_exercises WHERE plan_id = ?1 AND exercise_name = ?2")
    .bind(plan_id)
    .bind(exercise_name.trim())
    .execute(pool)
    .await?;

  if result.rows_affected() > 0 {
    touch_plan(pool, plan_id).await?;
  }
  Ok(result.rows_affected() > 0)
}

pub(crate) async fn ensure_plan_exists(pool: &SqlitePool, plan_id: i64) -> StoreResult<()> {
  let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM workout_plans WHERE id = ?1")
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

  exists
    .map(|_| ())
    .ok_or_else(|| StoreError::NotFound(format!("Plan {}", plan_id)))
}

async fn touch_plan(pool: &SqlitePool, plan_id: i64) -> StoreResult<()> {
  sqlx::query("UPDATE workout_plans SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1")
    .bind(plan_id)
    .execute(pool)
    .await?;
  Ok(())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
