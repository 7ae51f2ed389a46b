use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::AppConfig;
use crate::models::{NewWorkoutPlan, NewWorkoutSession, PlanWithExercises, WorkoutSession};
use crate::store::{ChangeFeed, PlanSource, SessionSource, StoreResult};
use crate::{plans, sessions};
use chrono::{DateTime, Utc};
use tokio::sync::watch;

pub type DbPool = SqlitePool;

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(config: &AppConfig) -> StoreResult<DbPool> {
  let db_path = &config.database_path;

  // Create directory if it doesn't exist
  if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent)?;
  }

  info!("Initializing database at: {}", db_path.display());

  let pool = connect(db_path, config.max_connections).await?;
  migrate(&pool).await?;

  info!("Database initialized successfully");

  Ok(pool)
}

/// Open a pool on a database file, creating it when missing
pub async fn connect(path: &Path, max_connections: u32) -> StoreResult<DbPool> {
  let options = SqliteConnectOptions::new()
    .filename(path)
    .create_if_missing(true)
    .foreign_keys(true);

  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect_with(options)
    .await?;

  Ok(pool)
}

pub async fn migrate(pool: &DbPool) -> StoreResult<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Workout Store
/// ---------------------------------------------------------------------------

/// SQLite-backed plan and session store.
///
/// All writes go through this type so that subscribers are notified after
/// each commit.
#[derive(Debug)]
pub struct WorkoutStore {
  pool: DbPool,
  plan_changes: ChangeFeed,
  session_changes: ChangeFeed,
}

impl WorkoutStore {
  pub fn new(pool: DbPool) -> Self {
    Self {
      pool,
      plan_changes: ChangeFeed::new(),
      session_changes: ChangeFeed::new(),
    }
  }

  pub fn pool(&self) -> &DbPool {
    &self.pool
  }

  // Plans

  pub async fn create_plan(&self, plan: &NewWorkoutPlan) -> StoreResult<PlanWithExercises> {
    let created = plans::create_plan(&self.pool, plan).await?;
    self.plan_changes.bump();
    Ok(created)
  }

  pub async fn load_plan(&self, plan_id: i64) -> StoreResult<PlanWithExercises> {
    plans::load_plan(&self.pool, plan_id).await
  }

  pub async fn rename_plan(&self, plan_id: i64, name: &str) -> StoreResult<()> {
    plans::rename_plan(&self.pool, plan_id, name).await?;
    self.plan_changes.bump();
    Ok(())
  }

  pub async fn set_weekly_goal(&self, plan_id: i64, goal: Option<u32>) -> StoreResult<()> {
    plans::set_weekly_goal(&self.pool, plan_id, goal).await?;
    self.plan_changes.bump();
    Ok(())
  }

  /// Delete a plan. Its exercise list goes with it and sessions logged
  /// against it become unassociated.
  pub async fn delete_plan(&self, plan_id: i64) -> StoreResult<()> {
    plans::delete_plan(&self.pool, plan_id).await?;
    self.plan_changes.bump();
    self.session_changes.bump();
    Ok(())
  }

  pub async fn add_plan_exercise(&self, plan_id: i64, exercise_name: &str) -> StoreResult<bool> {
    let added = plans::add_plan_exercise(&self.pool, plan_id, exercise_name).await?;
    if added {
      self.plan_changes.bump();
    }
    Ok(added)
  }

  pub async fn remove_plan_exercise(&self, plan_id: i64, exercise_name: &str) -> StoreResult<bool> {
    let removed = plans::remove_plan_exercise(&self.pool, plan_id, exercise_name).await?;
    if removed {
      self.plan_changes.bump();
    }
    Ok(removed)
  }

  // Sessions

  pub async fn log_session(&self, session: &NewWorkoutSession) -> StoreResult<WorkoutSession> {
    let logged = sessions::log_session(&self.pool, session).await?;
    self.session_changes.bump();
    Ok(logged)
  }

  pub async fn load_session(&self, session_id: i64) -> StoreResult<WorkoutSession> {
    sessions::load_session(&self.pool, session_id).await
  }

  pub async fn delete_session(&self, session_id: i64) -> StoreResult<()> {
    sessions::delete_session(&self.pool, session_id).await?;
    self.session_changes.bump();
    Ok(())
  }
}

#[async_trait::async_trait]
impl PlanSource for WorkoutStore {
  async fn list_plans_with_exercises(&self) -> StoreResult<Vec<PlanWithExercises>> {
    plans::list_plans_with_exercises(&self.pool).await
  }

  fn subscribe_plans(&self) -> watch::Receiver<u64> {
    self.plan_changes.subscribe()
  }
}

#[async_trait::async_trait]
impl SessionSource for WorkoutStore {
  async fn list_sessions_in_range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> StoreResult<Vec<WorkoutSession>> {
    sessions::list_sessions_in_range(&self.pool, start, end).await
  }

  fn subscribe_sessions(&self) -> watch::Receiver<u64> {
    self.session_changes.subscribe()
  }
}
