//! Store interfaces consumed by the completion engine
//!
//! Each store exposes a one-shot read plus a change subscription. The
//! subscription carries a version counter that is bumped after every
//! committed write; receivers only care that it moved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::models::{PlanWithExercises, WorkoutSession};

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Invalid data: {0}")]
  InvalidData(String),
}

impl Serialize for StoreError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// ---------------------------------------------------------------------------
/// Interfaces
/// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait PlanSource: Send + Sync {
  /// Current plan definitions with their required exercises
  async fn list_plans_with_exercises(&self) -> StoreResult<Vec<PlanWithExercises>>;

  /// Notified after every committed plan change
  fn subscribe_plans(&self) -> watch::Receiver<u64>;
}

#[async_trait::async_trait]
pub trait SessionSource: Send + Sync {
  /// Sessions with `start <= timestamp < end`
  async fn list_sessions_in_range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> StoreResult<Vec<WorkoutSession>>;

  /// Notified after every committed session change
  fn subscribe_sessions(&self) -> watch::Receiver<u64>;
}

/// Version counter shared by a store and its subscribers
#[derive(Debug)]
pub struct ChangeFeed {
  tx: watch::Sender<u64>,
}

impl ChangeFeed {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(0);
    Self { tx }
  }

  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.tx.subscribe()
  }

  /// Mark the store as changed. Works with or without live subscribers.
  pub fn bump(&self) {
    self.tx.send_modify(|version| *version = version.wrapping_add(1));
  }

  pub fn version(&self) -> u64 {
    *self.tx.borrow()
  }
}

impl Default for ChangeFeed {
  fn default() -> Self {
    Self::new()
  }
}
