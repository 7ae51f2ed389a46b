pub mod completion;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod plans;
pub mod sessions;
pub mod store;
pub mod week;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;
use tracing::{info, warn};

use config::AppConfig;
use db::WorkoutStore;
use engine::CompletionEngine;
use week::SystemClock;

pub use completion::compute_weekly_completion;
pub use engine::{EngineStatus, LiveReport};
pub use models::{ReportSnapshot, WeeklyCompletionReport};
pub use store::{PlanSource, SessionSource, StoreError};
pub use week::{Clock, WeekWindow};

/// Install the fmt subscriber. RUST_LOG wins over the configured filter.
pub fn init_tracing(default_filter: &str) {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
    )
    .with_target(false)
    .with_line_number(true)
    .init();
}

/// Open the database, start the engine and log every published report
/// until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
  let pool = db::initialize_db(&config).await?;
  let store = Arc::new(WorkoutStore::new(pool));
  info!("Database ready");

  let engine = CompletionEngine::spawn(store.clone(), store.clone(), Arc::new(SystemClock));
  let mut reports = engine.report();

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        info!("Shutting down");
        break;
      }
      changed = reports.changed() => {
        if changed.is_err() {
          warn!("Report feed closed");
          break;
        }
        let snapshot = reports.borrow_and_update().clone();
        if let Some(snapshot) = snapshot {
          info!(
            generation = snapshot.generation,
            week = %snapshot.week.monday,
            "{}",
            serde_json::to_string(&snapshot.plans)?
          );
        }
      }
    }
  }

  engine.shutdown().await;
  store.pool().close().await;

  Ok(())
}
