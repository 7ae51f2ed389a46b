use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::week::WeekWindow;

/// Per-plan completion for the current week. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCompletionReport {
  pub plan_id: i64,
  pub plan_name: String,
  /// Snapshot of the plan's required exercise names
  pub exercises: Vec<String>,
  pub weekly_goal: Option<u32>,
  pub completed_days_this_week: u32,
  pub goal_met: bool,
}

/// One published recomputation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
  /// Increases by one on every publication
  pub generation: u64,
  pub computed_at: DateTime<Utc>,
  pub week: WeekWindow,
  pub plans: Vec<WeeklyCompletionReport>,
}

impl ReportSnapshot {
  pub fn plan(&self, plan_id: i64) -> Option<&WeeklyCompletionReport> {
    self.plans.iter().find(|r| r.plan_id == plan_id)
  }
}
