use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutPlan {
  pub id: i64,
  pub name: String,
  /// Minimum completed days per week; `None` means the goal is never met
  pub weekly_goal: Option<u32>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// For inserting new plans (without id, timestamps)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkoutPlan {
  pub name: String,
  pub weekly_goal: Option<u32>,
  pub exercises: Vec<String>,
}

/// Plan <-> exercise-name association, keyed by (plan_id, exercise_name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanExercise {
  pub plan_id: i64,
  pub exercise_name: String,
}

/// A plan together with its required exercise names, sorted and deduplicated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWithExercises {
  pub plan: WorkoutPlan,
  pub exercises: Vec<String>,
}

impl PlanWithExercises {
  pub fn new(plan: WorkoutPlan, exercises: impl IntoIterator<Item = String>) -> Self {
    let mut exercises: Vec<String> = exercises.into_iter().collect();
    exercises.sort();
    exercises.dedup();
    Self { plan, exercises }
  }

  pub fn id(&self) -> i64 {
    self.plan.id
  }
}
