use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One performed set. Reps are positive, weight is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
  pub reps: u32,
  pub weight: f64,
}

impl ExerciseSet {
  pub fn new(reps: u32, weight: f64) -> Self {
    Self { reps, weight }
  }

  pub fn is_valid(&self) -> bool {
    self.reps > 0 && self.weight.is_finite() && self.weight >= 0.0
  }
}

/// A single logged performance of one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
  pub id: i64,
  pub exercise_name: String,
  pub timestamp: DateTime<Utc>,
  /// Plan this session was logged against, if any
  pub plan_id: Option<i64>,
  pub sets: Vec<ExerciseSet>,
}

/// For inserting new sessions (without id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutSession {
  pub exercise_name: String,
  pub timestamp: DateTime<Utc>,
  pub plan_id: Option<i64>,
  pub sets: Vec<ExerciseSet>,
}

impl NewWorkoutSession {
  pub fn new(exercise_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
    Self {
      exercise_name: exercise_name.into(),
      timestamp,
      plan_id: None,
      sets: Vec::new(),
    }
  }

  pub fn for_plan(mut self, plan_id: i64) -> Self {
    self.plan_id = Some(plan_id);
    self
  }

  pub fn with_set(mut self, reps: u32, weight: f64) -> Self {
    self.sets.push(ExerciseSet::new(reps, weight));
    self
  }
}
