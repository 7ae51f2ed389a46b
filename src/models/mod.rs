pub mod plan;
pub mod report;
pub mod session;

pub use plan::{NewWorkoutPlan, PlanExercise, PlanWithExercises, WorkoutPlan};
pub use report::{ReportSnapshot, WeeklyCompletionReport};
pub use session::{ExerciseSet, NewWorkoutSession, WorkoutSession};
