//! Weekly Plan Completion
//!
//! For each plan, counts the days in the current week on which every
//! required exercise was logged against that plan at least once.
//!
//! Key rules:
//! - A session only counts toward the plan it was explicitly logged against
//! - A day completes a plan when its exercise-name set is a superset of the
//!   plan's requirement (extra exercises don't disqualify the day)
//! - A plan with no required exercises is never complete
//! - No goal means the goal is never met

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::{PlanWithExercises, WeeklyCompletionReport, WorkoutSession};
use crate::week::{Clock, WeekWindow};

/// Compute one report per plan, in input plan order.
///
/// `sessions` may include sessions outside `week`; those are ignored. Every
/// session timestamp is mapped to a local date exactly once per call.
pub fn compute_weekly_completion(
    plans: &[PlanWithExercises],
    sessions: &[WorkoutSession],
    week: &WeekWindow,
    clock: &dyn Clock,
) -> Vec<WeeklyCompletionReport> {
    let days = exercises_by_plan_and_day(sessions, week, clock);

    plans
        .iter()
        .map(|plan| {
            let completed = match days.get(&plan.id()) {
                Some(by_day) => count_completed_days(&plan.exercises, by_day),
                None => 0,
            };
            build_report(plan, completed)
        })
        .collect()
}

/// Index sessions inside the week as plan -> local date -> exercise names.
/// Sessions without a plan association are dropped here.
fn exercises_by_plan_and_day<'a>(
    sessions: &'a [WorkoutSession],
    week: &WeekWindow,
    clock: &dyn Clock,
) -> BTreeMap<i64, BTreeMap<NaiveDate, HashSet<&'a str>>> {
    let mut index: BTreeMap<i64, BTreeMap<NaiveDate, HashSet<&'a str>>> = BTreeMap::new();

    for session in sessions {
        let Some(plan_id) = session.plan_id else {
            continue;
        };
        let date = clock.local_date(session.timestamp);
        if !week.contains_date(date) {
            continue;
        }
        index
            .entry(plan_id)
            .or_default()
            .entry(date)
            .or_default()
            .insert(session.exercise_name.as_str());
    }

    index
}

fn count_completed_days(
    required: &[String],
    by_day: &BTreeMap<NaiveDate, HashSet<&str>>,
) -> u32 {
    if required.is_empty() {
        return 0;
    }
    let required: BTreeSet<&str> = required.iter().map(String::as_str).collect();

    by_day
        .values()
        .filter(|logged| required.iter().all(|name| logged.contains(name)))
        .count() as u32
}

fn build_report(plan: &PlanWithExercises, completed_days: u32) -> WeeklyCompletionReport {
    let goal_met = !plan.exercises.is_empty()
        && plan
            .plan
            .weekly_goal
            .is_some_and(|goal| completed_days >= goal);

    WeeklyCompletionReport {
        plan_id: plan.id(),
        plan_name: plan.plan.name.clone(),
        exercises: plan.exercises.clone(),
        weekly_goal: plan.plan.weekly_goal,
        completed_days_this_week: completed_days,
        goal_met,
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
