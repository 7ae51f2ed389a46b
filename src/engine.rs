//! Completion Engine Service
//!
//! Keeps a live weekly completion report in sync with the plan and session
//! stores. One background task owns the recomputation loop:
//!
//! - Plan changes, session changes, manual refreshes and the Monday rollover
//!   all feed one trigger
//! - At most one recomputation runs at a time; triggers that land while it
//!   runs collapse into a single follow-up against the latest inputs
//! - A failed store read keeps the last good report in place
//! - With no observers attached, recomputation is skipped until someone
//!   subscribes again

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::completion::compute_weekly_completion;
use crate::models::{PlanWithExercises, ReportSnapshot, WorkoutSession};
use crate::store::{ChangeFeed, PlanSource, SessionSource, StoreResult};
use crate::week::{Clock, WeekWindow};

/// Latest published report; `None` until the first successful recomputation
pub type LiveReport = Option<Arc<ReportSnapshot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Last report is current, nothing pending
    Idle,
    /// A recomputation is reading the stores
    Recomputing,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recomputing => write!(f, "recomputing"),
        }
    }
}

// ---------------------------------------------------------------------------
/// Engine Handle
// ---------------------------------------------------------------------------

/// Handle to the running engine. Dropping it stops the background task.
pub struct CompletionEngine {
    report_tx: Arc<watch::Sender<LiveReport>>,
    status_rx: watch::Receiver<EngineStatus>,
    refresh: Arc<ChangeFeed>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CompletionEngine {
    /// Start the engine on the current tokio runtime
    pub fn spawn(
        plans: Arc<dyn PlanSource>,
        sessions: Arc<dyn SessionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (report_tx, _) = watch::channel(None);
        let report_tx = Arc::new(report_tx);
        let (status_tx, status_rx) = watch::channel(EngineStatus::Idle);
        let refresh = Arc::new(ChangeFeed::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Subscribe before spawning so no trigger sent after this call is lost
        let triggers = Triggers {
            plans: plans.subscribe_plans(),
            sessions: sessions.subscribe_sessions(),
            refresh: refresh.subscribe(),
            plans_open: true,
            sessions_open: true,
        };

        let worker = Worker {
            plans,
            sessions,
            clock,
            report_tx: Arc::clone(&report_tx),
            status_tx,
            generation: 0,
        };

        info!("Starting completion engine");
        let task = tokio::spawn(worker.run(triggers, shutdown_rx));

        Self {
            report_tx,
            status_rx,
            refresh,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Subscribe to the live report.
    ///
    /// The receiver immediately holds the last published report (if any) and
    /// a fresh recomputation is requested.
    pub fn report(&self) -> watch::Receiver<LiveReport> {
        let rx = self.report_tx.subscribe();
        self.refresh();
        rx
    }

    /// Last published report without subscribing
    pub fn latest(&self) -> LiveReport {
        self.report_tx.borrow().clone()
    }

    /// Force one recomputation even if no data changed
    pub fn refresh(&self) {
        self.refresh.bump();
    }

    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    /// Stop the background task and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Completion engine task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for CompletionEngine {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
/// Worker
// ---------------------------------------------------------------------------

struct Triggers {
    plans: watch::Receiver<u64>,
    sessions: watch::Receiver<u64>,
    refresh: watch::Receiver<u64>,
    plans_open: bool,
    sessions_open: bool,
}

impl Triggers {
    /// Consume every pending trigger. Anything arriving after this call
    /// schedules exactly one follow-up.
    fn mark_seen(&mut self) {
        self.plans.borrow_and_update();
        self.sessions.borrow_and_update();
        self.refresh.borrow_and_update();
    }
}

struct Worker {
    plans: Arc<dyn PlanSource>,
    sessions: Arc<dyn SessionSource>,
    clock: Arc<dyn Clock>,
    report_tx: Arc<watch::Sender<LiveReport>>,
    status_tx: watch::Sender<EngineStatus>,
    generation: u64,
}

impl Worker {
    async fn run(mut self, mut triggers: Triggers, mut shutdown: oneshot::Receiver<()>) {
        let mut pending = true;

        loop {
            if pending {
                pending = false;
                // Consume triggers before counting observers: a subscriber that
                // arrives after this point leaves its refresh bump unseen
                triggers.mark_seen();
                if self.report_tx.receiver_count() == 0 {
                    debug!("No report observers, skipping recomputation");
                } else {
                    self.recompute().await;
                }
            }

            let until_rollover = self.until_next_week();

            tokio::select! {
                _ = &mut shutdown => break,
                changed = triggers.plans.changed(), if triggers.plans_open => match changed {
                    Ok(()) => pending = true,
                    Err(_) => {
                        warn!("Plan change feed closed");
                        triggers.plans_open = false;
                    }
                },
                changed = triggers.sessions.changed(), if triggers.sessions_open => match changed {
                    Ok(()) => pending = true,
                    Err(_) => {
                        warn!("Session change feed closed");
                        triggers.sessions_open = false;
                    }
                },
                changed = triggers.refresh.changed() => match changed {
                    Ok(()) => pending = true,
                    // The handle owns the refresh feed; it's gone, so are we
                    Err(_) => break,
                },
                _ = tokio::time::sleep(until_rollover) => {
                    info!("Week rolled over, recomputing");
                    pending = true;
                }
            }
        }

        info!("Completion engine stopped");
    }

    fn until_next_week(&self) -> std::time::Duration {
        let now = self.clock.now();
        let week = WeekWindow::containing(self.clock.as_ref(), now);
        (week.end - now).to_std().unwrap_or_default()
    }

    async fn recompute(&mut self) {
        self.status_tx.send_replace(EngineStatus::Recomputing);

        let now = self.clock.now();
        let week = WeekWindow::containing(self.clock.as_ref(), now);

        match self.read_inputs(&week).await {
            Ok((plans, sessions)) => {
                let reports = compute_weekly_completion(&plans, &sessions, &week, self.clock.as_ref());
                self.generation += 1;

                debug!(
                    generation = self.generation,
                    plans = reports.len(),
                    sessions = sessions.len(),
                    week = %week.monday,
                    "Published completion report"
                );

                let snapshot = ReportSnapshot {
                    generation: self.generation,
                    computed_at: now,
                    week,
                    plans: reports,
                };
                self.report_tx.send_replace(Some(Arc::new(snapshot)));
            }
            Err(e) => {
                warn!("Store read failed, keeping last report: {}", e);
            }
        }

        self.status_tx.send_replace(EngineStatus::Idle);
    }

    async fn read_inputs(
        &self,
        week: &WeekWindow,
    ) -> StoreResult<(Vec<PlanWithExercises>, Vec<WorkoutSession>)> {
        tokio::try_join!(
            self.plans.list_plans_with_exercises(),
            self.sessions.list_sessions_in_range(week.start, week.end),
        )
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
