//! Turn loop around the scheduler.
//!
//! [`run_story`] calls [`Scheduler::advance_turn`] once per turn until one
//! of the stop conditions holds:
//!
//! - **Max turns**: `run.max_turns` turns have been processed
//! - **Ending**: an event marked `is_ending` has completed
//! - **Settled**: nothing is active and nothing is scheduled for later
//!
//! Between turns the loop sleeps for `run.turn_interval_ms`.

use saga_core::config::RunConfig;
use saga_core::{Scheduler, TurnSummary};
use saga_types::{BranchId, EventId, TaskId};
use tracing::{debug, info, warn};

/// Why the run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEndReason {
    /// Reached the configured `max_turns` limit.
    MaxTurnsReached,
    /// An ending event completed.
    EndingReached {
        /// The ending event.
        event_id: EventId,
    },
    /// No event is active or scheduled.
    StorySettled,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    /// The reason the run ended.
    pub end_reason: RunEndReason,
    /// The last turn summary, if any turn ran.
    pub final_summary: Option<TurnSummary>,
    /// Total number of turns executed.
    pub total_turns: u64,
}

/// Callback invoked after each turn.
///
/// Receives the scheduler mutably so it can drain notifications or answer
/// pending decisions before the next turn.
pub trait TurnCallback {
    /// Called after a turn completes.
    fn on_turn(&mut self, summary: &TurnSummary, scheduler: &mut Scheduler);
}

/// Logs every notification the scheduler queued during the turn.
#[derive(Debug, Default)]
pub struct NotificationLogger {
    /// Notifications logged so far.
    pub logged: u64,
}

impl TurnCallback for NotificationLogger {
    fn on_turn(&mut self, summary: &TurnSummary, scheduler: &mut Scheduler) {
        for notification in scheduler.take_notifications() {
            match serde_json::to_string(&notification) {
                Ok(line) => info!(turn = summary.turn, notification = %line, "Story notification"),
                Err(e) => warn!(error = %e, "failed to serialize notification"),
            }
            self.logged = self.logged.saturating_add(1);
        }
        for event_id in &summary.pending_decisions {
            debug!(turn = summary.turn, %event_id, "Awaiting a manual branch choice");
        }
    }
}

/// Headless playthrough used when `run.autoplay` is set.
///
/// After each turn it finishes the first unfinished required task of every
/// active event, then answers every pending decision with its lowest-id
/// manual branch, then logs the notifications that produced.
#[derive(Debug, Default)]
pub struct Autoplay {
    /// Notification logging.
    pub logger: NotificationLogger,
    /// Tasks completed so far.
    pub tasks_completed: u64,
    /// Branches chosen so far.
    pub choices_made: u64,
}

impl TurnCallback for Autoplay {
    fn on_turn(&mut self, summary: &TurnSummary, scheduler: &mut Scheduler) {
        let work: Vec<TaskId> = scheduler
            .active_events()
            .filter_map(|n| n.required_tasks.iter().find(|t| !t.is_completed()))
            .map(|t| t.id.clone())
            .collect();
        for task_id in work {
            match scheduler.complete_task(&task_id) {
                Ok(update) if update.newly_completed => {
                    self.tasks_completed = self.tasks_completed.saturating_add(1);
                }
                Ok(_) => {}
                Err(e) => debug!(turn = summary.turn, %task_id, error = %e, "Autoplay skipped task"),
            }
        }

        let choices: Vec<(EventId, BranchId)> = scheduler
            .pending_decisions()
            .into_iter()
            .filter_map(|n| {
                n.branches
                    .iter()
                    .filter(|b| !b.is_auto())
                    .map(|b| &b.id)
                    .min()
                    .map(|b| (n.id.clone(), b.clone()))
            })
            .collect();
        for (event_id, branch_id) in choices {
            if scheduler.choose_branch(&event_id, &branch_id).is_ok() {
                info!(turn = summary.turn, %event_id, %branch_id, "Autoplay chose branch");
                self.choices_made = self.choices_made.saturating_add(1);
            }
        }

        self.logger.on_turn(summary, scheduler);
    }
}

/// Run the story until a stop condition is met.
///
/// The forest must already be initialized at `run.start_turn`; turns
/// `start_turn + 1` through `start_turn + max_turns` are processed.
pub async fn run_story(
    scheduler: &mut Scheduler,
    run: &RunConfig,
    callback: &mut dyn TurnCallback,
) -> RunResult {
    let mut last_summary: Option<TurnSummary> = None;
    let mut total_turns: u64 = 0;

    info!(
        start_turn = run.start_turn,
        max_turns = run.max_turns,
        turn_interval_ms = run.turn_interval_ms,
        "Story starting"
    );

    while total_turns < run.max_turns {
        total_turns = total_turns.saturating_add(1);
        let turn = run.start_turn.saturating_add(total_turns);
        let summary = scheduler.advance_turn(turn);

        callback.on_turn(&summary, scheduler);

        if let Some(ending) = scheduler.ending_reached() {
            info!(turn, event_id = %ending.id, ending_type = ?ending.ending_type, "Ending reached");
            return RunResult {
                end_reason: RunEndReason::EndingReached {
                    event_id: ending.id.clone(),
                },
                final_summary: Some(summary),
                total_turns,
            };
        }

        if scheduler.is_settled() {
            info!(turn, "Story settled, nothing active or scheduled");
            return RunResult {
                end_reason: RunEndReason::StorySettled,
                final_summary: Some(summary),
                total_turns,
            };
        }

        last_summary = Some(summary);

        if run.turn_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(run.turn_interval_ms)).await;
        }
    }

    info!(max_turns = run.max_turns, "Turn limit reached");
    RunResult {
        end_reason: RunEndReason::MaxTurnsReached,
        final_summary: last_summary,
        total_turns,
    }
}

/// Log the end of the run and a per-tree report.
pub fn log_story_end(result: &RunResult, scheduler: &Scheduler) {
    info!(
        reason = ?result.end_reason,
        total_turns = result.total_turns,
        final_turn = result.final_summary.as_ref().map(|s| s.turn),
        active = scheduler.active_count(),
        completed = scheduler.completed_count(),
        state_vars = scheduler.state().len(),
        "Story ended"
    );

    if result.final_summary.is_none() {
        warn!("Story ended with no turns executed");
    }

    let dropped = scheduler.notifications_dropped();
    if dropped > 0 {
        warn!(dropped, "Notifications were dropped before they could be logged");
    }

    for tree in scheduler.forest().trees().values() {
        let completed = tree
            .events
            .iter()
            .filter(|id| scheduler.is_completed(id))
            .count();
        let active = tree.events.iter().filter(|id| scheduler.is_active(id)).count();
        info!(
            tree_id = %tree.id,
            name = %tree.name,
            is_required = tree.is_required,
            events = tree.events.len(),
            completed,
            active,
            "Tree report"
        );
    }

    for node in scheduler.pending_decisions() {
        let branches: Vec<&str> = node.branches.iter().map(|b| b.id.as_str()).collect();
        warn!(event_id = %node.id, ?branches, "Decision left unanswered");
    }
}
