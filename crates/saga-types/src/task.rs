//! Tasks: trackable units of progress owned by event nodes.
//!
//! A task is the atomic trigger for event advancement. Progress only ever
//! grows through [`Task::update_progress`] and is capped at
//! `required_progress`; reaching the cap completes the task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{TaskStatus, TaskType};
use crate::ids::TaskId;

/// One measurable goal inside a task. Informational for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Objective {
    /// Free-form objective kind (`"collect"`, `"defeat"`, ...).
    #[serde(rename = "type")]
    pub objective_type: String,
    /// What the objective is about (item, npc, location id).
    pub target: String,
    /// Amount required.
    pub required: u32,
    /// Amount achieved so far.
    #[serde(default)]
    pub current: u32,
    /// Free-form parameters for gameplay systems.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Something granted when a task completes. Mapping onto game mechanics is
/// left to gameplay systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Reward {
    /// Free-form reward kind (`"item"`, `"reputation"`, ...).
    #[serde(rename = "type")]
    pub reward_type: String,
    /// What is granted.
    pub target: String,
    /// How much is granted.
    #[serde(default)]
    pub amount: i64,
}

/// A unit of progress with a completion threshold.
///
/// Invariant: `status == Completed` exactly when
/// `current_progress >= required_progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Task {
    /// Task id; several nodes may own a task with the same id.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Gameplay category.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Measurable goals.
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// Progress needed to complete.
    pub required_progress: u32,
    /// Progress so far, in `0..=required_progress`.
    #[serde(default)]
    pub current_progress: u32,
    /// Current status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Granted on completion by gameplay systems.
    #[serde(default)]
    pub rewards: Vec<Reward>,
    /// Weight of this task when players vote on what to pursue.
    #[serde(default)]
    pub vote_weight: u32,
    /// Minimum turns between executions; 0 disables the cooldown.
    #[serde(default)]
    pub cooldown: u64,
    /// Turn of the last accepted progress update.
    #[serde(default)]
    pub last_execution_turn: Option<u64>,
}

impl Task {
    /// Create a task with no objectives or rewards.
    ///
    /// A zero threshold is met from the start, so such a task begins
    /// `Completed`.
    pub fn new(
        id: impl Into<TaskId>,
        name: impl Into<String>,
        task_type: TaskType,
        required_progress: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            task_type,
            objectives: Vec::new(),
            required_progress,
            current_progress: 0,
            status: initial_status(required_progress),
            rewards: Vec::new(),
            vote_weight: 0,
            cooldown: 0,
            last_execution_turn: None,
        }
    }

    /// Whether the task has reached its threshold.
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Whether the task may be worked on during `turn`.
    ///
    /// False once completed, and false while `turn - last_execution_turn`
    /// is below a non-zero cooldown.
    pub fn can_execute(&self, turn: u64) -> bool {
        if self.is_completed() {
            return false;
        }
        match self.last_execution_turn {
            Some(last) if self.cooldown > 0 => turn.saturating_sub(last) >= self.cooldown,
            _ => true,
        }
    }

    /// Progress still needed to reach the threshold.
    pub const fn remaining(&self) -> u32 {
        self.required_progress.saturating_sub(self.current_progress)
    }

    /// Add `delta` to the progress, capped at `required_progress`.
    ///
    /// Negative deltas are accepted and ignored; progress never decreases.
    /// Returns `true` when this call completed the task.
    pub fn update_progress(&mut self, delta: i64) -> bool {
        let was_completed = self.is_completed();
        let gain = u32::try_from(delta.max(0)).unwrap_or(u32::MAX);
        self.current_progress = self
            .current_progress
            .saturating_add(gain)
            .min(self.required_progress);

        if self.current_progress >= self.required_progress {
            self.status = TaskStatus::Completed;
        } else if self.current_progress > 0 {
            self.status = TaskStatus::InProgress;
        }

        !was_completed && self.is_completed()
    }

    /// Jump straight to the threshold.
    pub fn mark_completed(&mut self) {
        self.current_progress = self.required_progress;
        self.status = TaskStatus::Completed;
    }

    /// Remember the turn of an accepted progress update.
    pub const fn record_execution(&mut self, turn: u64) {
        self.last_execution_turn = Some(turn);
    }

    /// Back to zero progress, as on node activation. The task is
    /// `NotStarted` unless its threshold is zero.
    pub fn reset(&mut self) {
        self.current_progress = 0;
        self.status = initial_status(self.required_progress);
        self.last_execution_turn = None;
        for objective in &mut self.objectives {
            objective.current = 0;
        }
    }
}

const fn initial_status(required_progress: u32) -> TaskStatus {
    if required_progress == 0 {
        TaskStatus::Completed
    } else {
        TaskStatus::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(required: u32) -> Task {
        Task::new("t", "Test task", TaskType::Collection, required)
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut t = task(100);
        let mut last = 0;
        for delta in [0, 10, 35, 0, 40, 50, 7] {
            t.update_progress(delta);
            assert!(t.current_progress >= last);
            assert!(t.current_progress <= t.required_progress);
            last = t.current_progress;
        }
        assert_eq!(t.current_progress, 100);
        assert!(t.is_completed());
    }

    #[test]
    fn negative_delta_never_decreases_progress() {
        let mut t = task(10);
        t.update_progress(4);
        t.update_progress(-3);
        assert_eq!(t.current_progress, 4);
        assert_eq!(t.status, TaskStatus::InProgress);
    }

    #[test]
    fn completion_reported_once() {
        let mut t = task(5);
        assert!(!t.update_progress(4));
        assert!(t.update_progress(1));
        assert!(!t.update_progress(1));
    }

    #[test]
    fn status_matches_threshold() {
        let mut t = task(3);
        assert_eq!(t.status, TaskStatus::NotStarted);
        t.update_progress(2);
        assert_eq!(t.status == TaskStatus::Completed, t.current_progress >= t.required_progress);
        t.update_progress(1);
        assert_eq!(t.status == TaskStatus::Completed, t.current_progress >= t.required_progress);
    }

    #[test]
    fn zero_threshold_task_starts_completed() {
        let mut t = task(0);
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.status == TaskStatus::Completed, t.current_progress >= t.required_progress);
        assert!(!t.update_progress(3));
        assert_eq!(t.current_progress, 0);
        t.reset();
        assert!(t.is_completed());
        assert!(!t.can_execute(0));
    }

    #[test]
    fn cooldown_gates_execution() {
        let mut t = task(10);
        t.cooldown = 3;
        assert!(t.can_execute(0));
        t.record_execution(5);
        assert!(!t.can_execute(6));
        assert!(!t.can_execute(7));
        assert!(t.can_execute(8));
    }

    #[test]
    fn completed_task_cannot_execute() {
        let mut t = task(1);
        t.update_progress(1);
        assert!(!t.can_execute(100));
    }

    #[test]
    fn reset_clears_progress_and_objectives() {
        let mut t = task(10);
        t.objectives.push(Objective {
            objective_type: String::from("collect"),
            target: String::from("wood"),
            required: 10,
            current: 6,
            parameters: BTreeMap::new(),
        });
        t.update_progress(10);
        t.record_execution(2);
        t.reset();
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.current_progress, 0);
        assert_eq!(t.last_execution_turn, None);
        assert_eq!(t.objectives.first().map(|o| o.current), Some(0));
    }
}
