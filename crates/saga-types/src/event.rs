//! Event nodes, branches, and trees.
//!
//! Nodes reference each other by [`EventId`] only; branches name follow-on
//! events rather than owning them, which keeps the (possibly cyclic) story
//! graph flat and lets the scheduler hold every node in a single id-keyed
//! arena.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::condition::{EventCondition, GatedCondition};
use crate::effect::Effect;
use crate::enums::{BranchType, EventStatus, EventType};
use crate::ids::{BranchId, EventId, TaskId, TreeId};
use crate::task::Task;

/// A follow-on event scheduled when a branch is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NextEvent {
    /// The event to schedule.
    pub event_id: EventId,
    /// Turns after the branch resolution at which it becomes due.
    #[serde(default)]
    pub activation_delay: u64,
}

/// A decision point inside an in-progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventBranch {
    /// Branch id, unique within its node.
    pub id: BranchId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Manual or automatic.
    #[serde(rename = "type", default)]
    pub branch_type: BranchType,
    /// Predicates that must hold for an automatic branch to be taken.
    #[serde(default)]
    pub enable_conditions: Vec<EventCondition>,
    /// Events scheduled when the branch is taken.
    #[serde(default)]
    pub next_events: Vec<NextEvent>,
    /// Pre-script predicates, consulted only when `enable_conditions` is empty.
    #[serde(default)]
    pub conditions: Vec<EventCondition>,
    /// Relative weight for the weighted selection policy.
    #[serde(default)]
    pub probability: f64,
}

impl EventBranch {
    /// Create a branch with no conditions and no follow-on events.
    pub fn new(id: impl Into<BranchId>, branch_type: BranchType) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            branch_type,
            enable_conditions: Vec::new(),
            next_events: Vec::new(),
            conditions: Vec::new(),
            probability: 0.0,
        }
    }

    /// Add a follow-on event.
    #[must_use]
    pub fn then(mut self, event_id: impl Into<EventId>, activation_delay: u64) -> Self {
        self.next_events.push(NextEvent {
            event_id: event_id.into(),
            activation_delay,
        });
        self
    }

    /// Add an enable condition.
    #[must_use]
    pub fn when(mut self, condition: EventCondition) -> Self {
        self.enable_conditions.push(condition);
        self
    }

    /// Whether the engine may take this branch on its own.
    pub fn is_auto(&self) -> bool {
        self.branch_type == BranchType::Auto
    }
}

/// One state-machine instance in the progression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventNode {
    /// Event id, unique across the forest.
    pub id: EventId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Narrative category.
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    /// Earliest turn at which the node may activate.
    #[serde(default)]
    pub activation_turn: u64,
    /// Turn at which a non-persistent node expires.
    #[serde(default = "never")]
    pub expiration_turn: u64,
    /// Lifetime in turns, used when a branch schedules this node.
    #[serde(default)]
    pub duration: u64,
    /// Persistent nodes never expire by turn count.
    #[serde(default)]
    pub is_persistent: bool,
    /// Lifecycle status.
    #[serde(default)]
    pub status: EventStatus,
    /// Share of required tasks completed, 0 to 100.
    #[serde(default)]
    pub current_progress: u32,
    /// Ids of tasks completed since activation, in completion order.
    #[serde(default)]
    pub completed_task_ids: Vec<TaskId>,
    /// Tasks that must all complete for the node to move to `InProgress`.
    #[serde(default)]
    pub required_tasks: Vec<Task>,
    /// Repeatable tasks surfaced every turn while a persistent node is active.
    #[serde(default)]
    pub cyclic_tasks: Vec<Task>,
    /// Decision points available once the node is in progress.
    #[serde(default)]
    pub branches: Vec<EventBranch>,
    /// The branch that resolved this node, if any.
    #[serde(default)]
    pub current_branch: Option<BranchId>,
    /// Activation gates.
    #[serde(default)]
    pub prerequisites: Vec<GatedCondition>,
    /// Completion gates.
    #[serde(default)]
    pub completion_conditions: Vec<GatedCondition>,
    /// One-shot world effects applied on completion.
    #[serde(default)]
    pub world_effects: Vec<Effect>,
    /// One-shot character effects applied on completion.
    #[serde(default)]
    pub character_effects: Vec<Effect>,
    /// Whether completing this node ends the story.
    #[serde(default)]
    pub is_ending: bool,
    /// Free-form ending label.
    #[serde(default)]
    pub ending_type: Option<String>,
}

const fn never() -> u64 {
    u64::MAX
}

impl EventNode {
    /// Create an inactive node that is due at turn 0 and never expires.
    pub fn new(id: impl Into<EventId>, name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            event_type,
            activation_turn: 0,
            expiration_turn: never(),
            duration: 0,
            is_persistent: false,
            status: EventStatus::Inactive,
            current_progress: 0,
            completed_task_ids: Vec::new(),
            required_tasks: Vec::new(),
            cyclic_tasks: Vec::new(),
            branches: Vec::new(),
            current_branch: None,
            prerequisites: Vec::new(),
            completion_conditions: Vec::new(),
            world_effects: Vec::new(),
            character_effects: Vec::new(),
            is_ending: false,
            ending_type: None,
        }
    }

    /// Whether the node has at least one branch.
    pub fn has_branches(&self) -> bool {
        !self.branches.is_empty()
    }

    /// Whether any manual branch is waiting on an external choice.
    pub fn has_manual_branches(&self) -> bool {
        self.branches.iter().any(|b| !b.is_auto())
    }

    /// Look up a branch by id.
    pub fn branch(&self, branch_id: &BranchId) -> Option<&EventBranch> {
        self.branches.iter().find(|b| &b.id == branch_id)
    }

    /// Whether a required or cyclic task with this id belongs to the node.
    pub fn owns_task(&self, task_id: &TaskId) -> bool {
        self.tasks().any(|t| &t.id == task_id)
    }

    /// Required tasks followed by cyclic tasks.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.required_tasks.iter().chain(self.cyclic_tasks.iter())
    }

    /// Mutable access to every task with this id (required first).
    pub fn tasks_mut<'a>(&'a mut self, task_id: &'a TaskId) -> impl Iterator<Item = &'a mut Task> {
        self.required_tasks
            .iter_mut()
            .chain(self.cyclic_tasks.iter_mut())
            .filter(move |t| &t.id == task_id)
    }

    /// Whether every required task is complete. False when there are none.
    pub fn all_required_complete(&self) -> bool {
        !self.required_tasks.is_empty() && self.required_tasks.iter().all(Task::is_completed)
    }

    /// Recompute `current_progress` from the required tasks.
    ///
    /// Returns the new value, or `None` (leaving progress untouched) when the
    /// node has no required tasks.
    pub fn recompute_progress(&mut self) -> Option<u32> {
        let total = u32::try_from(self.required_tasks.len()).ok()?;
        if total == 0 {
            return None;
        }
        let done = u32::try_from(self.required_tasks.iter().filter(|t| t.is_completed()).count())
            .ok()?;
        let progress = done.checked_mul(100)?.checked_div(total)?;
        self.current_progress = progress;
        Some(progress)
    }

    /// Record a completed task id once.
    pub fn note_completed_task(&mut self, task_id: &TaskId) {
        if !self.completed_task_ids.contains(task_id) {
            self.completed_task_ids.push(task_id.clone());
        }
    }

    /// Move to `next` if the forward-only rule allows it.
    ///
    /// Returns whether the status changed.
    pub fn advance_status(&mut self, next: EventStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Clear per-activation state: tasks reset, progress and branch choice
    /// cleared. Required tasks with a zero threshold count as done at once.
    pub fn reset_for_activation(&mut self) {
        for task in self.required_tasks.iter_mut().chain(self.cyclic_tasks.iter_mut()) {
            task.reset();
        }
        self.completed_task_ids.clear();
        self.current_progress = 0;
        self.current_branch = None;

        let done: Vec<TaskId> = self
            .required_tasks
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| t.id.clone())
            .collect();
        for task_id in &done {
            self.note_completed_task(task_id);
        }
        self.recompute_progress();
    }
}

/// A rooted, prioritized collection of event nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventTree {
    /// Tree id.
    pub id: TreeId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Narrative category.
    #[serde(rename = "type", default)]
    pub tree_type: EventType,
    /// Higher priority trees are scanned first.
    #[serde(default)]
    pub priority: i32,
    /// Whether the story needs this tree to settle before it can end.
    #[serde(default)]
    pub is_required: bool,
    /// Activated unconditionally when the forest is initialized.
    pub root_event: EventNode,
    /// Every node of the tree; may repeat the root.
    #[serde(default)]
    pub all_events: Vec<EventNode>,
    /// Advisory ordering hints, event id to the ids it depends on.
    #[serde(default)]
    pub event_dependencies: BTreeMap<EventId, Vec<EventId>>,
}

impl EventTree {
    /// Create a tree holding only its root.
    pub fn new(id: impl Into<TreeId>, root_event: EventNode) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            tree_type: root_event.event_type,
            priority: 0,
            is_required: false,
            root_event,
            all_events: Vec::new(),
            event_dependencies: BTreeMap::new(),
        }
    }

    /// Add a non-root node.
    #[must_use]
    pub fn with_event(mut self, node: EventNode) -> Self {
        self.all_events.push(node);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enums::TaskType;

    fn node_with_tasks(n: usize) -> EventNode {
        let mut node = EventNode::new("n", "Node", EventType::Side);
        for i in 0..n {
            node.required_tasks
                .push(Task::new(format!("t{i}"), "task", TaskType::Dialogue, 1));
        }
        node
    }

    #[test]
    fn progress_is_share_of_completed_required_tasks() {
        let mut node = node_with_tasks(3);
        if let Some(t) = node.required_tasks.first_mut() {
            t.update_progress(1);
        }
        assert_eq!(node.recompute_progress(), Some(33));
        assert!(!node.all_required_complete());
        for t in &mut node.required_tasks {
            t.update_progress(1);
        }
        assert_eq!(node.recompute_progress(), Some(100));
        assert!(node.all_required_complete());
    }

    #[test]
    fn progress_untouched_without_required_tasks() {
        let mut node = node_with_tasks(0);
        node.current_progress = 7;
        assert_eq!(node.recompute_progress(), None);
        assert_eq!(node.current_progress, 7);
        assert!(!node.all_required_complete());
    }

    #[test]
    fn completed_task_ids_are_unique() {
        let mut node = node_with_tasks(1);
        let id = TaskId::from("t0");
        node.note_completed_task(&id);
        node.note_completed_task(&id);
        assert_eq!(node.completed_task_ids.len(), 1);
    }

    #[test]
    fn advance_status_refuses_backward_moves() {
        let mut node = node_with_tasks(0);
        assert!(node.advance_status(EventStatus::Active));
        assert!(node.advance_status(EventStatus::InProgress));
        assert!(!node.advance_status(EventStatus::Active));
        assert_eq!(node.status, EventStatus::InProgress);
    }

    #[test]
    fn reset_for_activation_clears_tasks() {
        let mut node = node_with_tasks(2);
        for t in &mut node.required_tasks {
            t.update_progress(1);
        }
        node.recompute_progress();
        node.note_completed_task(&TaskId::from("t0"));
        node.reset_for_activation();
        assert!(node.required_tasks.iter().all(|t| !t.is_completed()));
        assert!(node.completed_task_ids.is_empty());
        assert_eq!(node.current_progress, 0);
    }

    #[test]
    fn zero_threshold_tasks_count_on_activation() {
        let mut node = node_with_tasks(2);
        if let Some(t) = node.required_tasks.first_mut() {
            t.required_progress = 0;
        }
        node.reset_for_activation();
        assert_eq!(node.completed_task_ids, vec![TaskId::from("t0")]);
        assert_eq!(node.current_progress, 50);
        assert!(!node.all_required_complete());
    }

    #[test]
    fn node_defaults_from_yaml() {
        let node: EventNode = serde_yml::from_str("id: intro\n").unwrap();
        assert_eq!(node.id.as_str(), "intro");
        assert_eq!(node.status, EventStatus::Inactive);
        assert_eq!(node.expiration_turn, u64::MAX);
    }
}
