//! The per-turn scheduler: the event forest's state machine.
//!
//! Each call to [`Scheduler::advance_turn`] runs five steps, in this order,
//! and each step sees what the earlier ones committed:
//!
//! 1. **Activate** -- every inactive node whose turn has come and whose
//!    required prerequisites hold joins the active set with fresh tasks.
//! 2. **Expire** -- active nodes past their expiration turn leave the
//!    active set, unless persistent or waiting on a branch decision.
//! 3. **Resolve** -- in-progress nodes with a passing automatic branch take
//!    it: follow-on events are scheduled and the node completes. Nodes with
//!    only manual branches wait for [`Scheduler::choose_branch`]. Branchless
//!    in-progress nodes complete once their completion conditions hold.
//! 4. **Cyclic tasks** -- runnable cyclic tasks of persistent nodes are
//!    surfaced to the caller.
//! 5. **Effects** -- durable world and character effects tick, run, and are
//!    pruned once spent.
//!
//! Task progress, manual branch choices, and effect registration arrive
//! between turns from gameplay systems. Lookup failures are logged and
//! returned as [`SchedulerError`] without touching state; evaluator and
//! executor failures are logged and treated as `false` / no result.
//!
//! The scheduler is single-threaded and not reentrant; callers serialize
//! access.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use saga_types::{
    BranchId, Effect, EffectId, EffectScope, EventBranch, EventId, EventNode, EventStatus,
    EventTree, TaskId, TreeId,
};
use tracing::{debug, info, warn};

use crate::branch::{self, AutoBranchPolicy};
use crate::config::SchedulerConfig;
use crate::evaluator::ConditionEvaluator;
use crate::executor::{self, EffectExecutor, WORLD_TARGET};
use crate::forest::{Forest, TreeInfo};
use crate::lifecycle::{self, Gate};
use crate::notification::{Notification, NotificationKind, Outbox};
use crate::state::GameState;

/// Failures of externally invoked operations. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The event is unknown or not in the active set.
    #[error("event {event_id} is not active")]
    EventNotActive {
        /// The requested event.
        event_id: EventId,
    },

    /// The event has no branch with this id.
    #[error("event {event_id} has no branch {branch_id}")]
    BranchNotFound {
        /// The event.
        event_id: EventId,
        /// The requested branch.
        branch_id: BranchId,
    },

    /// No active event owns a task with this id.
    #[error("no active event owns task {task_id}")]
    TaskNotFound {
        /// The requested task.
        task_id: TaskId,
    },

    /// The task's cooldown has not elapsed.
    #[error("task {task_id} on {event_id} is cooling down")]
    TaskOnCooldown {
        /// The task.
        task_id: TaskId,
        /// The node owning the copy that was hit.
        event_id: EventId,
    },

    /// A character effect was registered without a target character.
    #[error("character effect {effect_id} has no target")]
    MissingEffectTarget {
        /// The effect.
        effect_id: EffectId,
    },
}

/// A branch that was taken, automatically or by choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResolution {
    /// The parent event, now completed.
    pub event_id: EventId,
    /// The branch taken.
    pub branch_id: BranchId,
    /// Whether the engine took it on its own.
    pub automatic: bool,
    /// Follow-on events that were found and scheduled.
    pub scheduled: Vec<EventId>,
}

/// A cyclic task that may be worked on this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableTask {
    /// The persistent node owning the task.
    pub event_id: EventId,
    /// The task.
    pub task_id: TaskId,
}

/// Outcome of a progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    /// The task.
    pub task_id: TaskId,
    /// The node whose copy received the progress.
    pub event_id: EventId,
    /// Progress after the update.
    pub current_progress: u32,
    /// Threshold.
    pub required_progress: u32,
    /// Whether this update completed the task.
    pub newly_completed: bool,
    /// Nodes that moved to `InProgress` as a result.
    pub started: Vec<EventId>,
    /// Nodes that completed as a result.
    pub completed: Vec<EventId>,
}

/// Summary of a single turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnSummary {
    /// The turn that was processed.
    pub turn: u64,
    /// Nodes activated in step 1.
    pub activated: Vec<EventId>,
    /// Nodes expired in step 2.
    pub expired: Vec<EventId>,
    /// Automatic branches taken in step 3.
    pub branches_taken: Vec<BranchResolution>,
    /// Branchless nodes completed in step 3.
    pub completed: Vec<EventId>,
    /// In-progress nodes waiting on a manual choice after step 3.
    pub pending_decisions: Vec<EventId>,
    /// Cyclic tasks surfaced in step 4.
    pub runnable_tasks: Vec<RunnableTask>,
    /// Effects executed in step 5.
    pub effects_executed: Vec<EffectId>,
    /// Effects pruned in step 5.
    pub effects_expired: Vec<EffectId>,
    /// Size of the active set at end of turn.
    pub active_count: usize,
}

/// The event forest scheduler.
pub struct Scheduler {
    forest: Forest,
    active: BTreeSet<EventId>,
    completed: BTreeSet<EventId>,
    /// Nodes a taken branch has pointed at a concrete activation turn.
    scheduled: BTreeSet<EventId>,
    world_effects: Vec<Effect>,
    character_effects: Vec<Effect>,
    current_turn: u64,
    state: GameState,
    evaluator: Box<dyn ConditionEvaluator>,
    executor: Box<dyn EffectExecutor>,
    policy: AutoBranchPolicy,
    rng: StdRng,
    outbox: Outbox,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("current_turn", &self.current_turn)
            .field("events", &self.forest.len())
            .field("active", &self.active)
            .field("completed", &self.completed)
            .field("world_effects", &self.world_effects.len())
            .field("character_effects", &self.character_effects.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create an empty scheduler with injected capabilities.
    pub fn new(
        evaluator: Box<dyn ConditionEvaluator>,
        executor: Box<dyn EffectExecutor>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            forest: Forest::default(),
            active: BTreeSet::new(),
            completed: BTreeSet::new(),
            scheduled: BTreeSet::new(),
            world_effects: Vec::new(),
            character_effects: Vec::new(),
            current_turn: 0,
            state: GameState::new(),
            evaluator,
            executor,
            policy: config.auto_branch_policy,
            rng: StdRng::seed_from_u64(config.seed),
            outbox: Outbox::with_capacity(config.notification_capacity),
        }
    }

    // -----------------------------------------------------------------------
    // Forest setup
    // -----------------------------------------------------------------------

    /// Load a forest and activate every tree's root at `turn`.
    ///
    /// Roots bypass their activation turn and prerequisites. Any previously
    /// loaded forest and both indices are replaced. Returns the activated
    /// root ids in scan order.
    pub fn initialize_forest(
        &mut self,
        trees: impl IntoIterator<Item = EventTree>,
        turn: u64,
    ) -> Vec<EventId> {
        self.forest = Forest::build(trees);
        self.active.clear();
        self.completed.clear();
        self.scheduled.clear();
        self.current_turn = turn;

        let mut activated = Vec::new();
        for root in self.forest.roots() {
            if self.activate(&root, turn) {
                activated.push(root);
            }
        }

        info!(
            turn,
            trees = self.forest.trees().len(),
            events = self.forest.len(),
            roots_activated = activated.len(),
            "Event forest initialized"
        );
        activated
    }

    /// Move an inactive node into the active set with fresh tasks.
    ///
    /// A node whose required tasks are already all done (zero thresholds)
    /// moves straight on to `InProgress`.
    fn activate(&mut self, event_id: &EventId, turn: u64) -> bool {
        let Some(node) = self.forest.node_mut(event_id) else {
            warn!(turn, %event_id, "Cannot activate unknown event");
            return false;
        };
        if !node.advance_status(EventStatus::Active) {
            warn!(turn, %event_id, status = ?node.status, "Refusing to re-activate event");
            return false;
        }
        node.reset_for_activation();
        info!(turn, %event_id, name = %node.name, "Event activated");

        self.active.insert(event_id.clone());
        self.outbox.push(turn, event_id, NotificationKind::Activated);
        self.start_if_ready(event_id, turn);
        true
    }

    // -----------------------------------------------------------------------
    // Per-turn algorithm
    // -----------------------------------------------------------------------

    /// Run one turn.
    ///
    /// Turn numbers are expected to be non-decreasing; a regression is
    /// logged but processed anyway.
    pub fn advance_turn(&mut self, turn: u64) -> TurnSummary {
        if turn < self.current_turn {
            warn!(turn, previous = self.current_turn, "Turn number went backwards");
        }
        self.current_turn = turn;

        let activated = self.activate_due(turn);
        let expired = self.expire_stale(turn);
        let (branches_taken, pending_decisions) = self.resolve_auto_branches(turn);
        let completed = self.complete_ready(turn);
        let runnable_tasks = self.runnable_cyclic_tasks(turn);
        let (effects_executed, effects_expired) = self.tick_effects(turn);

        debug!(
            turn,
            activated = activated.len(),
            expired = expired.len(),
            branches = branches_taken.len(),
            completed = completed.len(),
            pending = pending_decisions.len(),
            runnable = runnable_tasks.len(),
            effects = effects_executed.len(),
            active = self.active.len(),
            "Turn processed"
        );

        TurnSummary {
            turn,
            activated,
            expired,
            branches_taken,
            completed,
            pending_decisions,
            runnable_tasks,
            effects_executed,
            effects_expired,
            active_count: self.active.len(),
        }
    }

    /// Step 1: activate every node that is due.
    fn activate_due(&mut self, turn: u64) -> Vec<EventId> {
        let due: Vec<EventId> = {
            let gate = Gate {
                turn,
                evaluator: self.evaluator.as_ref(),
                completed_events: &self.completed,
                state: &self.state,
            };
            self.forest
                .scan_order()
                .iter()
                .filter(|id| self.forest.node(id).is_some_and(|n| gate.can_activate(n)))
                .cloned()
                .collect()
        };

        due.into_iter().filter(|id| self.activate(id, turn)).collect()
    }

    /// Step 2: drop active nodes whose time is up.
    fn expire_stale(&mut self, turn: u64) -> Vec<EventId> {
        let stale: Vec<EventId> = self
            .active
            .iter()
            .filter(|id| {
                self.forest.node(id).is_some_and(|n| {
                    lifecycle::is_expired(n, turn) && !lifecycle::expiration_prevented(n)
                })
            })
            .cloned()
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for event_id in stale {
            let Some(node) = self.forest.node_mut(&event_id) else {
                continue;
            };
            if !node.advance_status(EventStatus::Expired) {
                warn!(turn, %event_id, status = ?node.status, "Refusing to expire event");
                continue;
            }
            info!(turn, %event_id, expiration_turn = node.expiration_turn, "Event expired");
            self.active.remove(&event_id);
            self.outbox.push(turn, &event_id, NotificationKind::Expired);
            expired.push(event_id);
        }
        expired
    }

    /// Step 3: take passing automatic branches; report manual ones waiting.
    fn resolve_auto_branches(&mut self, turn: u64) -> (Vec<BranchResolution>, Vec<EventId>) {
        let candidates: Vec<EventId> = self
            .active
            .iter()
            .filter(|id| {
                self.forest
                    .node(id)
                    .is_some_and(|n| n.status == EventStatus::InProgress && n.has_branches())
            })
            .cloned()
            .collect();

        let mut taken = Vec::new();
        let mut pending = Vec::new();
        for event_id in candidates {
            let choice = {
                let Some(node) = self.forest.node(&event_id) else {
                    continue;
                };
                let gate = Gate {
                    turn,
                    evaluator: self.evaluator.as_ref(),
                    completed_events: &self.completed,
                    state: &self.state,
                };
                branch::resolve_auto(node, &gate, self.policy, &mut self.rng)
            };

            match choice {
                Some(branch_id) => {
                    if let Some(resolution) = self.take_branch(&event_id, &branch_id, turn, true) {
                        taken.push(resolution);
                    }
                }
                None => {
                    if self.forest.node(&event_id).is_some_and(EventNode::has_manual_branches) {
                        debug!(turn, %event_id, "Decision pending, waiting for a manual choice");
                        pending.push(event_id);
                    }
                }
            }
        }
        (taken, pending)
    }

    /// Step 3, continued: branchless in-progress nodes whose completion
    /// conditions have come to hold.
    fn complete_ready(&mut self, turn: u64) -> Vec<EventId> {
        let waiting: Vec<EventId> = self
            .active
            .iter()
            .filter(|id| {
                self.forest
                    .node(id)
                    .is_some_and(|n| n.status == EventStatus::InProgress && !n.has_branches())
            })
            .cloned()
            .collect();
        waiting
            .into_iter()
            .filter(|id| self.try_complete(id, turn))
            .collect()
    }

    /// Step 4: cyclic tasks of persistent active nodes that may run now.
    fn runnable_cyclic_tasks(&self, turn: u64) -> Vec<RunnableTask> {
        let mut runnable = Vec::new();
        for event_id in &self.active {
            let Some(node) = self.forest.node(event_id) else {
                continue;
            };
            if !node.is_persistent {
                continue;
            }
            for task in node.cyclic_tasks.iter().filter(|t| t.can_execute(turn)) {
                debug!(turn, %event_id, task_id = %task.id, "Cyclic task runnable");
                runnable.push(RunnableTask {
                    event_id: event_id.clone(),
                    task_id: task.id.clone(),
                });
            }
        }
        runnable
    }

    /// Step 5: tick, run, and prune durable effects.
    fn tick_effects(&mut self, turn: u64) -> (Vec<EffectId>, Vec<EffectId>) {
        let mut world = std::mem::take(&mut self.world_effects);
        let mut character = std::mem::take(&mut self.character_effects);
        let mut executed = Vec::new();

        for (scope, effects) in [(EffectScope::World, &mut world), (EffectScope::Character, &mut character)] {
            for effect in effects.iter_mut() {
                if effect.is_expired() {
                    continue;
                }
                effect.update();
                if effect.is_expired() {
                    continue;
                }
                let target = effect_target(scope, effect);
                executor::execute_effect(self.executor.as_mut(), effect, target, turn, &mut self.state);
                executed.push(effect.id.clone());
            }
        }

        let mut expired = Vec::new();
        for effects in [&mut world, &mut character] {
            effects.retain(|effect| {
                if effect.is_expired() {
                    debug!(turn, effect_id = %effect.id, "Effect expired");
                    expired.push(effect.id.clone());
                    false
                } else {
                    true
                }
            });
        }

        self.world_effects = world;
        self.character_effects = character;
        (executed, expired)
    }

    // -----------------------------------------------------------------------
    // Branches and completion
    // -----------------------------------------------------------------------

    /// Manually take `branch_id` on the active event `event_id`.
    ///
    /// Schedules the branch's follow-on events relative to the current turn
    /// and completes the event.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::EventNotActive`] or
    /// [`SchedulerError::BranchNotFound`]; state is untouched in both cases.
    pub fn choose_branch(
        &mut self,
        event_id: &EventId,
        branch_id: &BranchId,
    ) -> Result<BranchResolution, SchedulerError> {
        let turn = self.current_turn;
        if !self.active.contains(event_id) {
            warn!(turn, %event_id, %branch_id, "Branch choice for an inactive event");
            return Err(SchedulerError::EventNotActive {
                event_id: event_id.clone(),
            });
        }
        let has_branch = self
            .forest
            .node(event_id)
            .is_some_and(|n| n.branch(branch_id).is_some());
        if !has_branch {
            warn!(turn, %event_id, %branch_id, "Unknown branch");
            return Err(SchedulerError::BranchNotFound {
                event_id: event_id.clone(),
                branch_id: branch_id.clone(),
            });
        }

        self.take_branch(event_id, branch_id, turn, false)
            .ok_or_else(|| SchedulerError::EventNotActive {
                event_id: event_id.clone(),
            })
    }

    /// Schedule a branch's follow-on events and complete its parent.
    fn take_branch(
        &mut self,
        event_id: &EventId,
        branch_id: &BranchId,
        turn: u64,
        automatic: bool,
    ) -> Option<BranchResolution> {
        let branch: EventBranch = self.forest.node(event_id)?.branch(branch_id)?.clone();
        let scheduled = self.schedule_next_events(&branch, turn);
        if scheduled.is_empty() && !branch.next_events.is_empty() {
            warn!(turn, %event_id, %branch_id, "Branch has no resolvable next events");
        }

        if let Some(node) = self.forest.node_mut(event_id) {
            node.current_branch = Some(branch_id.clone());
        }
        info!(turn, %event_id, %branch_id, automatic, scheduled = scheduled.len(), "Branch taken");
        self.outbox.push(
            turn,
            event_id,
            NotificationKind::BranchTaken {
                branch_id: branch_id.clone(),
                automatic,
                scheduled: scheduled.clone(),
            },
        );

        self.complete_event(event_id, turn);
        Some(BranchResolution {
            event_id: event_id.clone(),
            branch_id: branch_id.clone(),
            automatic,
            scheduled,
        })
    }

    /// Point each follow-on event's activation window at `turn + delay`.
    fn schedule_next_events(&mut self, branch: &EventBranch, turn: u64) -> Vec<EventId> {
        let mut scheduled = Vec::new();
        for next in &branch.next_events {
            let Some(target) = self.forest.node_mut(&next.event_id) else {
                warn!(turn, branch_id = %branch.id, event_id = %next.event_id, "Next event not found, skipping");
                continue;
            };
            target.activation_turn = turn.saturating_add(next.activation_delay);
            target.expiration_turn = target.activation_turn.saturating_add(target.duration);
            debug!(
                turn,
                event_id = %next.event_id,
                activation_turn = target.activation_turn,
                expiration_turn = target.expiration_turn,
                "Next event scheduled"
            );
            self.scheduled.insert(next.event_id.clone());
            scheduled.push(next.event_id.clone());
        }
        scheduled
    }

    /// Complete an event: run its one-shot effects and move it to the
    /// completed index.
    fn complete_event(&mut self, event_id: &EventId, turn: u64) -> bool {
        let Some(node) = self.forest.node_mut(event_id) else {
            return false;
        };
        if !node.advance_status(EventStatus::Completed) {
            warn!(turn, %event_id, status = ?node.status, "Refusing to complete event");
            return false;
        }
        let world_effects = node.world_effects.clone();
        let character_effects = node.character_effects.clone();
        let is_ending = node.is_ending;
        let ending_type = node.ending_type.clone();

        for effect in &world_effects {
            executor::execute_effect(self.executor.as_mut(), effect, WORLD_TARGET, turn, &mut self.state);
        }
        for effect in &character_effects {
            match effect.target.as_deref() {
                Some(target) => {
                    executor::execute_effect(self.executor.as_mut(), effect, target, turn, &mut self.state);
                }
                None => {
                    warn!(turn, %event_id, effect_id = %effect.id, "Completion effect has no target character, skipping");
                }
            }
        }

        self.active.remove(event_id);
        self.completed.insert(event_id.clone());
        info!(turn, %event_id, is_ending, ending_type = ?ending_type, "Event completed");
        self.outbox.push(turn, event_id, NotificationKind::Completed { is_ending });
        true
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Find the active node whose copy of `task_id` should receive progress:
    /// the first (by id) with an unfinished copy, else the first owner.
    fn task_owner(&self, task_id: &TaskId) -> Option<EventId> {
        let owners: Vec<&EventId> = self
            .active
            .iter()
            .filter(|id| self.forest.node(id).is_some_and(|n| n.owns_task(task_id)))
            .collect();
        owners
            .iter()
            .find(|id| {
                self.forest
                    .node(id)
                    .is_some_and(|n| n.tasks().any(|t| &t.id == task_id && !t.is_completed()))
            })
            .or_else(|| owners.first())
            .map(|id| (*id).clone())
    }

    /// Add `delta` progress to a task of an active event.
    ///
    /// If the task completes, every active node owning it recomputes its
    /// progress, may move to `InProgress`, and may complete.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::TaskNotFound`] when no active event owns the task,
    /// [`SchedulerError::TaskOnCooldown`] when its cooldown has not elapsed.
    pub fn update_task_progress(
        &mut self,
        task_id: &TaskId,
        delta: i64,
    ) -> Result<TaskUpdate, SchedulerError> {
        let turn = self.current_turn;
        let Some(event_id) = self.task_owner(task_id) else {
            warn!(turn, %task_id, "Progress for a task no active event owns");
            return Err(SchedulerError::TaskNotFound {
                task_id: task_id.clone(),
            });
        };
        let Some(task) = self
            .forest
            .node_mut(&event_id)
            .and_then(|n| n.tasks_mut(task_id).next())
        else {
            return Err(SchedulerError::TaskNotFound {
                task_id: task_id.clone(),
            });
        };

        if !task.is_completed() && !task.can_execute(turn) {
            warn!(turn, %task_id, %event_id, cooldown = task.cooldown, "Task is cooling down");
            return Err(SchedulerError::TaskOnCooldown {
                task_id: task_id.clone(),
                event_id,
            });
        }

        let before = task.current_progress;
        let newly_completed = task.update_progress(delta);
        if task.current_progress != before {
            task.record_execution(turn);
        }
        let current_progress = task.current_progress;
        let required_progress = task.required_progress;
        debug!(turn, %task_id, %event_id, current_progress, required_progress, "Task progress updated");

        let (started, completed) = if newly_completed {
            info!(turn, %task_id, %event_id, "Task completed");
            self.propagate_task_completion(task_id, turn)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(TaskUpdate {
            task_id: task_id.clone(),
            event_id,
            current_progress,
            required_progress,
            newly_completed,
            started,
            completed,
        })
    }

    /// Push a task straight to its threshold.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::update_task_progress`].
    pub fn complete_task(&mut self, task_id: &TaskId) -> Result<TaskUpdate, SchedulerError> {
        let remaining = self
            .task_owner(task_id)
            .and_then(|id| self.forest.node(&id))
            .and_then(|n| n.tasks().find(|t| &t.id == task_id && !t.is_completed()))
            .map_or(0, saga_types::Task::remaining);
        self.update_task_progress(task_id, i64::from(remaining))
    }

    /// Carry a task completion into every active node that owns it.
    fn propagate_task_completion(&mut self, task_id: &TaskId, turn: u64) -> (Vec<EventId>, Vec<EventId>) {
        let owners: Vec<EventId> = self
            .active
            .iter()
            .filter(|id| self.forest.node(id).is_some_and(|n| n.owns_task(task_id)))
            .cloned()
            .collect();

        let mut started = Vec::new();
        let mut completed = Vec::new();
        for event_id in owners {
            let Some(node) = self.forest.node_mut(&event_id) else {
                continue;
            };
            for copy in node.tasks_mut(task_id) {
                if !copy.is_completed() {
                    copy.mark_completed();
                }
            }
            node.note_completed_task(task_id);

            let Some(progress) = node.recompute_progress() else {
                debug!(turn, %event_id, %task_id, "Event has no required tasks, progress unchanged");
                continue;
            };
            debug!(turn, %event_id, progress, "Event progress updated");

            if self.start_if_ready(&event_id, turn) {
                started.push(event_id.clone());
            }

            if self.try_complete(&event_id, turn) {
                completed.push(event_id);
            }
        }
        (started, completed)
    }

    /// Move an active node to `InProgress` once every required task is done,
    /// announcing any manual decision it now waits on.
    fn start_if_ready(&mut self, event_id: &EventId, turn: u64) -> bool {
        let Some(node) = self.forest.node_mut(event_id) else {
            return false;
        };
        if node.status != EventStatus::Active || !node.all_required_complete() {
            return false;
        }
        node.advance_status(EventStatus::InProgress);
        info!(turn, %event_id, "Event in progress");
        let manual: Vec<BranchId> = node
            .branches
            .iter()
            .filter(|b| !b.is_auto())
            .map(|b| b.id.clone())
            .collect();
        self.outbox.push(turn, event_id, NotificationKind::Started);
        if !manual.is_empty() {
            self.outbox.push(
                turn,
                event_id,
                NotificationKind::DecisionPending { branches: manual },
            );
        }
        true
    }

    /// Complete a branchless node whose completion conditions hold.
    ///
    /// Nodes with branches are completed by branch resolution instead.
    fn try_complete(&mut self, event_id: &EventId, turn: u64) -> bool {
        let ready = {
            let Some(node) = self.forest.node(event_id) else {
                return false;
            };
            let gate = Gate {
                turn,
                evaluator: self.evaluator.as_ref(),
                completed_events: &self.completed,
                state: &self.state,
            };
            !node.has_branches() && gate.can_complete(node)
        };
        ready && self.complete_event(event_id, turn)
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    /// Register a durable world effect with a full turn budget.
    pub fn add_world_effect(&mut self, mut effect: Effect) {
        effect.restart();
        debug!(turn = self.current_turn, effect_id = %effect.id, duration = effect.duration, "World effect added");
        self.world_effects.push(effect);
    }

    /// Register a durable character effect with a full turn budget.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::MissingEffectTarget`] when the effect names no
    /// character; it is not registered.
    pub fn add_character_effect(&mut self, mut effect: Effect) -> Result<(), SchedulerError> {
        if effect.target.as_deref().is_none_or(str::is_empty) {
            warn!(turn = self.current_turn, effect_id = %effect.id, "Character effect without a target");
            return Err(SchedulerError::MissingEffectTarget { effect_id: effect.id });
        }
        effect.restart();
        debug!(
            turn = self.current_turn,
            effect_id = %effect.id,
            target = ?effect.target,
            duration = effect.duration,
            "Character effect added"
        );
        self.character_effects.push(effect);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The last turn passed to [`Scheduler::initialize_forest`] or
    /// [`Scheduler::advance_turn`].
    pub const fn current_turn(&self) -> u64 {
        self.current_turn
    }

    /// Active nodes, by id.
    pub fn active_events(&self) -> impl Iterator<Item = &EventNode> {
        self.active.iter().filter_map(|id| self.forest.node(id))
    }

    /// Completed nodes, by id.
    pub fn completed_events(&self) -> impl Iterator<Item = &EventNode> {
        self.completed.iter().filter_map(|id| self.forest.node(id))
    }

    /// Size of the active set.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Size of the completed index.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Whether `event_id` is in the active set.
    pub fn is_active(&self, event_id: &EventId) -> bool {
        self.active.contains(event_id)
    }

    /// Whether `event_id` is in the completed index.
    pub fn is_completed(&self, event_id: &EventId) -> bool {
        self.completed.contains(event_id)
    }

    /// Any node of the forest.
    pub fn event(&self, event_id: &EventId) -> Option<&EventNode> {
        self.forest.node(event_id)
    }

    /// Tree metadata.
    pub fn tree(&self, tree_id: &TreeId) -> Option<&TreeInfo> {
        self.forest.tree(tree_id)
    }

    /// The loaded forest.
    pub const fn forest(&self) -> &Forest {
        &self.forest
    }

    /// In-progress active nodes offering at least one manual branch.
    pub fn pending_decisions(&self) -> Vec<&EventNode> {
        self.active_events()
            .filter(|n| n.status == EventStatus::InProgress && n.has_manual_branches())
            .collect()
    }

    /// Whether a node marked as an ending has completed.
    pub fn ending_reached(&self) -> Option<&EventNode> {
        self.completed_events().find(|n| n.is_ending)
    }

    /// Whether nothing more can happen without outside input: no active
    /// node, and no inactive node due on a later turn.
    ///
    /// A node that some branch names as a follow-on only counts once a
    /// taken branch has scheduled it; until then its authored activation
    /// turn is a placeholder. `u64::MAX` never comes due.
    pub fn is_settled(&self) -> bool {
        self.active.is_empty()
            && !self.forest.scan_order().iter().any(|id| {
                self.forest.node(id).is_some_and(|n| {
                    n.status == EventStatus::Inactive
                        && n.activation_turn > self.current_turn
                        && n.activation_turn < u64::MAX
                        && (self.scheduled.contains(id) || !self.forest.is_branch_target(id))
                })
            })
    }

    /// Durable world effects.
    pub fn world_effects(&self) -> &[Effect] {
        &self.world_effects
    }

    /// Durable character effects.
    pub fn character_effects(&self) -> &[Effect] {
        &self.character_effects
    }

    /// Global game state.
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Global game state, writable by gameplay systems.
    pub const fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Take every pending notification, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.outbox.drain()
    }

    /// Notifications lost because nobody drained the outbox in time.
    pub const fn notifications_dropped(&self) -> u64 {
        self.outbox.dropped()
    }
}

/// Target string for a durable effect.
fn effect_target(scope: EffectScope, effect: &Effect) -> &str {
    match scope {
        EffectScope::World => WORLD_TARGET,
        EffectScope::Character => effect.target.as_deref().unwrap_or_default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use saga_types::{BranchType, EventCondition, EventType, GatedCondition, Task, TaskType};
    use serde_json::json;

    use super::*;
    use crate::evaluator::StateConditionEvaluator;
    use crate::executor::StateEffectExecutor;

    fn scheduler() -> Scheduler {
        Scheduler::new(
            Box::new(StateConditionEvaluator),
            Box::new(StateEffectExecutor),
            &SchedulerConfig::default(),
        )
    }

    fn id(s: &str) -> EventId {
        EventId::from(s)
    }

    fn node_with_task(event: &str, task: &str) -> EventNode {
        let mut node = EventNode::new(event, event, EventType::Main);
        node.required_tasks
            .push(Task::new(task, task, TaskType::Exploration, 10));
        node
    }

    #[test]
    fn initialize_activates_roots_regardless_of_gates() {
        let mut root = EventNode::new("root", "Root", EventType::Main);
        root.activation_turn = 50;
        root.prerequisites.push(GatedCondition::required(EventCondition::Never));
        let mut s = scheduler();
        let activated = s.initialize_forest(vec![EventTree::new("t", root)], 0);
        assert_eq!(activated, vec![id("root")]);
        assert!(s.is_active(&id("root")));
        assert_eq!(s.take_notifications().len(), 1);
    }

    #[test]
    fn completion_effects_run_once_on_completion() {
        let mut root = node_with_task("root", "scout");
        root.world_effects
            .push(Effect::new("reward", "add_vars", 0).with_parameter("renown", json!(3)));
        root.character_effects
            .push(Effect::new("xp", "add_vars", 0).with_parameter("xp", json!(10)).with_target("aster"));

        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);
        let update = s.complete_task(&TaskId::from("scout")).unwrap();

        assert!(update.newly_completed);
        assert_eq!(update.completed, vec![id("root")]);
        assert_eq!(s.state().get("renown"), Some(&json!(3)));
        assert_eq!(s.state().get("aster.xp"), Some(&json!(10)));
        assert!(s.is_completed(&id("root")));
        assert!(!s.is_active(&id("root")));
    }

    #[test]
    fn shared_task_ids_complete_every_owner() {
        let a = node_with_task("a", "shared");
        let b = node_with_task("b", "shared");
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("ta", a), EventTree::new("tb", b)], 0);

        let update = s.update_task_progress(&TaskId::from("shared"), 10).unwrap();
        assert_eq!(update.completed, vec![id("a"), id("b")]);
        assert_eq!(s.completed_count(), 2);
    }

    #[test]
    fn cooldown_rejects_early_progress() {
        let mut root = EventNode::new("root", "Root", EventType::Daily);
        let mut task = Task::new("train", "Train", TaskType::Training, 10);
        task.cooldown = 2;
        root.required_tasks.push(task);

        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);
        assert!(s.update_task_progress(&TaskId::from("train"), 1).is_ok());
        s.advance_turn(1);
        let err = s.update_task_progress(&TaskId::from("train"), 1);
        assert!(matches!(err, Err(SchedulerError::TaskOnCooldown { .. })));
        s.advance_turn(2);
        assert!(s.update_task_progress(&TaskId::from("train"), 1).is_ok());
    }

    #[test]
    fn no_op_progress_does_not_start_the_cooldown() {
        let mut root = EventNode::new("root", "Root", EventType::Daily);
        let mut task = Task::new("train", "Train", TaskType::Training, 10);
        task.cooldown = 2;
        root.required_tasks.push(task);

        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);
        let update = s.update_task_progress(&TaskId::from("train"), 0).unwrap();
        assert_eq!(update.current_progress, 0);
        assert!(s.update_task_progress(&TaskId::from("train"), -4).is_ok());
        s.advance_turn(1);
        let update = s.update_task_progress(&TaskId::from("train"), 3).unwrap();
        assert_eq!(update.current_progress, 3);
    }

    #[test]
    fn zero_threshold_tasks_start_the_event_on_activation() {
        let mut root = EventNode::new("root", "Root", EventType::Main);
        root.required_tasks
            .push(Task::new("arrive", "Arrive", TaskType::Exploration, 0));
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);

        let node = s.event(&id("root")).unwrap();
        assert_eq!(node.status, EventStatus::InProgress);
        assert_eq!(node.current_progress, 100);
        assert_eq!(node.completed_task_ids, vec![TaskId::from("arrive")]);

        let summary = s.advance_turn(1);
        assert_eq!(summary.completed, vec![id("root")]);
        assert!(s.is_completed(&id("root")));
    }

    #[test]
    fn zero_threshold_tasks_raise_the_decision_on_activation() {
        let mut root = EventNode::new("root", "Root", EventType::Main);
        root.required_tasks
            .push(Task::new("arrive", "Arrive", TaskType::Exploration, 0));
        root.branches.push(EventBranch::new("stay", BranchType::Manual));
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);

        let kinds: Vec<NotificationKind> = s.take_notifications().into_iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Activated,
                NotificationKind::Started,
                NotificationKind::DecisionPending {
                    branches: vec![BranchId::from("stay")]
                },
            ]
        );
        assert_eq!(s.pending_decisions().len(), 1);
    }

    #[test]
    fn parked_follow_ons_do_not_hold_the_story_open() {
        let mut festival = EventNode::new("festival", "Festival", EventType::World);
        festival.expiration_turn = 3;
        let mut parked = EventNode::new("parked", "Parked", EventType::World);
        parked.activation_turn = u64::MAX;

        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", festival).with_event(parked)], 0);
        for turn in 1..=10 {
            s.advance_turn(turn);
        }
        assert_eq!(s.active_count(), 0);
        assert!(s.is_settled());
    }

    #[test]
    fn untaken_branch_targets_do_not_hold_the_story_open() {
        let mut council = node_with_task("council", "hear");
        council
            .branches
            .push(EventBranch::new("a_left", BranchType::Manual).then("left_end", 1));
        council
            .branches
            .push(EventBranch::new("b_right", BranchType::Manual).then("right_end", 1));
        let mut left = EventNode::new("left_end", "Left", EventType::Main);
        left.activation_turn = 1000;
        left.duration = 2;
        let mut right = EventNode::new("right_end", "Right", EventType::Main);
        right.activation_turn = 1000;
        right.duration = 2;

        let mut s = scheduler();
        s.initialize_forest(
            vec![EventTree::new("t", council).with_event(left).with_event(right)],
            0,
        );
        s.complete_task(&TaskId::from("hear")).unwrap();
        s.choose_branch(&id("council"), &BranchId::from("a_left")).unwrap();
        assert_eq!(s.active_count(), 0);
        assert!(!s.is_settled(), "left_end is scheduled for turn 1");

        s.advance_turn(1);
        assert!(s.is_active(&id("left_end")));
        s.advance_turn(2);
        s.advance_turn(3);
        assert!(!s.is_active(&id("left_end")));
        assert_eq!(s.event(&id("right_end")).map(|n| n.status), Some(EventStatus::Inactive));
        assert!(s.is_settled());
    }

    #[test]
    fn authored_future_events_keep_the_story_open() {
        let mut festival = EventNode::new("festival", "Festival", EventType::World);
        festival.expiration_turn = 1;
        let mut omen = EventNode::new("omen", "Omen", EventType::World);
        omen.activation_turn = 5;

        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", festival).with_event(omen)], 0);
        s.advance_turn(1);
        assert_eq!(s.active_count(), 0);
        assert!(!s.is_settled());
    }

    #[test]
    fn undrained_notifications_overflow_is_counted() {
        let trees = (0..3).map(|i| {
            let name = format!("root{i}");
            EventTree::new(name.as_str(), EventNode::new(name.as_str(), "Root", EventType::Side))
        });
        let mut s = Scheduler::new(
            Box::new(StateConditionEvaluator),
            Box::new(StateEffectExecutor),
            &SchedulerConfig {
                notification_capacity: 2,
                ..SchedulerConfig::default()
            },
        );
        s.initialize_forest(trees, 0);
        assert_eq!(s.notifications_dropped(), 1);
        assert_eq!(s.take_notifications().len(), 2);
    }

    #[test]
    fn unknown_task_is_reported_without_changes() {
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", node_with_task("root", "x"))], 0);
        let err = s.update_task_progress(&TaskId::from("nope"), 5);
        assert_eq!(
            err,
            Err(SchedulerError::TaskNotFound {
                task_id: TaskId::from("nope")
            })
        );
        assert_eq!(s.event(&id("root")).map(|n| n.current_progress), Some(0));
    }

    #[test]
    fn character_effect_needs_a_target() {
        let mut s = scheduler();
        let err = s.add_character_effect(Effect::new("curse", "add_vars", 3));
        assert!(matches!(err, Err(SchedulerError::MissingEffectTarget { .. })));
        assert!(s.character_effects().is_empty());
        assert!(s.add_character_effect(Effect::new("curse", "add_vars", 3).with_target("aster")).is_ok());
        assert_eq!(s.character_effects().len(), 1);
    }

    #[test]
    fn unresolvable_next_event_is_skipped() {
        let mut root = node_with_task("root", "t");
        root.branches
            .push(EventBranch::new("b1", BranchType::Manual).then("ghost", 1));
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);
        s.complete_task(&TaskId::from("t")).unwrap();
        let resolution = s.choose_branch(&id("root"), &BranchId::from("b1")).unwrap();
        assert!(resolution.scheduled.is_empty());
        assert!(s.is_completed(&id("root")));
    }

    #[test]
    fn persistent_nodes_surface_cyclic_tasks() {
        let mut root = EventNode::new("market", "Market", EventType::World);
        root.is_persistent = true;
        root.cyclic_tasks
            .push(Task::new("trade", "Trade", TaskType::Production, 5));
        let mut s = scheduler();
        s.initialize_forest(vec![EventTree::new("t", root)], 0);

        let summary = s.advance_turn(1);
        assert_eq!(
            summary.runnable_tasks,
            vec![RunnableTask {
                event_id: id("market"),
                task_id: TaskId::from("trade"),
            }]
        );
    }
}
