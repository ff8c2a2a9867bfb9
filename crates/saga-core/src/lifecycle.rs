//! Lifecycle checks for event nodes.
//!
//! These are pure queries: evaluating them never changes a node. The
//! scheduler is the only place transitions are committed.

use std::collections::BTreeSet;

use saga_types::{EventId, EventNode, EventStatus, required_conditions};

use crate::evaluator::{self, ConditionContext, ConditionEvaluator, ConditionSite};
use crate::state::GameState;

/// The read-only environment a lifecycle check runs in.
#[derive(Clone, Copy)]
pub struct Gate<'a> {
    /// The turn being processed.
    pub turn: u64,
    /// Predicate evaluator.
    pub evaluator: &'a dyn ConditionEvaluator,
    /// Ids in the completed index.
    pub completed_events: &'a BTreeSet<EventId>,
    /// Global game state.
    pub state: &'a GameState,
}

impl Gate<'_> {
    /// Build the condition context for `event_id` at `site`.
    pub const fn context<'b>(
        &'b self,
        event_id: &'b EventId,
        site: ConditionSite,
    ) -> ConditionContext<'b> {
        ConditionContext {
            turn: self.turn,
            site,
            event_id,
            completed_events: self.completed_events,
            state: self.state,
        }
    }

    /// Whether `node` may activate this turn.
    ///
    /// Requires `Inactive`, `turn >= activation_turn`, and every required
    /// prerequisite to hold. Optional prerequisites are ignored.
    pub fn can_activate(&self, node: &EventNode) -> bool {
        if node.status != EventStatus::Inactive || self.turn < node.activation_turn {
            return false;
        }
        let required = required_conditions(&node.prerequisites);
        let ctx = self.context(&node.id, ConditionSite::Prerequisite);
        evaluator::holds(self.evaluator, &required, &ctx)
    }

    /// Whether `node` may complete: `InProgress` and every required
    /// completion condition holds.
    pub fn can_complete(&self, node: &EventNode) -> bool {
        if node.status != EventStatus::InProgress {
            return false;
        }
        let required = required_conditions(&node.completion_conditions);
        let ctx = self.context(&node.id, ConditionSite::Completion);
        evaluator::holds(self.evaluator, &required, &ctx)
    }
}

/// Whether a non-persistent node has reached its expiration turn.
pub const fn is_expired(node: &EventNode, turn: u64) -> bool {
    !node.is_persistent && turn >= node.expiration_turn
}

/// Whether expiration is suppressed for `node`: persistent nodes, and
/// in-progress nodes still waiting on a branch decision.
pub fn expiration_prevented(node: &EventNode) -> bool {
    node.is_persistent || (node.status == EventStatus::InProgress && node.has_branches())
}

#[cfg(test)]
mod tests {
    use saga_types::{BranchType, EventBranch, EventCondition, EventType, GatedCondition};

    use super::*;
    use crate::evaluator::StateConditionEvaluator;

    fn gate<'a>(turn: u64, completed: &'a BTreeSet<EventId>, state: &'a GameState) -> Gate<'a> {
        Gate {
            turn,
            evaluator: &StateConditionEvaluator,
            completed_events: completed,
            state,
        }
    }

    #[test]
    fn activation_waits_for_its_turn() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.activation_turn = 5;
        for t in 0..5 {
            assert!(!gate(t, &completed, &state).can_activate(&node));
        }
        assert!(gate(5, &completed, &state).can_activate(&node));
    }

    #[test]
    fn failing_required_prerequisite_blocks_at_any_turn() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.prerequisites.push(GatedCondition::required(EventCondition::Never));
        for t in [0, 10, 1_000] {
            assert!(!gate(t, &completed, &state).can_activate(&node));
        }
    }

    #[test]
    fn optional_prerequisites_are_ignored() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.prerequisites.push(GatedCondition::optional(EventCondition::Never));
        assert!(gate(0, &completed, &state).can_activate(&node));
    }

    #[test]
    fn only_inactive_nodes_activate() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.status = EventStatus::Expired;
        assert!(!gate(0, &completed, &state).can_activate(&node));
    }

    #[test]
    fn completion_requires_in_progress() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.status = EventStatus::Active;
        assert!(!gate(0, &completed, &state).can_complete(&node));
        node.status = EventStatus::InProgress;
        assert!(gate(0, &completed, &state).can_complete(&node));
        node.completion_conditions.push(GatedCondition::required(EventCondition::Never));
        assert!(!gate(0, &completed, &state).can_complete(&node));
    }

    #[test]
    fn persistent_nodes_never_expire() {
        let mut node = EventNode::new("n", "N", EventType::World);
        node.expiration_turn = 3;
        node.is_persistent = true;
        for t in [0, 3, u64::MAX] {
            assert!(!is_expired(&node, t));
        }
        node.is_persistent = false;
        assert!(!is_expired(&node, 2));
        assert!(is_expired(&node, 3));
    }

    #[test]
    fn pending_branches_prevent_expiration() {
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.status = EventStatus::InProgress;
        assert!(!expiration_prevented(&node));
        node.branches.push(EventBranch::new("b1", BranchType::Manual));
        assert!(expiration_prevented(&node));
        node.status = EventStatus::Active;
        assert!(!expiration_prevented(&node));
    }
}
