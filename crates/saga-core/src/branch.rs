//! Branch selection.
//!
//! Automatic resolution is deterministic by default: among the automatic
//! branches whose conditions pass, the one with the lowest id wins. The
//! probability-weighted selector is kept as an opt-in policy for stories
//! that want a dice roll instead.

use rand::Rng;
use saga_types::{BranchId, EventBranch, EventNode};
use serde::Deserialize;

use crate::evaluator::{self, ConditionSite};
use crate::lifecycle::Gate;

/// How the engine picks among passing automatic branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoBranchPolicy {
    /// Lowest branch id wins. Same inputs, same branch.
    #[default]
    LowestId,
    /// Roll against each branch's `probability`.
    Weighted,
}

/// Whether an automatic branch's gate holds for `node`.
///
/// Enable conditions are authoritative; legacy `conditions` are only
/// consulted when a branch has no enable conditions. A branch with neither
/// is always enabled.
pub fn branch_enabled(branch: &EventBranch, node: &EventNode, gate: &Gate<'_>) -> bool {
    if branch.enable_conditions.is_empty() {
        let ctx = gate.context(&node.id, ConditionSite::LegacyBranch);
        evaluator::holds(gate.evaluator, &branch.conditions, &ctx)
    } else {
        let ctx = gate.context(&node.id, ConditionSite::BranchEnable);
        evaluator::holds(gate.evaluator, &branch.enable_conditions, &ctx)
    }
}

/// Automatic branches of `node` whose gates hold, ordered by id.
///
/// Manual branches are never returned.
pub fn passing_auto_branches<'n>(node: &'n EventNode, gate: &Gate<'_>) -> Vec<&'n EventBranch> {
    let mut passing: Vec<&EventBranch> = node
        .branches
        .iter()
        .filter(|b| b.is_auto())
        .filter(|b| branch_enabled(b, node, gate))
        .collect();
    passing.sort_by(|a, b| a.id.cmp(&b.id));
    passing
}

/// The candidate with the lowest id.
pub fn select_lowest_id<'n>(candidates: &[&'n EventBranch]) -> Option<&'n EventBranch> {
    candidates.iter().min_by(|a, b| a.id.cmp(&b.id)).copied()
}

/// Pick a candidate with chance proportional to its `probability`.
///
/// Negative and non-finite weights count as zero. When no candidate carries
/// weight this falls back to [`select_lowest_id`].
pub fn select_weighted<'n, R: Rng + ?Sized>(
    candidates: &[&'n EventBranch],
    rng: &mut R,
) -> Option<&'n EventBranch> {
    let weight = |b: &EventBranch| {
        if b.probability.is_finite() && b.probability > 0.0 {
            b.probability
        } else {
            0.0
        }
    };
    let total: f64 = candidates.iter().map(|b| weight(b)).sum();
    if total <= 0.0 {
        return select_lowest_id(candidates);
    }

    let roll = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for candidate in candidates {
        let w = weight(candidate);
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        if roll < cumulative {
            return Some(*candidate);
        }
    }
    // Rounding can leave the roll a hair above the last boundary.
    candidates.iter().rev().find(|b| weight(b) > 0.0).copied()
}

/// Choose the automatic branch to take for `node`, if any.
pub fn resolve_auto<R: Rng + ?Sized>(
    node: &EventNode,
    gate: &Gate<'_>,
    policy: AutoBranchPolicy,
    rng: &mut R,
) -> Option<BranchId> {
    let passing = passing_auto_branches(node, gate);
    let chosen = match policy {
        AutoBranchPolicy::LowestId => select_lowest_id(&passing),
        AutoBranchPolicy::Weighted => select_weighted(&passing, rng),
    };
    chosen.map(|b| b.id.clone())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use saga_types::{BranchType, EventCondition, EventId, EventType};

    use super::*;
    use crate::evaluator::StateConditionEvaluator;
    use crate::state::GameState;

    fn gate<'a>(completed: &'a BTreeSet<EventId>, state: &'a GameState) -> Gate<'a> {
        Gate {
            turn: 1,
            evaluator: &StateConditionEvaluator,
            completed_events: completed,
            state,
        }
    }

    fn auto(id: &str) -> EventBranch {
        EventBranch::new(id, BranchType::Auto)
    }

    #[test]
    fn lowest_passing_id_wins() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.branches.push(auto("b2").when(EventCondition::Always));
        node.branches.push(auto("b1").when(EventCondition::Always));
        node.branches.push(auto("b0").when(EventCondition::Never));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let chosen = resolve_auto(&node, &gate(&completed, &state), AutoBranchPolicy::LowestId, &mut rng);
            assert_eq!(chosen, Some(BranchId::from("b1")));
        }
    }

    #[test]
    fn manual_branches_are_never_auto_selected() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let mut node = EventNode::new("n", "N", EventType::Main);
        node.branches.push(EventBranch::new("a", BranchType::Manual));
        assert!(passing_auto_branches(&node, &gate(&completed, &state)).is_empty());
    }

    #[test]
    fn legacy_conditions_apply_only_without_enable_conditions() {
        let completed = BTreeSet::new();
        let state = GameState::new();
        let node = EventNode::new("n", "N", EventType::Main);
        let g = gate(&completed, &state);

        let mut legacy_only = auto("b1");
        legacy_only.conditions.push(EventCondition::Never);
        assert!(!branch_enabled(&legacy_only, &node, &g));

        let overridden = legacy_only.clone().when(EventCondition::Always);
        assert!(branch_enabled(&overridden, &node, &g));

        assert!(branch_enabled(&auto("bare"), &node, &g));
    }

    #[test]
    fn weighted_selection_respects_zero_weights() {
        let mut heavy = auto("b2");
        heavy.probability = 1.0;
        let light = auto("b1");
        let candidates = vec![&light, &heavy];
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            assert_eq!(select_weighted(&candidates, &mut rng).map(|b| b.id.as_str()), Some("b2"));
        }
    }

    #[test]
    fn weighted_selection_without_weights_is_deterministic() {
        let a = auto("b2");
        let b = auto("b1");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_weighted(&[&a, &b], &mut rng).map(|b| b.id.as_str()), Some("b1"));
    }

    #[test]
    fn weighted_selection_hits_every_weighted_branch() {
        let mut a = auto("a");
        a.probability = 0.5;
        let mut b = auto("b");
        b.probability = 0.5;
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            if let Some(chosen) = select_weighted(&[&a, &b], &mut rng) {
                seen.insert(chosen.id.clone());
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_lowest_id(&[]).is_none());
        assert!(select_weighted(&[], &mut rng).is_none());
    }
}
