//! Condition evaluation capability.
//!
//! The scheduler decides *when* predicates are checked; a
//! [`ConditionEvaluator`] decides *what they mean*. Prerequisites and
//! completion checks historically used a different predicate vocabulary
//! from branch enablement, so every call carries a [`ConditionSite`] and an
//! implementation is free to interpret the sites differently.
//!
//! [`StateConditionEvaluator`] is the built-in implementation. It handles
//! every [`EventCondition`] form except opaque scripts.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use saga_types::{CompareOp, EventCondition, EventId};
use tracing::warn;

use crate::state::GameState;

/// Where in the lifecycle a predicate list is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionSite {
    /// Required prerequisites of an inactive node.
    Prerequisite,
    /// Required completion conditions of an in-progress node.
    Completion,
    /// Enable conditions of an automatic branch.
    BranchEnable,
    /// Legacy pre-script conditions of an automatic branch.
    LegacyBranch,
}

/// Everything a predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    /// The turn being processed.
    pub turn: u64,
    /// Which check is running.
    pub site: ConditionSite,
    /// The node the predicates belong to.
    pub event_id: &'a EventId,
    /// Ids in the completed index.
    pub completed_events: &'a BTreeSet<EventId>,
    /// Global game state.
    pub state: &'a GameState,
}

/// Errors an evaluator may report. The scheduler treats all of them as
/// `false`.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    /// The evaluator does not understand this predicate form.
    #[error("unsupported condition `{kind}` at {site:?}")]
    Unsupported {
        /// Predicate kind.
        kind: &'static str,
        /// Where it was checked.
        site: ConditionSite,
    },

    /// A comparison between incompatible values.
    #[error("cannot compare variable `{key}` with {op:?}: {reason}")]
    TypeMismatch {
        /// Variable name.
        key: String,
        /// Operator requested.
        op: CompareOp,
        /// What went wrong.
        reason: String,
    },

    /// Any other evaluator failure (script runtime errors and the like).
    #[error("condition evaluation failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// Decides whether a list of predicates holds.
///
/// A list holds when every predicate in it holds; an empty list holds
/// vacuously. Implementations must not mutate game state.
pub trait ConditionEvaluator {
    /// Evaluate `predicates` in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] when a predicate cannot be evaluated.
    fn evaluate(
        &self,
        predicates: &[EventCondition],
        ctx: &ConditionContext<'_>,
    ) -> Result<bool, ConditionError>;
}

/// Evaluate `predicates`, mapping any failure to `false` (fail-closed).
pub fn holds(
    evaluator: &dyn ConditionEvaluator,
    predicates: &[EventCondition],
    ctx: &ConditionContext<'_>,
) -> bool {
    if predicates.is_empty() {
        return true;
    }
    match evaluator.evaluate(predicates, ctx) {
        Ok(result) => result,
        Err(err) => {
            warn!(
                turn = ctx.turn,
                event_id = %ctx.event_id,
                site = ?ctx.site,
                %err,
                "Condition evaluation failed, treating as false"
            );
            false
        }
    }
}

/// Built-in evaluator over the turn, the completed index, and game state.
///
/// [`EventCondition::Script`] is reported as unsupported; plug in a
/// scripting runtime through your own [`ConditionEvaluator`] to use it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateConditionEvaluator;

impl StateConditionEvaluator {
    /// Create the evaluator.
    pub const fn new() -> Self {
        Self
    }

    fn eval_one(
        &self,
        condition: &EventCondition,
        ctx: &ConditionContext<'_>,
    ) -> Result<bool, ConditionError> {
        match condition {
            EventCondition::Always => Ok(true),
            EventCondition::Never => Ok(false),
            EventCondition::TurnAtLeast { turn } => Ok(ctx.turn >= *turn),
            EventCondition::EventCompleted { event_id } => {
                Ok(ctx.completed_events.contains(event_id))
            }
            EventCondition::Variable { key, op, value } => {
                ctx.state
                    .get(key)
                    .map_or(Ok(false), |current| compare(key, *op, current, value))
            }
            EventCondition::Script { .. } => Err(ConditionError::Unsupported {
                kind: "script",
                site: ctx.site,
            }),
            EventCondition::All { conditions } => self.eval_all(conditions, ctx),
            EventCondition::Any { conditions } => {
                for child in conditions {
                    if self.eval_one(child, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            EventCondition::Not { condition } => Ok(!self.eval_one(condition, ctx)?),
        }
    }

    fn eval_all(
        &self,
        conditions: &[EventCondition],
        ctx: &ConditionContext<'_>,
    ) -> Result<bool, ConditionError> {
        for child in conditions {
            if !self.eval_one(child, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl ConditionEvaluator for StateConditionEvaluator {
    fn evaluate(
        &self,
        predicates: &[EventCondition],
        ctx: &ConditionContext<'_>,
    ) -> Result<bool, ConditionError> {
        self.eval_all(predicates, ctx)
    }
}

/// Compare a state value with a literal.
///
/// Numbers compare numerically, strings lexically, and anything else only
/// supports `eq`/`ne`.
fn compare(
    key: &str,
    op: CompareOp,
    current: &serde_json::Value,
    expected: &serde_json::Value,
) -> Result<bool, ConditionError> {
    if matches!(op, CompareOp::Eq | CompareOp::Ne) {
        let equal = match (current.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Equal),
            _ => current == expected,
        };
        return Ok(if op == CompareOp::Eq { equal } else { !equal });
    }

    let ordering = match (current, expected) {
        (serde_json::Value::Number(a), serde_json::Value::Number(b)) => {
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            }
        }
        (serde_json::Value::String(a), serde_json::Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    let Some(ordering) = ordering else {
        return Err(ConditionError::TypeMismatch {
            key: key.to_owned(),
            op,
            reason: format!("{current} vs {expected}"),
        });
    };

    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq | CompareOp::Ne => false,
    })
}
