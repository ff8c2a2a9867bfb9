//! Predicate trees used for prerequisites, completion checks, and branch
//! enablement.
//!
//! The engine never interprets these itself. They are handed to an injected
//! condition evaluator, which may understand all of them, some of them, or
//! only the opaque [`EventCondition::Script`] form.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EventId;

/// Comparison operator for [`EventCondition::Variable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// A boolean predicate over the turn, the forest, and game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventCondition {
    /// Always true.
    Always,
    /// Always false.
    Never,
    /// True once the current turn reaches `turn`.
    TurnAtLeast {
        /// First turn on which the condition holds.
        turn: u64,
    },
    /// True once the named event sits in the completed index.
    EventCompleted {
        /// The event that must be complete.
        event_id: EventId,
    },
    /// Compares a game-state variable against a literal.
    Variable {
        /// Variable name in the game state.
        key: String,
        /// Comparison to apply (`state[key] op value`).
        op: CompareOp,
        /// Right-hand side.
        value: serde_json::Value,
    },
    /// Opaque script text for an external scripting runtime.
    Script {
        /// Script source or reference.
        source: String,
    },
    /// True when every child holds (vacuously true when empty).
    All {
        /// Children.
        conditions: Vec<EventCondition>,
    },
    /// True when at least one child holds (false when empty).
    Any {
        /// Children.
        conditions: Vec<EventCondition>,
    },
    /// Negation.
    Not {
        /// The negated condition.
        condition: Box<EventCondition>,
    },
}

/// A condition together with whether it gates its call site.
///
/// Non-required entries are informational: they are accepted as vacuously
/// satisfied by the lifecycle checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GatedCondition {
    /// The predicate.
    pub condition: EventCondition,
    /// Whether the predicate must hold.
    #[serde(default = "default_required")]
    pub is_required: bool,
}

impl GatedCondition {
    /// A condition that must hold.
    pub const fn required(condition: EventCondition) -> Self {
        Self {
            condition,
            is_required: true,
        }
    }

    /// A condition that is recorded but never gates anything.
    pub const fn optional(condition: EventCondition) -> Self {
        Self {
            condition,
            is_required: false,
        }
    }
}

const fn default_required() -> bool {
    true
}

/// Clone out the conditions that actually gate, dropping optional ones.
pub fn required_conditions(gated: &[GatedCondition]) -> Vec<EventCondition> {
    gated
        .iter()
        .filter(|g| g.is_required)
        .map(|g| g.condition.clone())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn condition_tree_parses_from_yaml() {
        let yaml = r"
kind: all
conditions:
  - kind: turn_at_least
    turn: 3
  - kind: not
    condition:
      kind: event_completed
      event_id: betrayal
  - kind: variable
    key: gold
    op: ge
    value: 10
";
        let parsed: EventCondition = serde_yml::from_str(yaml).unwrap();
        let EventCondition::All { conditions } = parsed else {
            panic!("expected an `all` combinator");
        };
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions.first(), Some(&EventCondition::TurnAtLeast { turn: 3 }));
    }

    #[test]
    fn gated_condition_defaults_to_required() {
        let parsed: GatedCondition =
            serde_json::from_str(r#"{"condition":{"kind":"always"}}"#).unwrap();
        assert!(parsed.is_required);
    }

    #[test]
    fn required_conditions_skips_optional_entries() {
        let gated = vec![
            GatedCondition::required(EventCondition::Always),
            GatedCondition::optional(EventCondition::Never),
        ];
        assert_eq!(required_conditions(&gated), vec![EventCondition::Always]);
    }
}
