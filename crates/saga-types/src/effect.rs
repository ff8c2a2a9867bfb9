//! Time-boxed effects.
//!
//! An effect pairs an opaque script reference with parameters and a turn
//! budget. Durable effects are ticked once per turn by the scheduler until
//! `remaining_turns` reaches zero; the same shape is used for one-shot
//! completion effects listed on event nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EffectId;

/// A scripted side effect with a turn budget.
///
/// Invariant: `remaining_turns` never increases and bottoms out at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Effect {
    /// Effect id.
    pub id: EffectId,
    /// Free-form effect kind (`"buff"`, `"weather"`, ...).
    #[serde(rename = "type", default)]
    pub effect_type: String,
    /// Script reference handed to the effect executor. Empty means no-op.
    #[serde(default)]
    pub script: String,
    /// Parameters exposed to the script.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Total number of turns.
    #[serde(default)]
    pub duration: u32,
    /// Turns left; set to `duration` on registration.
    #[serde(default)]
    pub remaining_turns: u32,
    /// Character id for character-scoped effects.
    #[serde(default)]
    pub target: Option<String>,
}

impl Effect {
    /// Create an effect with a full turn budget and no parameters.
    pub fn new(id: impl Into<EffectId>, script: impl Into<String>, duration: u32) -> Self {
        Self {
            id: id.into(),
            effect_type: String::new(),
            script: script.into(),
            parameters: BTreeMap::new(),
            duration,
            remaining_turns: duration,
            target: None,
        }
    }

    /// Attach a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the character this effect applies to.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Whether there is no script to run.
    pub fn has_script(&self) -> bool {
        !self.script.trim().is_empty()
    }

    /// Refill the turn budget from `duration`.
    pub const fn restart(&mut self) {
        self.remaining_turns = self.duration;
    }

    /// Consume one turn of the budget. Pure bookkeeping.
    pub const fn update(&mut self) {
        self.remaining_turns = self.remaining_turns.saturating_sub(1);
    }

    /// Whether the budget is spent.
    pub const fn is_expired(&self) -> bool {
        self.remaining_turns == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_counts_down_to_zero() {
        let mut effect = Effect::new("rain", "set_vars", 2);
        assert!(!effect.is_expired());
        effect.update();
        assert_eq!(effect.remaining_turns, 1);
        effect.update();
        assert!(effect.is_expired());
        effect.update();
        assert_eq!(effect.remaining_turns, 0);
    }

    #[test]
    fn zero_duration_is_born_expired() {
        let effect = Effect::new("flash", "set_vars", 0);
        assert!(effect.is_expired());
    }

    #[test]
    fn blank_script_is_not_a_script() {
        assert!(!Effect::new("e", "  ", 1).has_script());
        assert!(Effect::new("e", "add_vars", 1).has_script());
    }

    #[test]
    fn restart_refills_budget() {
        let mut effect = Effect::new("e", "x", 3);
        effect.update();
        effect.update();
        effect.restart();
        assert_eq!(effect.remaining_turns, 3);
    }
}
