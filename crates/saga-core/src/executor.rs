//! Effect execution capability.
//!
//! Effect bodies are opaque to the engine: each [`Effect`] carries a script
//! reference that an injected [`EffectExecutor`] runs against an
//! [`EffectContext`]. The same path serves the durable per-turn tick and
//! the one-shot effects applied when a node completes.

use std::collections::BTreeMap;

use saga_types::{Effect, EffectId};
use tracing::{debug, warn};

use crate::state::GameState;

/// Target name passed for world-scoped effects.
pub const WORLD_TARGET: &str = "world";

/// The context bag handed to an effect script.
#[derive(Debug)]
pub struct EffectContext<'a> {
    /// The turn being processed.
    pub turn: u64,
    /// The effect being executed.
    pub effect_id: &'a EffectId,
    /// [`WORLD_TARGET`] or a character id.
    pub target: &'a str,
    /// The effect's parameters.
    pub parameters: &'a BTreeMap<String, serde_json::Value>,
    /// Global game state, writable.
    pub state: &'a mut GameState,
}

/// Errors an executor may report. The scheduler logs them and carries on.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// The executor does not know this script.
    #[error("unknown effect script `{script}`")]
    UnknownScript {
        /// The script reference.
        script: String,
    },

    /// A parameter has the wrong shape for the script.
    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Runs effect scripts.
pub trait EffectExecutor {
    /// Run `script` in `ctx` and return its result.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError`] when the script cannot be run.
    fn execute(
        &mut self,
        script: &str,
        ctx: &mut EffectContext<'_>,
    ) -> Result<serde_json::Value, EffectError>;
}

/// Execute one effect against `target`.
///
/// An effect without a script is a no-op returning `Null`. Executor errors
/// are logged and also yield `Null`.
pub fn execute_effect(
    executor: &mut dyn EffectExecutor,
    effect: &Effect,
    target: &str,
    turn: u64,
    state: &mut GameState,
) -> serde_json::Value {
    if !effect.has_script() {
        debug!(turn, effect_id = %effect.id, "Effect has no script, skipping");
        return serde_json::Value::Null;
    }

    let mut ctx = EffectContext {
        turn,
        effect_id: &effect.id,
        target,
        parameters: &effect.parameters,
        state,
    };

    match executor.execute(&effect.script, &mut ctx) {
        Ok(result) => result,
        Err(err) => {
            warn!(turn, effect_id = %effect.id, target, %err, "Effect execution failed");
            serde_json::Value::Null
        }
    }
}

/// Built-in executor that edits [`GameState`] variables.
///
/// Understands two scripts:
///
/// - `set_vars` -- write every parameter into the state.
/// - `add_vars` -- add every (numeric) parameter to the matching variable.
///
/// For character targets the variable names are prefixed with
/// `"<character>."` so each character gets its own namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateEffectExecutor;

impl StateEffectExecutor {
    /// Create the executor.
    pub const fn new() -> Self {
        Self
    }
}

fn scoped_key(target: &str, key: &str) -> String {
    if target == WORLD_TARGET {
        key.to_owned()
    } else {
        format!("{target}.{key}")
    }
}

impl EffectExecutor for StateEffectExecutor {
    fn execute(
        &mut self,
        script: &str,
        ctx: &mut EffectContext<'_>,
    ) -> Result<serde_json::Value, EffectError> {
        let mut written = serde_json::Map::new();
        match script.trim() {
            "set_vars" => {
                for (key, value) in ctx.parameters {
                    let key = scoped_key(ctx.target, key);
                    ctx.state.set(key.clone(), value.clone());
                    written.insert(key, value.clone());
                }
            }
            "add_vars" => {
                for (key, delta) in ctx.parameters {
                    if !delta.is_number() {
                        return Err(EffectError::InvalidParameter {
                            key: key.clone(),
                            reason: format!("expected a number, got {delta}"),
                        });
                    }
                    let key = scoped_key(ctx.target, key);
                    let updated = ctx.state.add_number(&key, delta).ok_or_else(|| {
                        EffectError::InvalidParameter {
                            key: key.clone(),
                            reason: String::from("existing value is not a number"),
                        }
                    })?;
                    written.insert(key, updated);
                }
            }
            other => {
                return Err(EffectError::UnknownScript {
                    script: other.to_owned(),
                });
            }
        }
        Ok(serde_json::Value::Object(written))
    }
}
