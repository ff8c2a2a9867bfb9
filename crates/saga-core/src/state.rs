//! Global game state handle shared with conditions and effect scripts.
//!
//! The engine does not know what a character or a resource is. It owns a
//! flat bag of named JSON values that condition evaluators read and effect
//! executors read and write; richer world models sit behind the injected
//! capabilities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named variables visible to conditions and effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameState {
    vars: BTreeMap<String, serde_json::Value>,
}

impl GameState {
    /// An empty state.
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.vars.get(key)
    }

    /// Set a variable, returning the previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.vars.insert(key.into(), value)
    }

    /// Add `delta` to a numeric variable, treating a missing one as zero.
    ///
    /// Integers stay integers while both sides are integers and the sum fits;
    /// otherwise the result is a float. Returns the new value, or `None` if
    /// the existing value is not a number.
    pub fn add_number(&mut self, key: &str, delta: &serde_json::Value) -> Option<serde_json::Value> {
        let current = self
            .vars
            .get(key)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::from(0_i64));

        let sum = match (current.as_i64(), delta.as_i64()) {
            (Some(a), Some(b)) => a.checked_add(b).map(serde_json::Value::from),
            _ => None,
        };
        let sum = match sum {
            Some(v) => v,
            None => {
                let a = current.as_f64()?;
                let b = delta.as_f64()?;
                serde_json::Value::from(a + b)
            }
        };

        self.vars.insert(key.to_owned(), sum.clone());
        Some(sum)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether there are no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
