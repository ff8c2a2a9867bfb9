//! Type-safe identifier wrappers around authored string ids.
//!
//! Event forests are authored by hand, so every identifier is the string the
//! author chose (`"prologue"`, `"b1"`, ...). Wrapping them in distinct types
//! keeps event ids, task ids, and branch ids from being mixed at compile
//! time. Ordering is lexical on the inner string, which is what automatic
//! branch resolution relies on.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an event node across the whole forest.
    EventId
}

define_id! {
    /// Unique identifier for an event tree.
    TreeId
}

define_id! {
    /// Identifier for a task. The same id may be owned by several nodes.
    TaskId
}

define_id! {
    /// Identifier for a branch, unique within its owning node.
    BranchId
}

define_id! {
    /// Identifier for a durable or one-shot effect.
    EffectId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_lexically() {
        let mut ids = vec![BranchId::from("b2"), BranchId::from("b10"), BranchId::from("b1")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(BranchId::as_str).collect();
        assert_eq!(names, vec!["b1", "b10", "b2"]);
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = EventId::new("prologue");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"prologue\""));
    }

    #[test]
    fn id_display_matches_inner() {
        let id = TaskId::new("gather_wood");
        assert_eq!(id.to_string(), "gather_wood");
        assert!(!id.is_empty());
    }
}
