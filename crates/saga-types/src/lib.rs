//! Shared type definitions for the Saga narrative progression engine.
//!
//! This crate holds the data model only: the forest of event trees, their
//! nodes, branches, tasks, and effects. It carries the invariants that can
//! be enforced locally on a single value (capped task progress, effect turn
//! budgets, forward-only event status). Everything that needs the rest of
//! the forest or an external evaluator lives in `saga-core`.
//!
//! # Modules
//!
//! - [`ids`] -- String-backed identifier newtypes
//! - [`enums`] -- Task, event, branch, and effect enumerations
//! - [`condition`] -- Predicate trees for prerequisites and branch gates
//! - [`task`] -- Tasks, objectives, and rewards
//! - [`effect`] -- Time-boxed scripted effects
//! - [`event`] -- Event nodes, branches, and trees

pub mod condition;
pub mod effect;
pub mod enums;
pub mod event;
pub mod ids;
pub mod task;

pub use condition::{CompareOp, EventCondition, GatedCondition, required_conditions};
pub use effect::Effect;
pub use enums::{BranchType, EffectScope, EventStatus, EventType, TaskStatus, TaskType};
pub use event::{EventBranch, EventNode, EventTree, NextEvent};
pub use ids::{BranchId, EffectId, EventId, TaskId, TreeId};
pub use task::{Objective, Reward, Task};

#[cfg(test)]
mod tests {
    //! Binding generation for the decision UI.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::TreeId::export_all();
        let _ = crate::ids::TaskId::export_all();
        let _ = crate::ids::BranchId::export_all();
        let _ = crate::ids::EffectId::export_all();

        let _ = crate::enums::TaskType::export_all();
        let _ = crate::enums::TaskStatus::export_all();
        let _ = crate::enums::EventType::export_all();
        let _ = crate::enums::EventStatus::export_all();
        let _ = crate::enums::BranchType::export_all();
        let _ = crate::enums::EffectScope::export_all();

        let _ = crate::condition::CompareOp::export_all();
        let _ = crate::condition::EventCondition::export_all();
        let _ = crate::condition::GatedCondition::export_all();

        let _ = crate::task::Objective::export_all();
        let _ = crate::task::Reward::export_all();
        let _ = crate::task::Task::export_all();
        let _ = crate::effect::Effect::export_all();

        let _ = crate::event::NextEvent::export_all();
        let _ = crate::event::EventBranch::export_all();
        let _ = crate::event::EventNode::export_all();
        let _ = crate::event::EventTree::export_all();
    }
}
