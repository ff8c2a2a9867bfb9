//! Turn-driven event forest scheduler for the Saga narrative progression
//! engine.
//!
//! This crate owns the lifecycle of every event node: activation,
//! expiration, task-driven progress, branch resolution, and the durable
//! effects that completed events leave behind. It never interprets
//! predicates or effect scripts itself; those arrive through the
//! [`ConditionEvaluator`] and [`EffectExecutor`] capabilities.
//!
//! # Modules
//!
//! - [`branch`] -- Automatic branch selection policies.
//! - [`config`] -- Configuration loading from `saga-config.yaml` into
//!   strongly-typed structs.
//! - [`evaluator`] -- [`ConditionEvaluator`] trait and the built-in
//!   [`StateConditionEvaluator`].
//! - [`executor`] -- [`EffectExecutor`] trait and the built-in
//!   [`StateEffectExecutor`].
//! - [`forest`] -- The node arena and per-tree metadata.
//! - [`lifecycle`] -- Activation, completion, and expiration gates.
//! - [`notification`] -- Bounded outbox of lifecycle notifications.
//! - [`scheduler`] -- The per-turn algorithm and task propagation.
//! - [`state`] -- Global key/value game state.
//!
//! [`ConditionEvaluator`]: evaluator::ConditionEvaluator
//! [`StateConditionEvaluator`]: evaluator::StateConditionEvaluator
//! [`EffectExecutor`]: executor::EffectExecutor
//! [`StateEffectExecutor`]: executor::StateEffectExecutor

pub mod branch;
pub mod config;
pub mod evaluator;
pub mod executor;
pub mod forest;
pub mod lifecycle;
pub mod notification;
pub mod scheduler;
pub mod state;

pub use scheduler::{
    BranchResolution, RunnableTask, Scheduler, SchedulerError, TaskUpdate, TurnSummary,
};
