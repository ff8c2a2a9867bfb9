//! Enumeration types for the Saga progression engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Gameplay category of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TaskType {
    /// Gather a quantity of something.
    Collection,
    /// Defeat or survive an encounter.
    Combat,
    /// Talk to someone.
    Dialogue,
    /// Reach or discover a place.
    Exploration,
    /// Make something.
    Production,
    /// Improve a skill or stat.
    Training,
}

/// Progress status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TaskStatus {
    /// No progress recorded since the owning node last activated.
    #[default]
    NotStarted,
    /// Some progress recorded, threshold not reached.
    InProgress,
    /// `current_progress` has reached `required_progress`.
    Completed,
    /// Reserved; never assigned by the engine.
    Failed,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Narrative category of an event node or tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    /// Main storyline.
    #[default]
    Main,
    /// Optional side story.
    Side,
    /// World-wide happening.
    World,
    /// Repeats every day.
    Daily,
    /// Tied to a single character.
    Character,
}

/// Lifecycle status of an event node.
///
/// Status only moves forward along
/// `Inactive -> Active -> InProgress -> Completed`, or sideways from a
/// non-terminal state into `Expired` or `Failed`. `Completed`, `Expired`,
/// and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventStatus {
    /// Waiting for its activation turn and prerequisites.
    #[default]
    Inactive,
    /// In the active set, required tasks outstanding.
    Active,
    /// All required tasks done; waiting on completion conditions or a branch.
    InProgress,
    /// Finished. Terminal.
    Completed,
    /// Reserved; never assigned by the engine. Terminal.
    Failed,
    /// Ran out of time. Terminal.
    Expired,
}

impl EventStatus {
    /// Position along the forward chain, or `None` for sideways states.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Inactive => Some(0),
            Self::Active => Some(1),
            Self::InProgress => Some(2),
            Self::Completed => Some(3),
            Self::Failed | Self::Expired => None,
        }
    }

    /// Whether no further transition is possible from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }

    /// Whether moving from `self` to `next` respects the forward-only rule.
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Branches and effects
// ---------------------------------------------------------------------------

/// How a branch gets chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum BranchType {
    /// Chosen by an external actor through `choose_branch`.
    #[default]
    Manual,
    /// Chosen by the engine when its enable conditions hold.
    Auto,
}

/// Which list a durable effect lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EffectScope {
    /// Applies to the world as a whole.
    World,
    /// Applies to a single character named by the effect's target.
    Character,
}
