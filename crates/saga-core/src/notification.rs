//! Lifecycle notifications.
//!
//! The scheduler pushes a notification for every committed transition into
//! a bounded outbox. Callers drain it between turns to drive UI prompts,
//! journals, or analytics; if nobody drains it the oldest entries are
//! dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use saga_types::{BranchId, EventId};
use serde::Serialize;

/// Default outbox capacity.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// What happened to an event node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// The node entered the active set.
    Activated,
    /// The node ran out of time and left the active set.
    Expired,
    /// All required tasks are done; the node is now in progress.
    Started,
    /// The node is in progress and waits for a manual branch choice.
    DecisionPending {
        /// Manual branches on offer.
        branches: Vec<BranchId>,
    },
    /// A branch was taken and its follow-on events scheduled.
    BranchTaken {
        /// The branch.
        branch_id: BranchId,
        /// Whether the engine took it on its own.
        automatic: bool,
        /// Follow-on events that were found and scheduled.
        scheduled: Vec<EventId>,
    },
    /// The node completed and moved to the completed index.
    Completed {
        /// Whether the node is a story ending.
        is_ending: bool,
    },
}

/// A timestamped lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Turn the transition happened on.
    pub turn: u64,
    /// The node concerned.
    pub event_id: EventId,
    /// What happened.
    #[serde(flatten)]
    pub kind: NotificationKind,
    /// Wall-clock time of emission.
    pub emitted_at: DateTime<Utc>,
}

/// Bounded FIFO of notifications.
#[derive(Debug, Clone)]
pub struct Outbox {
    capacity: usize,
    queue: VecDeque<Notification>,
    dropped: u64,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl Outbox {
    /// An empty outbox holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_NOTIFICATION_CAPACITY)),
            dropped: 0,
        }
    }

    /// Push a notification stamped with the current time.
    pub fn push(&mut self, turn: u64, event_id: &EventId, kind: NotificationKind) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.queue.push_back(Notification {
            turn,
            event_id: event_id.clone(),
            kind,
            emitted_at: Utc::now(),
        });
    }

    /// Take every pending notification, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    /// How many notifications were dropped for lack of room.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
