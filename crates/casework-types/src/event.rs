//! The single event shape flowing from the instance tracker to its observers.

use serde::{Deserialize, Serialize};

use crate::{TaskStatus, Timestamp};

/// Emitted once per committed status update of a family task instance.
///
/// `event_id` identifies the logical event; redelivery of the same event
/// carries the same id, which is what rule firing deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusChanged {
    pub event_id: String,
    pub family_task_id: String,
    pub family_id: String,
    pub task_id: String,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub timestamp: Timestamp,
}

impl TaskStatusChanged {
    pub fn new(
        family_task_id: impl Into<String>,
        family_id: impl Into<String>,
        task_id: impl Into<String>,
        old_status: TaskStatus,
        new_status: TaskStatus,
    ) -> Self {
        Self {
            event_id: crate::new_id(),
            family_task_id: family_task_id.into(),
            family_id: family_id.into(),
            task_id: task_id.into(),
            old_status,
            new_status,
            timestamp: crate::now(),
        }
    }

    /// True when the update actually changed the status.
    pub fn is_transition(&self) -> bool {
        self.old_status != self.new_status
    }

    /// True when the update moved the task into `Completed`.
    pub fn became_completed(&self) -> bool {
        self.new_status == TaskStatus::Completed && self.old_status != TaskStatus::Completed
    }
}
