//! Boundary to the notification/assignment subsystem.

use casework_types::{RuleAction, TaskStatus, TaskStatusChanged};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Error returned by a notification backend.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Why a user is being contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    Notice,
}

impl From<RuleAction> for NotificationKind {
    fn from(action: RuleAction) -> Self {
        match action {
            RuleAction::AssignUser => Self::Assignment,
            _ => Self::Notice,
        }
    }
}

/// What a user-directed rule action hands to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub rule_id: String,
    pub family_id: String,
    pub task_id: String,
    pub family_task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NotificationPayload {
    pub fn for_event(
        kind: NotificationKind,
        rule_id: &str,
        event: &TaskStatusChanged,
        message: Option<&str>,
    ) -> Self {
        Self {
            kind,
            rule_id: rule_id.to_string(),
            family_id: event.family_id.clone(),
            task_id: event.task_id.clone(),
            family_task_id: event.family_task_id.clone(),
            status: event.new_status,
            message: message.map(String::from),
        }
    }
}

/// `notify(user_id, payload)`; failures are reported, never unwound.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: &str, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line. Used when no delivery backend is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: &str, payload: &NotificationPayload) -> Result<(), NotifyError> {
        info!(
            %user_id,
            kind = ?payload.kind,
            family_id = %payload.family_id,
            task_id = %payload.task_id,
            status = %payload.status,
            message = payload.message.as_deref().unwrap_or(""),
            "Notification"
        );
        Ok(())
    }
}
