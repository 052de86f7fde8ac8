//! Administrator-defined trigger/action automation rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ParseEnumError, TaskStatus, Timestamp};

/// What kind of event a rule listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    /// A specific task transitioned into `completed`. Needs `trigger_task_id`.
    TaskCompleted,
    /// Any (or a specific) task transitioned into `trigger_status`.
    StatusChange,
}

impl TriggerCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCompleted => "task_completed",
            Self::StatusChange => "status_change",
        }
    }
}

impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerCondition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_completed" => Ok(Self::TaskCompleted),
            "status_change" => Ok(Self::StatusChange),
            other => Err(ParseEnumError::new("trigger condition", other)),
        }
    }
}

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    AutoEnable,
    AutoComplete,
    AssignUser,
    SendNotification,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoEnable => "auto_enable",
            Self::AutoComplete => "auto_complete",
            Self::AssignUser => "assign_user",
            Self::SendNotification => "send_notification",
        }
    }

    /// The only target type this action may be paired with.
    pub fn target_type(&self) -> TargetType {
        match self {
            Self::AutoEnable | Self::AutoComplete => TargetType::Task,
            Self::AssignUser | Self::SendNotification => TargetType::User,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_enable" => Ok(Self::AutoEnable),
            "auto_complete" => Ok(Self::AutoComplete),
            "assign_user" => Ok(Self::AssignUser),
            "send_notification" => Ok(Self::SendNotification),
            other => Err(ParseEnumError::new("rule action", other)),
        }
    }
}

/// Kind of entity a rule action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Task,
    User,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::User => "user",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "user" => Ok(Self::User),
            other => Err(ParseEnumError::new("target type", other)),
        }
    }
}

/// An unvalidated rule as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default)]
    pub name: Option<String>,
    pub trigger_condition: TriggerCondition,
    #[serde(default)]
    pub trigger_task_id: Option<String>,
    #[serde(default)]
    pub trigger_status: Option<TaskStatus>,
    pub action: RuleAction,
    pub target_type: TargetType,
    #[serde(default)]
    pub action_target_task_id: Option<String>,
    #[serde(default)]
    pub action_target_user_id: Option<String>,
    /// Free text forwarded with user-directed actions.
    #[serde(default)]
    pub message: Option<String>,
}

impl RuleDraft {
    /// Draft a rule firing when `trigger_task_id` is completed.
    pub fn on_completed(trigger_task_id: impl Into<String>, action: RuleAction) -> Self {
        Self {
            name: None,
            trigger_condition: TriggerCondition::TaskCompleted,
            trigger_task_id: Some(trigger_task_id.into()),
            trigger_status: None,
            action,
            target_type: action.target_type(),
            action_target_task_id: None,
            action_target_user_id: None,
            message: None,
        }
    }

    /// Draft a rule firing when any task (optionally a specific one) moves into `status`.
    pub fn on_status(status: TaskStatus, action: RuleAction) -> Self {
        Self {
            name: None,
            trigger_condition: TriggerCondition::StatusChange,
            trigger_task_id: None,
            trigger_status: Some(status),
            action,
            target_type: action.target_type(),
            action_target_task_id: None,
            action_target_user_id: None,
            message: None,
        }
    }

    pub fn with_trigger_task(mut self, task_id: impl Into<String>) -> Self {
        self.trigger_task_id = Some(task_id.into());
        self
    }

    pub fn with_target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    pub fn targeting_task(mut self, task_id: impl Into<String>) -> Self {
        self.action_target_task_id = Some(task_id.into());
        self
    }

    pub fn targeting_user(mut self, user_id: impl Into<String>) -> Self {
        self.action_target_user_id = Some(user_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A registered, validated automation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub trigger_condition: TriggerCondition,
    pub trigger_task_id: Option<String>,
    pub trigger_status: Option<TaskStatus>,
    pub action: RuleAction,
    pub target_type: TargetType,
    pub action_target_task_id: Option<String>,
    pub action_target_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl WorkflowRule {
    /// Materialize a draft that has already passed validation.
    pub fn from_draft(draft: RuleDraft) -> Self {
        Self {
            id: crate::new_id(),
            name: draft.name,
            trigger_condition: draft.trigger_condition,
            trigger_task_id: draft.trigger_task_id,
            trigger_status: draft.trigger_status,
            action: draft.action,
            target_type: draft.target_type,
            action_target_task_id: draft.action_target_task_id,
            action_target_user_id: draft.action_target_user_id,
            message: draft.message,
            is_active: true,
            created_at: crate::now(),
        }
    }

    /// Label for logs: the name if set, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Minimal user directory entry, used to validate rule targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

impl User {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_target_type_pairs() {
        assert_eq!(RuleAction::AutoEnable.target_type(), TargetType::Task);
        assert_eq!(RuleAction::AutoComplete.target_type(), TargetType::Task);
        assert_eq!(RuleAction::AssignUser.target_type(), TargetType::User);
        assert_eq!(RuleAction::SendNotification.target_type(), TargetType::User);
    }

    #[test]
    fn draft_builders_fill_trigger_fields() {
        let draft = RuleDraft::on_completed("t1", RuleAction::AutoEnable).targeting_task("t2");
        assert_eq!(draft.trigger_condition, TriggerCondition::TaskCompleted);
        assert_eq!(draft.trigger_task_id.as_deref(), Some("t1"));
        assert_eq!(draft.target_type, TargetType::Task);

        let draft = RuleDraft::on_status(TaskStatus::InProgress, RuleAction::SendNotification)
            .targeting_user("case-worker");
        assert_eq!(draft.trigger_status, Some(TaskStatus::InProgress));
        assert!(draft.trigger_task_id.is_none());
    }

    #[test]
    fn draft_deserializes_from_json() {
        let draft: RuleDraft = serde_json::from_str(
            r#"{
                "trigger_condition": "status_change",
                "trigger_status": "completed",
                "action": "send_notification",
                "target_type": "user",
                "action_target_user_id": "u1"
            }"#,
        )
        .unwrap();
        assert_eq!(draft.action, RuleAction::SendNotification);
        assert_eq!(draft.trigger_status, Some(TaskStatus::Completed));
    }
}
