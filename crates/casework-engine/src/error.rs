//! Engine error types.

use casework_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// One reason a workflow rule draft was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleViolation {
    #[error("trigger task '{task_id}' does not exist")]
    UnknownTriggerTask { task_id: String },

    #[error("target task '{task_id}' does not exist")]
    UnknownTargetTask { task_id: String },

    #[error("target user '{user_id}' does not exist")]
    UnknownTargetUser { user_id: String },

    #[error("task_completed trigger requires a trigger task")]
    MissingTriggerTask,

    #[error("status_change trigger requires a trigger status")]
    MissingTriggerStatus,

    #[error("action {action} cannot target a {target_type}")]
    ActionTargetMismatch { action: String, target_type: String },

    #[error("target type task requires an action target task")]
    MissingTargetTask,

    #[error("target type user requires an action target user")]
    MissingTargetUser,

    #[error("rule triggers on and targets the same task '{task_id}'")]
    SelfTriggering { task_id: String },
}

/// Errors produced by the dependency graph, tracker, readiness and rule engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A task was asked to depend on itself.
    #[error("task '{task_id}' cannot depend on itself")]
    SelfDependency { task_id: String },

    /// Committing the edge would close a cycle; `path` walks it end to end.
    #[error("dependency would create a cycle: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// A rule draft broke one or more constraints; all of them are listed.
    #[error("invalid workflow rule: {}", join_violations(.violations))]
    ReferentialIntegrity { violations: Vec<RuleViolation> },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

fn join_violations(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
