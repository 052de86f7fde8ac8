//! Shared types for the casework task engine.
//!
//! These are plain data types with no persistence or graph logic. They are
//! shared between `casework-store` (which persists them) and
//! `casework-engine` (which evaluates and mutates them).

pub mod catalog;
pub mod error;
pub mod event;
pub mod instance;
pub mod rule;

pub use catalog::{DependencyType, TaskDependency, TaskTemplate};
pub use error::ParseEnumError;
pub use event::TaskStatusChanged;
pub use instance::{FamilyTaskInstance, TaskStatus};
pub use rule::{RuleAction, RuleDraft, TargetType, TriggerCondition, User, WorkflowRule};

/// Timestamp type used across all records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Generate a fresh random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
