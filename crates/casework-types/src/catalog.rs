//! Task catalog types: templates and the dependency edges between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ParseEnumError, Timestamp};

/// Shared, family-independent definition of a unit of work.
///
/// Templates are seeded once and treated as immutable afterwards. Retiring a
/// template flips `active` off; rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Display position within the catalog (ascending).
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TaskTemplate {
    /// Create an active template with empty description and category.
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: String::new(),
            order,
            active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Whether a dependency blocks its dependent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Must be completed before the dependent task can start.
    Required,
    /// Advisory only; reported but never blocks.
    Optional,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            other => Err(ParseEnumError::new("dependency type", other)),
        }
    }
}

/// Directed edge `task_id -> depends_on_task_id`.
///
/// Reads as "`task_id` depends on `depends_on_task_id`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on_task_id: String,
    pub dependency_type: DependencyType,
    pub created_at: Timestamp,
}

impl TaskDependency {
    pub fn new(
        task_id: impl Into<String>,
        depends_on_task_id: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on_task_id.into(),
            dependency_type,
            created_at: crate::now(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.dependency_type == DependencyType::Required
    }
}
