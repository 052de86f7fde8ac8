//! Readiness evaluation: which of a family's not-started tasks can start.
//!
//! Every evaluation does exactly two batched reads: the catalog joined with
//! the family's instances, and the full edge set. Everything after that is
//! an in-memory walk over the snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use casework_store::{CaseworkStore, TemplateRow};
use casework_types::{DependencyType, FamilyTaskInstance, TaskDependency, TaskStatus};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Outcome of checking one task's dependencies for one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub task_id: String,
    pub can_start: bool,
    /// Titles of unmet required dependencies, in catalog order.
    pub missing_required: Vec<String>,
    /// Titles of unmet optional dependencies, in catalog order. Never blocking.
    pub missing_optional: Vec<String>,
}

/// A not-started task whose required dependencies are all completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyTask {
    pub task_id: String,
    pub title: String,
    pub instance_id: String,
    /// Optional dependencies still open; shown as advice.
    pub missing_optional: Vec<String>,
}

/// Column a task sits in on the family's board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardColumn {
    Ready,
    Waiting,
    InProgress,
    Completed,
}

/// One row of a family's task board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub task_id: String,
    pub title: String,
    pub category: String,
    pub instance_id: String,
    pub column: BoardColumn,
    /// Required dependencies still open (only for `Waiting`).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waiting_on: Vec<String>,
}

/// In-memory view of one family's catalog, instances and the edge set.
struct Snapshot<'a> {
    rows: &'a [TemplateRow],
    by_id: HashMap<&'a str, &'a TemplateRow>,
    completed: HashSet<&'a str>,
    outbound: HashMap<&'a str, Vec<&'a TaskDependency>>,
}

impl<'a> Snapshot<'a> {
    fn new(rows: &'a [TemplateRow], edges: &'a [TaskDependency]) -> Self {
        let by_id = rows.iter().map(|r| (r.template.id.as_str(), r)).collect();
        let completed = rows
            .iter()
            .filter(|r| r.instance.as_ref().is_some_and(|i| i.is_completed()))
            .map(|r| r.template.id.as_str())
            .collect();
        let mut outbound: HashMap<&str, Vec<&TaskDependency>> = HashMap::new();
        for edge in edges {
            outbound.entry(edge.task_id.as_str()).or_default().push(edge);
        }
        Self {
            rows,
            by_id,
            completed,
            outbound,
        }
    }

    /// Evaluate `task_id`'s outbound edges against the family's completions.
    fn check(&self, task_id: &str) -> DependencyCheck {
        let mut required: Vec<&TemplateRow> = Vec::new();
        let mut optional: Vec<&TemplateRow> = Vec::new();

        for edge in self.outbound.get(task_id).into_iter().flatten() {
            let target = edge.depends_on_task_id.as_str();
            let Some(row) = self.by_id.get(target).copied().filter(|r| r.template.active) else {
                warn!(
                    %task_id,
                    depends_on = %target,
                    "Ignoring dependency on retired or unknown template"
                );
                continue;
            };
            if self.completed.contains(target) {
                continue;
            }
            match edge.dependency_type {
                DependencyType::Required => required.push(row),
                DependencyType::Optional => optional.push(row),
            }
        }

        DependencyCheck {
            task_id: task_id.to_string(),
            can_start: required.is_empty(),
            missing_required: titles(required),
            missing_optional: titles(optional),
        }
    }

    /// Active templates the family has an instance for, in catalog order.
    fn tracked(&self) -> Vec<(&'a TemplateRow, &'a FamilyTaskInstance)> {
        let mut tracked: Vec<_> = self
            .rows
            .iter()
            .filter(|row| row.template.active)
            .filter_map(|row| row.instance.as_ref().map(|inst| (row, inst)))
            .collect();
        tracked.sort_by(|(a, _), (b, _)| catalog_key(a).cmp(&catalog_key(b)));
        tracked
    }
}

fn catalog_key(row: &TemplateRow) -> (i64, &str) {
    (row.template.order, row.template.id.as_str())
}

/// Sorted, deduplicated titles (an edge pair may exist with both types).
fn titles(mut rows: Vec<&TemplateRow>) -> Vec<String> {
    rows.sort_by(|a, b| catalog_key(a).cmp(&catalog_key(b)));
    rows.dedup_by(|a, b| a.template.id == b.template.id);
    rows.into_iter().map(|r| r.template.title.clone()).collect()
}

/// Ready tasks from a snapshot. Exposed for property tests over raw inputs.
pub fn ready_from(rows: &[TemplateRow], edges: &[TaskDependency]) -> Vec<ReadyTask> {
    let snapshot = Snapshot::new(rows, edges);
    snapshot
        .tracked()
        .into_iter()
        .filter(|(_, inst)| inst.status == TaskStatus::NotStarted)
        .filter_map(|(row, inst)| {
            let check = snapshot.check(&row.template.id);
            check.can_start.then(|| ReadyTask {
                task_id: row.template.id.clone(),
                title: row.template.title.clone(),
                instance_id: inst.id.clone(),
                missing_optional: check.missing_optional,
            })
        })
        .collect()
}

/// Board entries from a snapshot.
pub fn board_from(rows: &[TemplateRow], edges: &[TaskDependency]) -> Vec<BoardEntry> {
    let snapshot = Snapshot::new(rows, edges);
    snapshot
        .tracked()
        .into_iter()
        .map(|(row, inst)| {
            let (column, waiting_on) = match inst.status {
                TaskStatus::Completed => (BoardColumn::Completed, Vec::new()),
                TaskStatus::InProgress => (BoardColumn::InProgress, Vec::new()),
                TaskStatus::NotStarted => {
                    let check = snapshot.check(&row.template.id);
                    if check.can_start {
                        (BoardColumn::Ready, Vec::new())
                    } else {
                        (BoardColumn::Waiting, check.missing_required)
                    }
                }
            };
            BoardEntry {
                task_id: row.template.id.clone(),
                title: row.template.title.clone(),
                category: row.template.category.clone(),
                instance_id: inst.id.clone(),
                column,
                waiting_on,
            }
        })
        .collect()
}

/// On-demand readiness queries for a family.
#[derive(Debug, Clone)]
pub struct ReadinessEvaluator {
    store: Arc<CaseworkStore>,
}

impl ReadinessEvaluator {
    pub fn new(store: Arc<CaseworkStore>) -> Self {
        Self { store }
    }

    /// The two batched reads every evaluation starts from.
    fn load(&self, family_id: &str) -> Result<(Vec<TemplateRow>, Vec<TaskDependency>)> {
        let rows = self.store.family_task_rows(family_id)?;
        let edges = self.store.load_all_edges()?;
        Ok((rows, edges))
    }

    /// Not-started tasks with no unmet required dependency, in catalog order.
    pub fn ready_tasks_for_family(&self, family_id: &str) -> Result<Vec<ReadyTask>> {
        let (rows, edges) = self.load(family_id)?;
        let ready = ready_from(&rows, &edges);
        debug!(%family_id, ready = ready.len(), "Evaluated ready tasks");
        Ok(ready)
    }

    /// Check one task's dependencies for a family.
    ///
    /// Works whatever the task's own status; fails with `NotFound` when
    /// `task_id` is not a catalog template.
    pub fn validate_dependencies(&self, task_id: &str, family_id: &str) -> Result<DependencyCheck> {
        let (rows, edges) = self.load(family_id)?;
        let snapshot = Snapshot::new(&rows, &edges);
        if !snapshot.by_id.contains_key(task_id) {
            return Err(EngineError::not_found("Task template", task_id));
        }
        Ok(snapshot.check(task_id))
    }

    /// Every tracked task of the family, classified for display.
    pub fn task_board(&self, family_id: &str) -> Result<Vec<BoardEntry>> {
        let (rows, edges) = self.load(family_id)?;
        Ok(board_from(&rows, &edges))
    }
}
