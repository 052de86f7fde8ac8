//! Dependency graph service: guarded edge insertion plus graph reads.

use std::sync::Arc;

use casework_store::CaseworkStore;
use casework_types::{DependencyType, TaskDependency};
use tracing::{debug, info, warn};

use crate::cycle;
use crate::error::{EngineError, Result};

/// Administrative access to the template dependency graph.
///
/// Every insertion re-reads the full edge set inside the store's write lock
/// and runs the cycle detector on it before committing.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    store: Arc<CaseworkStore>,
}

impl DependencyGraph {
    pub fn new(store: Arc<CaseworkStore>) -> Self {
        Self { store }
    }

    /// Record that `task_id` depends on `depends_on_task_id`.
    ///
    /// Fails with `SelfDependency` for a self edge, `NotFound` when either
    /// template is unknown, and `CircularDependency` (carrying the cycle)
    /// when `depends_on_task_id` can already reach `task_id`. Re-adding an
    /// existing edge returns it unchanged.
    pub fn add_dependency(
        &self,
        task_id: &str,
        depends_on_task_id: &str,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency> {
        if task_id == depends_on_task_id {
            return Err(EngineError::SelfDependency {
                task_id: task_id.to_string(),
            });
        }

        self.store.write_edges(|writer| {
            for id in [task_id, depends_on_task_id] {
                if !writer.template_exists(id)? {
                    return Err(EngineError::not_found("Task template", id));
                }
            }

            let edges = writer.load_all_edges()?;
            if let Some(existing) = edges.iter().find(|e| {
                e.task_id == task_id
                    && e.depends_on_task_id == depends_on_task_id
                    && e.dependency_type == dependency_type
            }) {
                debug!(%task_id, %depends_on_task_id, "Dependency already present");
                return Ok(existing.clone());
            }

            if let Some(path) = cycle::find_cycle(&edges, task_id, depends_on_task_id) {
                warn!(
                    %task_id,
                    %depends_on_task_id,
                    cycle = %path.join(" -> "),
                    "Rejected dependency that would create a cycle"
                );
                return Err(EngineError::CircularDependency { path });
            }

            let edge = TaskDependency::new(task_id, depends_on_task_id, dependency_type);
            writer.insert_edge(&edge)?;
            info!(
                %task_id,
                %depends_on_task_id,
                dependency_type = %dependency_type,
                "Dependency added"
            );
            Ok(edge)
        })
    }

    /// Remove the edge(s) between a pair; every type when `dependency_type` is `None`.
    ///
    /// Removing edges cannot create a cycle, so no check runs.
    pub fn remove_dependency(
        &self,
        task_id: &str,
        depends_on_task_id: &str,
        dependency_type: Option<DependencyType>,
    ) -> Result<usize> {
        let removed = self
            .store
            .delete_edges(task_id, depends_on_task_id, dependency_type)?;
        if removed == 0 {
            return Err(EngineError::not_found(
                "Dependency",
                &format!("{task_id} -> {depends_on_task_id}"),
            ));
        }
        info!(%task_id, %depends_on_task_id, removed, "Dependency removed");
        Ok(removed)
    }

    pub fn dependencies_of(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        Ok(self.store.dependencies_of(task_id)?)
    }

    pub fn dependents_of(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        Ok(self.store.dependents_of(task_id)?)
    }

    /// Bulk read of every edge.
    pub fn load_all_edges(&self) -> Result<Vec<TaskDependency>> {
        Ok(self.store.load_all_edges()?)
    }

    /// Active templates ordered so each follows its dependencies.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let templates = self.store.list_templates(false)?;
        let edges = self.store.load_all_edges()?;
        cycle::topological_order(&templates, &edges).map_err(|stuck| {
            // Unreachable while every insert goes through add_dependency.
            EngineError::CircularDependency { path: stuck }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_types::TaskTemplate;

    fn graph() -> DependencyGraph {
        let store = CaseworkStore::open_in_memory().unwrap();
        store
            .seed_templates(&[
                TaskTemplate::new("t1", "One", 1),
                TaskTemplate::new("t2", "Two", 2),
                TaskTemplate::new("t3", "Three", 3),
            ])
            .unwrap();
        DependencyGraph::new(Arc::new(store))
    }

    #[test]
    fn test_self_dependency_rejected() {
        let graph = graph();
        let err = graph
            .add_dependency("t1", "t1", DependencyType::Required)
            .unwrap_err();
        assert!(matches!(err, EngineError::SelfDependency { .. }));
    }

    #[test]
    fn test_unknown_template_rejected() {
        let graph = graph();
        let err = graph
            .add_dependency("t1", "ghost", DependencyType::Required)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(graph.load_all_edges().unwrap().is_empty());
    }

    #[test]
    fn test_cycle_rejected_without_write() {
        let graph = graph();
        graph
            .add_dependency("t2", "t1", DependencyType::Required)
            .unwrap();
        let err = graph
            .add_dependency("t1", "t2", DependencyType::Optional)
            .unwrap_err();
        match err {
            EngineError::CircularDependency { path } => {
                assert_eq!(path, vec!["t2", "t1", "t2"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(graph.load_all_edges().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let graph = graph();
        let first = graph
            .add_dependency("t2", "t1", DependencyType::Required)
            .unwrap();
        let second = graph
            .add_dependency("t2", "t1", DependencyType::Required)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.load_all_edges().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_dependency() {
        let graph = graph();
        graph
            .add_dependency("t2", "t1", DependencyType::Required)
            .unwrap();
        assert_eq!(graph.remove_dependency("t2", "t1", None).unwrap(), 1);
        let err = graph.remove_dependency("t2", "t1", None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        // With the edge gone, the reverse direction is legal again.
        graph
            .add_dependency("t1", "t2", DependencyType::Required)
            .unwrap();
    }

    #[test]
    fn test_topological_order() {
        let graph = graph();
        graph
            .add_dependency("t1", "t3", DependencyType::Required)
            .unwrap();
        graph
            .add_dependency("t3", "t2", DependencyType::Optional)
            .unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec!["t2", "t3", "t1"]);
    }
}
