//! Dependency edge operations.
//!
//! Reads are plain queries. Inserts go through [`EdgeWriter`], which holds a
//! `BEGIN IMMEDIATE` transaction so a cycle pre-check and the insert it
//! guards cannot interleave with another writer.

use casework_types::{DependencyType, TaskDependency};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::debug;

use crate::{Result, StoreError};

use super::{CaseworkStore, collect_rows, get_enum, parse_dt};

const EDGE_COLUMNS: &str = "task_id, depends_on_task_id, dependency_type, created_at";

/// Write access to the edge table inside a held write lock.
///
/// Obtained from [`CaseworkStore::write_edges`]; commits when the closure
/// returns `Ok`, rolls back otherwise.
pub struct EdgeWriter<'a> {
    tx: Transaction<'a>,
}

impl EdgeWriter<'_> {
    /// Bulk read of every edge, as seen inside this transaction.
    pub fn load_all_edges(&self) -> Result<Vec<TaskDependency>> {
        query_all_edges(&self.tx)
    }

    pub fn template_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i32> = self
            .tx
            .query_row(
                "SELECT 1 FROM task_templates WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_edge(&self, edge: &TaskDependency) -> Result<()> {
        self.tx.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, dependency_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                edge.task_id,
                edge.depends_on_task_id,
                edge.dependency_type.as_str(),
                edge.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

impl CaseworkStore {
    /// Run `f` with exclusive write access to the dependency graph.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE`, taking SQLite's
    /// write lock before the first read, so every check `f` performs still
    /// holds when its insert commits.
    pub fn write_edges<T, E>(
        &self,
        f: impl FnOnce(&EdgeWriter<'_>) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let writer = EdgeWriter { tx };
        let value = f(&writer)?;
        writer.tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Single bulk read of the entire edge set.
    pub fn load_all_edges(&self) -> Result<Vec<TaskDependency>> {
        query_all_edges(&self.conn())
    }

    /// Edges leaving `task_id` (what it depends on).
    pub fn dependencies_of(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM task_dependencies
             WHERE task_id = ?1 ORDER BY depends_on_task_id, dependency_type"
        ))?;
        let iter = stmt.query_map(params![task_id], row_to_edge)?;
        collect_rows(iter)
    }

    /// Edges entering `task_id` (what depends on it).
    pub fn dependents_of(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM task_dependencies
             WHERE depends_on_task_id = ?1 ORDER BY task_id, dependency_type"
        ))?;
        let iter = stmt.query_map(params![task_id], row_to_edge)?;
        collect_rows(iter)
    }

    /// Delete edges between a pair; all types when `dependency_type` is `None`.
    ///
    /// Returns the number of edges removed.
    pub fn delete_edges(
        &self,
        task_id: &str,
        depends_on_task_id: &str,
        dependency_type: Option<DependencyType>,
    ) -> Result<usize> {
        let conn = self.conn();
        let removed = match dependency_type {
            Some(ty) => conn.execute(
                "DELETE FROM task_dependencies
                 WHERE task_id = ?1 AND depends_on_task_id = ?2 AND dependency_type = ?3",
                params![task_id, depends_on_task_id, ty.as_str()],
            )?,
            None => conn.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
                params![task_id, depends_on_task_id],
            )?,
        };
        debug!(%task_id, %depends_on_task_id, removed, "Dependency edges deleted");
        Ok(removed)
    }
}

fn query_all_edges(conn: &Connection) -> Result<Vec<TaskDependency>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM task_dependencies ORDER BY task_id, depends_on_task_id"
    ))?;
    let iter = stmt.query_map([], row_to_edge)?;
    collect_rows(iter)
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskDependency> {
    Ok(TaskDependency {
        task_id: row.get(0)?,
        depends_on_task_id: row.get(1)?,
        dependency_type: get_enum(row, 2)?,
        created_at: parse_dt(&row.get::<_, String>(3)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_types::TaskTemplate;

    fn seeded_store() -> CaseworkStore {
        let store = CaseworkStore::open_in_memory().unwrap();
        store
            .seed_templates(&[
                TaskTemplate::new("t1", "One", 1),
                TaskTemplate::new("t2", "Two", 2),
                TaskTemplate::new("t3", "Three", 3),
            ])
            .unwrap();
        store
    }

    fn insert(store: &CaseworkStore, from: &str, to: &str, ty: DependencyType) {
        store
            .write_edges(|w| w.insert_edge(&TaskDependency::new(from, to, ty)))
            .unwrap();
    }

    #[test]
    fn test_insert_and_query_edges() {
        let store = seeded_store();
        insert(&store, "t2", "t1", DependencyType::Required);
        insert(&store, "t3", "t1", DependencyType::Optional);

        assert_eq!(store.load_all_edges().unwrap().len(), 2);

        let deps = store.dependencies_of("t2").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].depends_on_task_id, "t1");
        assert!(deps[0].is_required());

        let dependents = store.dependents_of("t1").unwrap();
        let ids: Vec<_> = dependents.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
    }

    #[test]
    fn test_failed_closure_rolls_back() {
        let store = seeded_store();
        let result: std::result::Result<(), StoreError> = store.write_edges(|w| {
            w.insert_edge(&TaskDependency::new("t2", "t1", DependencyType::Required))?;
            Err(StoreError::Corrupt("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.load_all_edges().unwrap().is_empty());
    }

    #[test]
    fn test_self_edge_rejected_by_schema() {
        let store = seeded_store();
        let result = store.write_edges(|w| {
            w.insert_edge(&TaskDependency::new("t1", "t1", DependencyType::Required))
        });
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[test]
    fn test_delete_edges_by_type() {
        let store = seeded_store();
        insert(&store, "t2", "t1", DependencyType::Required);
        insert(&store, "t2", "t1", DependencyType::Optional);

        assert_eq!(
            store
                .delete_edges("t2", "t1", Some(DependencyType::Optional))
                .unwrap(),
            1
        );
        assert_eq!(store.load_all_edges().unwrap().len(), 1);
        assert_eq!(store.delete_edges("t2", "t1", None).unwrap(), 1);
        assert_eq!(store.delete_edges("t2", "t1", None).unwrap(), 0);
    }
}
