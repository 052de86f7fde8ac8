//! Family task instance operations.

use casework_types::{FamilyTaskInstance, TaskStatus, TaskTemplate, new_id, now};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::{Result, StoreError};

use super::catalog_ops::row_to_template;
use super::{CaseworkStore, collect_rows, get_enum, parse_dt};

const INSTANCE_COLUMNS: &str =
    "fi.id, fi.family_id, fi.task_id, fi.status, fi.notes, fi.completed_at, fi.created_at, fi.updated_at";

/// A catalog template joined with one family's instance of it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateRow {
    pub template: TaskTemplate,
    pub instance: Option<FamilyTaskInstance>,
}

impl CaseworkStore {
    /// Create a `not_started` instance for every active template the family lacks.
    ///
    /// Idempotent: the `(family_id, task_id)` uniqueness constraint makes
    /// repeat calls insert nothing. Returns the number of instances created.
    pub fn initialize_family_tasks(&self, family_id: &str) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now_str = now().to_rfc3339();
        let mut created = 0;
        {
            let mut active = tx.prepare("SELECT id FROM task_templates WHERE active = 1")?;
            let task_ids: Vec<String> =
                collect_rows(active.query_map([], |row| row.get(0))?)?;

            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO family_task_instances
                     (id, family_id, task_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'not_started', ?4, ?4)",
            )?;
            for task_id in &task_ids {
                created += insert.execute(params![new_id(), family_id, task_id, now_str])?;
            }
        }
        tx.commit()?;

        info!(%family_id, created, "Family task list initialized");
        Ok(created)
    }

    pub fn get_instance(&self, id: &str) -> Result<FamilyTaskInstance> {
        query_instance(&self.conn(), id)?
            .ok_or_else(|| StoreError::not_found("Family task instance", id))
    }

    /// The family's instance for a template, if it has been created.
    pub fn instance_for(
        &self,
        family_id: &str,
        task_id: &str,
    ) -> Result<Option<FamilyTaskInstance>> {
        let conn = self.conn();
        let found = conn
            .query_row(
                &format!(
                    "SELECT {INSTANCE_COLUMNS} FROM family_task_instances fi
                     WHERE fi.family_id = ?1 AND fi.task_id = ?2"
                ),
                params![family_id, task_id],
                |row| row_to_instance(row, 0),
            )
            .optional()?;
        Ok(found)
    }

    /// All instances of a family, in catalog order.
    pub fn instances_for_family(&self, family_id: &str) -> Result<Vec<FamilyTaskInstance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM family_task_instances fi
             JOIN task_templates t ON t.id = fi.task_id
             WHERE fi.family_id = ?1
             ORDER BY t.sort_order, t.id"
        ))?;
        let iter = stmt.query_map(params![family_id], |row| row_to_instance(row, 0))?;
        collect_rows(iter)
    }

    /// Every template (retired included) joined with the family's instance.
    ///
    /// One batched read that gives readiness evaluation titles, active
    /// flags and instance state together.
    pub fn family_task_rows(&self, family_id: &str) -> Result<Vec<TemplateRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT t.id, t.title, t.description, t.category, t.sort_order, t.active,
                    {INSTANCE_COLUMNS}
             FROM task_templates t
             LEFT JOIN family_task_instances fi
                ON fi.task_id = t.id AND fi.family_id = ?1
             ORDER BY t.sort_order, t.id"
        ))?;
        let iter = stmt.query_map(params![family_id], |row| {
            let template = row_to_template(row)?;
            let instance = match row.get::<_, Option<String>>(6)? {
                Some(_) => Some(row_to_instance(row, 6)?),
                None => None,
            };
            Ok(TemplateRow { template, instance })
        })?;
        collect_rows(iter)
    }

    /// Set an instance's status, keeping `completed_at` consistent with it.
    ///
    /// `status`, `completed_at`, `notes` and `updated_at` change in a single
    /// UPDATE, so no reader observes a completed task without a completion
    /// time or vice versa. Completing an already-completed task keeps the
    /// original completion time. Returns the previous status and the row
    /// as committed.
    pub fn update_instance_status(
        &self,
        id: &str,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<(TaskStatus, FamilyTaskInstance)> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = query_instance(&tx, id)?
            .ok_or_else(|| StoreError::not_found("Family task instance", id))?;

        tx.execute(
            "UPDATE family_task_instances
             SET status = ?1,
                 completed_at = CASE WHEN ?1 = 'completed' THEN COALESCE(completed_at, ?3) ELSE NULL END,
                 notes = COALESCE(?2, notes),
                 updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), notes, now().to_rfc3339(), id],
        )?;

        let updated = query_instance(&tx, id)?
            .ok_or_else(|| StoreError::not_found("Family task instance", id))?;
        tx.commit()?;

        debug!(
            instance_id = %id,
            old = %previous.status,
            new = %status,
            "Instance status updated"
        );
        Ok((previous.status, updated))
    }
}

fn query_instance(conn: &Connection, id: &str) -> Result<Option<FamilyTaskInstance>> {
    let found = conn
        .query_row(
            &format!("SELECT {INSTANCE_COLUMNS} FROM family_task_instances fi WHERE fi.id = ?1"),
            params![id],
            |row| row_to_instance(row, 0),
        )
        .optional()?;
    Ok(found)
}

/// Map instance columns starting at `offset`.
fn row_to_instance(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<FamilyTaskInstance> {
    Ok(FamilyTaskInstance {
        id: row.get(offset)?,
        family_id: row.get(offset + 1)?,
        task_id: row.get(offset + 2)?,
        status: get_enum(row, offset + 3)?,
        notes: row.get(offset + 4)?,
        completed_at: row
            .get::<_, Option<String>>(offset + 5)?
            .map(|s| parse_dt(&s)),
        created_at: parse_dt(&row.get::<_, String>(offset + 6)?),
        updated_at: parse_dt(&row.get::<_, String>(offset + 7)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> CaseworkStore {
        let store = CaseworkStore::open_in_memory().unwrap();
        store
            .seed_templates(&[
                TaskTemplate::new("t1", "One", 1),
                TaskTemplate::new("t2", "Two", 2),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = seeded_store();
        assert_eq!(store.initialize_family_tasks("fam").unwrap(), 2);
        assert_eq!(store.initialize_family_tasks("fam").unwrap(), 0);

        let instances = store.instances_for_family("fam").unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.status == TaskStatus::NotStarted));
    }

    #[test]
    fn test_initialize_skips_retired_templates() {
        let store = seeded_store();
        store.set_template_active("t2", false).unwrap();
        assert_eq!(store.initialize_family_tasks("fam").unwrap(), 1);
        assert!(store.instance_for("fam", "t2").unwrap().is_none());
    }

    #[test]
    fn test_completed_at_tracks_status() {
        let store = seeded_store();
        store.initialize_family_tasks("fam").unwrap();
        let inst = store.instance_for("fam", "t1").unwrap().unwrap();

        let (old, done) = store
            .update_instance_status(&inst.id, TaskStatus::Completed, Some("filed"))
            .unwrap();
        assert_eq!(old, TaskStatus::NotStarted);
        assert!(done.completed_at.is_some());
        assert_eq!(done.notes.as_deref(), Some("filed"));

        let (old, reopened) = store
            .update_instance_status(&inst.id, TaskStatus::InProgress, None)
            .unwrap();
        assert_eq!(old, TaskStatus::Completed);
        assert!(reopened.completed_at.is_none());
        // Notes survive an update that does not supply new ones.
        assert_eq!(reopened.notes.as_deref(), Some("filed"));
    }

    #[test]
    fn test_recompleting_keeps_original_timestamp() {
        let store = seeded_store();
        store.initialize_family_tasks("fam").unwrap();
        let inst = store.instance_for("fam", "t1").unwrap().unwrap();

        let (_, first) = store
            .update_instance_status(&inst.id, TaskStatus::Completed, None)
            .unwrap();
        let (old, second) = store
            .update_instance_status(&inst.id, TaskStatus::Completed, None)
            .unwrap();
        assert_eq!(old, TaskStatus::Completed);
        assert_eq!(first.completed_at, second.completed_at);
    }

    #[test]
    fn test_update_missing_instance() {
        let store = seeded_store();
        let err = store
            .update_instance_status("ghost", TaskStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_family_task_rows_left_join() {
        let store = seeded_store();
        store.initialize_family_tasks("fam").unwrap();
        store
            .seed_templates(&[TaskTemplate::new("t3", "Added later", 3)])
            .unwrap();

        let rows = store.family_task_rows("fam").unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].instance.is_some());
        assert!(rows[1].instance.is_some());
        assert_eq!(rows[2].template.id, "t3");
        assert!(rows[2].instance.is_none());

        // Other families' instances never leak into the join.
        store.initialize_family_tasks("other").unwrap();
        let rows = store.family_task_rows("fam").unwrap();
        assert!(rows[2].instance.is_none());
    }
}
