//! Task template catalog and user directory operations.

use casework_types::{TaskTemplate, User};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

use crate::{Result, StoreError};

use super::{CaseworkStore, collect_rows};

const TEMPLATE_COLUMNS: &str = "id, title, description, category, sort_order, active";

impl CaseworkStore {
    // ── Templates ───────────────────────────────────────────────────

    /// Insert templates that are not yet in the catalog.
    ///
    /// Existing templates are left untouched (they are immutable once seeded).
    /// Returns how many rows were inserted.
    pub fn seed_templates(&self, templates: &[TaskTemplate]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO task_templates (id, title, description, category, sort_order, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for t in templates {
                inserted += stmt.execute(params![
                    t.id,
                    t.title,
                    t.description,
                    t.category,
                    t.order,
                    t.active as i32
                ])?;
            }
        }
        tx.commit()?;

        info!(
            offered = templates.len(),
            inserted, "Seeded task catalog"
        );
        Ok(inserted)
    }

    pub fn get_template(&self, id: &str) -> Result<TaskTemplate> {
        self.conn()
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = ?1"),
                params![id],
                row_to_template,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("Task template", id))
    }

    pub fn template_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i32> = self
            .conn()
            .query_row(
                "SELECT 1 FROM task_templates WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// List templates in catalog order, optionally including retired ones.
    pub fn list_templates(&self, include_retired: bool) -> Result<Vec<TaskTemplate>> {
        let conn = self.conn();
        let sql = if include_retired {
            format!("SELECT {TEMPLATE_COLUMNS} FROM task_templates ORDER BY sort_order, id")
        } else {
            format!(
                "SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE active = 1 ORDER BY sort_order, id"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let iter = stmt.query_map([], row_to_template)?;
        collect_rows(iter)
    }

    /// Retire or reactivate a template. Returns the previous flag.
    pub fn set_template_active(&self, id: &str, active: bool) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let previous: bool = tx
            .query_row(
                "SELECT active FROM task_templates WHERE id = ?1",
                params![id],
                |row| Ok(row.get::<_, i32>(0)? != 0),
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("Task template", id))?;
        tx.execute(
            "UPDATE task_templates SET active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        tx.commit()?;

        debug!(template_id = %id, active, previous, "Template active flag updated");
        Ok(previous)
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a user or update their display name.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, display_name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
            params![user.id, user.display_name],
        )?;
        Ok(())
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i32> = self
            .conn()
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, display_name FROM users ORDER BY id")?;
        let iter = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                display_name: row.get(1)?,
            })
        })?;
        collect_rows(iter)
    }
}

pub(super) fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskTemplate> {
    Ok(TaskTemplate {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        order: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CaseworkStore {
        CaseworkStore::open_in_memory().expect("failed to open in-memory store")
    }

    #[test]
    fn test_seed_is_insert_only() {
        let store = test_store();
        let first = vec![
            TaskTemplate::new("intake", "Intake interview", 1)
                .with_category("onboarding")
                .with_description("First meeting with the family"),
            TaskTemplate::new("records", "Gather records", 2),
        ];
        assert_eq!(store.seed_templates(&first).unwrap(), 2);

        // Re-seeding with a changed title neither duplicates nor overwrites.
        let again = vec![
            TaskTemplate::new("intake", "Renamed", 1),
            TaskTemplate::new("filing", "File petition", 3),
        ];
        assert_eq!(store.seed_templates(&again).unwrap(), 1);
        let intake = store.get_template("intake").unwrap();
        assert_eq!(intake.title, "Intake interview");
        assert_eq!(intake.category, "onboarding");
        assert_eq!(intake.description, "First meeting with the family");
        assert_eq!(store.list_templates(false).unwrap().len(), 3);
    }

    #[test]
    fn test_list_templates_in_catalog_order() {
        let store = test_store();
        store
            .seed_templates(&[
                TaskTemplate::new("b", "Second", 2),
                TaskTemplate::new("a", "First", 1),
                TaskTemplate::new("c", "Third", 3),
            ])
            .unwrap();
        let ids: Vec<_> = store
            .list_templates(false)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_retire_template() {
        let store = test_store();
        store
            .seed_templates(&[TaskTemplate::new("old", "Old form", 1)])
            .unwrap();

        assert!(store.set_template_active("old", false).unwrap());
        assert!(store.list_templates(false).unwrap().is_empty());
        assert_eq!(store.list_templates(true).unwrap().len(), 1);
        assert!(store.template_exists("old").unwrap());

        let err = store.set_template_active("missing", false).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_users() {
        let store = test_store();
        assert!(!store.user_exists("u1").unwrap());
        store
            .upsert_user(&User {
                id: "u1".into(),
                display_name: "Case Worker".into(),
            })
            .unwrap();
        store
            .upsert_user(&User {
                id: "u1".into(),
                display_name: "Senior Case Worker".into(),
            })
            .unwrap();
        assert!(store.user_exists("u1").unwrap());
        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "Senior Case Worker");
    }

    #[test]
    fn test_get_template_not_found() {
        let store = test_store();
        let err = store.get_template("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "Task template", .. }));
    }
}
