//! Workflow rule storage and the rule-firing ledger.

use std::fmt;
use std::str::FromStr;

use casework_types::{ParseEnumError, Timestamp, WorkflowRule, now};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Result, StoreError};

use super::{CaseworkStore, collect_rows, get_enum, get_opt_enum, parse_dt};

const RULE_COLUMNS: &str = "id, name, trigger_condition, trigger_task_id, trigger_status, action, \
     target_type, action_target_task_id, action_target_user_id, message, is_active, created_at";

/// Result of one rule firing, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringOutcome {
    /// Claimed, action not yet finished.
    Pending,
    /// The action ran and changed something.
    Executed,
    /// The action had nothing to do (target absent or already in state).
    Skipped,
    /// The action's collaborator returned an error.
    Failed,
}

impl FiringOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FiringOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiringOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "executed" => Ok(Self::Executed),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError::new("firing outcome", other)),
        }
    }
}

/// Ledger row: one rule fired for one logical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFiring {
    pub rule_id: String,
    pub event_id: String,
    pub family_id: String,
    pub outcome: FiringOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub fired_at: Timestamp,
}

impl CaseworkStore {
    // ── Rules ───────────────────────────────────────────────────────

    pub fn insert_rule(&self, rule: &WorkflowRule) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO workflow_rules ({RULE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                rule.id,
                rule.name,
                rule.trigger_condition.as_str(),
                rule.trigger_task_id,
                rule.trigger_status.map(|s| s.as_str()),
                rule.action.as_str(),
                rule.target_type.as_str(),
                rule.action_target_task_id,
                rule.action_target_user_id,
                rule.message,
                rule.is_active as i32,
                rule.created_at.to_rfc3339(),
            ],
        )?;
        info!(rule_id = %rule.id, action = %rule.action, "Workflow rule stored");
        Ok(())
    }

    pub fn get_rule(&self, id: &str) -> Result<WorkflowRule> {
        self.conn()
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM workflow_rules WHERE id = ?1"),
                params![id],
                row_to_rule,
            )
            .optional()
            .map_err(super::corrupt_or_db)?
            .ok_or_else(|| StoreError::not_found("Workflow rule", id))
    }

    pub fn list_rules(&self) -> Result<Vec<WorkflowRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules ORDER BY created_at, id"
        ))?;
        let iter = stmt.query_map([], row_to_rule)?;
        collect_rows(iter)
    }

    /// Active rules bound to `task_id`, plus active rules bound to no task.
    ///
    /// Callers still apply the trigger-condition match; this only narrows the scan.
    pub fn active_rules_for_task(&self, task_id: &str) -> Result<Vec<WorkflowRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules
             WHERE is_active = 1 AND (trigger_task_id = ?1 OR trigger_task_id IS NULL)
             ORDER BY created_at, id"
        ))?;
        let iter = stmt.query_map(params![task_id], row_to_rule)?;
        collect_rows(iter)
    }

    pub fn set_rule_active(&self, id: &str, active: bool) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE workflow_rules SET is_active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("Workflow rule", id));
        }
        Ok(())
    }

    // ── Firing ledger ───────────────────────────────────────────────

    /// Claim the right to fire `rule_id` for `event_id`.
    ///
    /// Returns `false` when the pair was already claimed, i.e. the event is
    /// a duplicate delivery and the action must not run again.
    ///
    /// The claim commits before the action runs, so firing is at-most-once:
    /// a crash between the claim and [`record_firing_outcome`] leaves the row
    /// `pending` and the action is not retried. [`pending_firings`] lists
    /// those rows for an operator to inspect.
    ///
    /// [`record_firing_outcome`]: Self::record_firing_outcome
    /// [`pending_firings`]: Self::pending_firings
    pub fn claim_firing(&self, rule_id: &str, event_id: &str, family_id: &str) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO rule_firings (rule_id, event_id, family_id, outcome, fired_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![rule_id, event_id, family_id, now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    pub fn record_firing_outcome(
        &self,
        rule_id: &str,
        event_id: &str,
        outcome: FiringOutcome,
        detail: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE rule_firings SET outcome = ?1, detail = ?2 WHERE rule_id = ?3 AND event_id = ?4",
            params![outcome.as_str(), detail, rule_id, event_id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found(
                "Rule firing",
                &format!("{rule_id}/{event_id}"),
            ));
        }
        Ok(())
    }

    pub fn firings_for_event(&self, event_id: &str) -> Result<Vec<RuleFiring>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT rule_id, event_id, family_id, outcome, detail, fired_at
             FROM rule_firings WHERE event_id = ?1 ORDER BY fired_at, rule_id",
        )?;
        let iter = stmt.query_map(params![event_id], row_to_firing)?;
        collect_rows(iter)
    }

    /// Claims that never recorded an outcome, oldest first.
    pub fn pending_firings(&self) -> Result<Vec<RuleFiring>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT rule_id, event_id, family_id, outcome, detail, fired_at
             FROM rule_firings WHERE outcome = 'pending' ORDER BY fired_at, rule_id",
        )?;
        let iter = stmt.query_map([], row_to_firing)?;
        collect_rows(iter)
    }

    pub fn firings_for_family(&self, family_id: &str) -> Result<Vec<RuleFiring>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT rule_id, event_id, family_id, outcome, detail, fired_at
             FROM rule_firings WHERE family_id = ?1 ORDER BY fired_at, rule_id",
        )?;
        let iter = stmt.query_map(params![family_id], row_to_firing)?;
        collect_rows(iter)
    }
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowRule> {
    Ok(WorkflowRule {
        id: row.get(0)?,
        name: row.get(1)?,
        trigger_condition: get_enum(row, 2)?,
        trigger_task_id: row.get(3)?,
        trigger_status: get_opt_enum(row, 4)?,
        action: get_enum(row, 5)?,
        target_type: get_enum(row, 6)?,
        action_target_task_id: row.get(7)?,
        action_target_user_id: row.get(8)?,
        message: row.get(9)?,
        is_active: row.get::<_, i32>(10)? != 0,
        created_at: parse_dt(&row.get::<_, String>(11)?),
    })
}

fn row_to_firing(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleFiring> {
    Ok(RuleFiring {
        rule_id: row.get(0)?,
        event_id: row.get(1)?,
        family_id: row.get(2)?,
        outcome: get_enum(row, 3)?,
        detail: row.get(4)?,
        fired_at: parse_dt(&row.get::<_, String>(5)?),
    })
}
