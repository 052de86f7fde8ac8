//! Workflow rule engine.
//!
//! Rules are validated as a whole on registration, then fired from
//! [`TaskStatusChanged`] events. Each (rule, event) pair is claimed in the
//! store's firing ledger before its action runs, so a redelivered event
//! cannot fire a rule twice.
//!
//! Events produced by a rule's own task actions are worked off a local queue
//! rather than re-read from the broadcast bus, so a cascade never depends on
//! the bus having room for it.

mod validation;

pub use validation::{rule_matches, validate_draft};

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use casework_store::{CaseworkStore, FiringOutcome};
use casework_types::{RuleAction, RuleDraft, TaskStatus, TaskStatusChanged, WorkflowRule};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result, RuleViolation};
use crate::notify::{NotificationPayload, Notifier};
use crate::readiness::ReadinessEvaluator;
use crate::tracker::InstanceTracker;

/// What happened when one event was handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FiringReport {
    pub event_id: String,
    /// Active rules whose trigger matched the event.
    pub matched: usize,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Matches already claimed by an earlier delivery of the same event.
    pub duplicates: usize,
}

impl FiringReport {
    fn new(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: FiringOutcome) {
        match outcome {
            FiringOutcome::Executed => self.executed += 1,
            FiringOutcome::Skipped => self.skipped += 1,
            FiringOutcome::Failed => self.failed += 1,
            FiringOutcome::Pending => {}
        }
    }

    /// Fold another report's counts into this one.
    pub fn absorb(&mut self, other: &FiringReport) {
        self.matched += other.matched;
        self.executed += other.executed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.duplicates += other.duplicates;
    }
}

/// Validates, stores and fires workflow rules.
#[derive(Clone)]
pub struct RuleEngine {
    store: Arc<CaseworkStore>,
    tracker: InstanceTracker,
    readiness: ReadinessEvaluator,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine").finish_non_exhaustive()
    }
}

impl RuleEngine {
    pub fn new(
        store: Arc<CaseworkStore>,
        tracker: InstanceTracker,
        readiness: ReadinessEvaluator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            tracker,
            readiness,
            notifier,
        }
    }

    /// Every constraint the draft breaks. Empty means it can be registered.
    pub fn validate(&self, draft: &RuleDraft) -> Result<Vec<RuleViolation>> {
        Ok(validate_draft(
            draft,
            |id| self.store.template_exists(id),
            |id| self.store.user_exists(id),
        )?)
    }

    /// Validate and store a rule. Nothing is written if any check fails.
    pub fn register(&self, draft: RuleDraft) -> Result<WorkflowRule> {
        let violations = self.validate(&draft)?;
        if !violations.is_empty() {
            warn!(count = violations.len(), "Rejected workflow rule");
            return Err(EngineError::ReferentialIntegrity { violations });
        }
        let rule = WorkflowRule::from_draft(draft);
        self.store.insert_rule(&rule)?;
        info!(
            rule_id = %rule.id,
            trigger = %rule.trigger_condition,
            action = %rule.action,
            "Workflow rule registered"
        );
        Ok(rule)
    }

    pub fn list_rules(&self) -> Result<Vec<WorkflowRule>> {
        Ok(self.store.list_rules()?)
    }

    pub fn get_rule(&self, id: &str) -> Result<WorkflowRule> {
        Ok(self.store.get_rule(id)?)
    }

    pub fn set_rule_active(&self, id: &str, active: bool) -> Result<()> {
        self.store.set_rule_active(id, active)?;
        info!(rule_id = %id, active, "Workflow rule toggled");
        Ok(())
    }

    /// Fire every active rule matching `event`, once per rule.
    ///
    /// Action failures are recorded in the ledger and counted in the report;
    /// only store errors on the ledger itself are returned. Events produced
    /// by the actions are not handled here; see [`cascade`](Self::cascade).
    pub fn handle(&self, event: &TaskStatusChanged) -> Result<FiringReport> {
        self.fire(event).map(|(report, _)| report)
    }

    /// Handle `event` and then every event its task actions produce, in the
    /// order they were produced.
    pub fn cascade(&self, event: &TaskStatusChanged) -> Result<FiringReport> {
        let mut handled = HashSet::new();
        self.cascade_into(event.clone(), &mut handled)
    }

    fn cascade_into(
        &self,
        event: TaskStatusChanged,
        handled: &mut HashSet<String>,
    ) -> Result<FiringReport> {
        let mut total = FiringReport::new(&event.event_id);
        let mut queue = VecDeque::from([event]);
        while let Some(next) = queue.pop_front() {
            if !handled.insert(next.event_id.clone()) {
                continue;
            }
            let (report, produced) = self.fire(&next)?;
            total.absorb(&report);
            queue.extend(produced);
        }
        Ok(total)
    }

    fn fire(&self, event: &TaskStatusChanged) -> Result<(FiringReport, Vec<TaskStatusChanged>)> {
        let mut report = FiringReport::new(&event.event_id);
        let mut produced = Vec::new();
        if !event.is_transition() {
            return Ok((report, produced));
        }

        let rules = self.store.active_rules_for_task(&event.task_id)?;
        for rule in rules.iter().filter(|r| rule_matches(r, event)) {
            report.matched += 1;
            if !self
                .store
                .claim_firing(&rule.id, &event.event_id, &event.family_id)?
            {
                debug!(rule_id = %rule.id, event_id = %event.event_id, "Duplicate delivery ignored");
                report.duplicates += 1;
                continue;
            }

            let action = match self.execute(rule, event) {
                Ok(action) => action,
                Err(e) => {
                    warn!(
                        rule_id = %rule.id,
                        event_id = %event.event_id,
                        error = %e,
                        "Workflow action failed"
                    );
                    ActionResult::failed(e.to_string())
                }
            };
            self.store.record_firing_outcome(
                &rule.id,
                &event.event_id,
                action.outcome,
                action.detail.as_deref(),
            )?;
            debug!(rule_id = %rule.id, outcome = %action.outcome, "Rule fired");
            report.record(action.outcome);
            produced.extend(action.produced);
        }
        Ok((report, produced))
    }

    fn execute(&self, rule: &WorkflowRule, event: &TaskStatusChanged) -> Result<ActionResult> {
        match rule.action {
            RuleAction::AutoEnable | RuleAction::AutoComplete => {
                let target = rule
                    .action_target_task_id
                    .as_deref()
                    .ok_or_else(|| EngineError::not_found("Action target task", &rule.id))?;
                self.advance_task(rule.action, target, &event.family_id)
            }
            RuleAction::AssignUser | RuleAction::SendNotification => {
                let user_id = rule
                    .action_target_user_id
                    .as_deref()
                    .ok_or_else(|| EngineError::not_found("Action target user", &rule.id))?;
                let payload = NotificationPayload::for_event(
                    rule.action.into(),
                    &rule.id,
                    event,
                    rule.message.as_deref(),
                );
                match self.notifier.notify(user_id, &payload) {
                    Ok(()) => Ok(ActionResult::executed(None)),
                    Err(e) => {
                        warn!(rule_id = %rule.id, %user_id, error = %e, "Notification failed");
                        Ok(ActionResult::failed(e.to_string()))
                    }
                }
            }
        }
    }

    /// Move the family's `target` instance forward. Never moves it backward.
    fn advance_task(
        &self,
        action: RuleAction,
        target: &str,
        family_id: &str,
    ) -> Result<ActionResult> {
        let Some(instance) = self.tracker.instance_for(family_id, target)? else {
            return Ok(ActionResult::skipped("family has no instance for the target task"));
        };

        let next = match action {
            RuleAction::AutoEnable => TaskStatus::InProgress,
            _ => TaskStatus::Completed,
        };
        if instance.status.rank() >= next.rank() {
            return Ok(ActionResult::skipped(&format!(
                "target already {}",
                instance.status
            )));
        }
        if next == TaskStatus::InProgress {
            let check = self.readiness.validate_dependencies(target, family_id)?;
            if !check.can_start {
                return Ok(ActionResult::skipped(&format!(
                    "blocked by {}",
                    check.missing_required.join(", ")
                )));
            }
        }

        let update = self.tracker.update_status(&instance.id, next, None)?;
        info!(
            %family_id,
            task_id = %target,
            status = %next,
            event_id = %update.event.event_id,
            "Workflow rule advanced task"
        );
        Ok(ActionResult::executed(Some(update.event)))
    }

    /// Handle every event already queued on `rx` together with its cascade.
    ///
    /// Cascaded events also arrive on `rx`; those already handled here are
    /// passed over. Returns once the receiver is empty. A lagged receiver
    /// logs the gap and keeps going; only events published by others can be
    /// lost that way.
    pub fn drain(&self, rx: &mut broadcast::Receiver<TaskStatusChanged>) -> Result<FiringReport> {
        let mut total = FiringReport::default();
        let mut handled = HashSet::new();
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if handled.contains(&event.event_id) {
                        continue;
                    }
                    let report = self.cascade_into(event, &mut handled)?;
                    total.absorb(&report);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Rule engine lagged; events were dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        Ok(total)
    }

    /// Handle events from `rx` on a background task until the bus closes.
    ///
    /// Must be called from within a tokio runtime. Each event and its cascade
    /// is handled on the blocking pool since the store calls are synchronous.
    /// Cascaded events seen again on the bus find their ledger claims and
    /// count as duplicates.
    pub fn spawn(self: Arc<Self>, mut rx: broadcast::Receiver<TaskStatusChanged>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let engine = Arc::clone(&self);
                        let result =
                            tokio::task::spawn_blocking(move || engine.cascade(&event)).await;
                        match result {
                            Ok(Ok(report)) => debug!(
                                event_id = %report.event_id,
                                executed = report.executed,
                                "Event handled"
                            ),
                            Ok(Err(e)) => warn!(error = %e, "Rule engine failed to handle event"),
                            Err(e) => warn!(error = %e, "Rule engine task panicked"),
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Rule engine lagged; events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Rule engine stopped");
        })
    }
}

/// Outcome of one rule action, plus the status change it committed, if any.
struct ActionResult {
    outcome: FiringOutcome,
    detail: Option<String>,
    produced: Option<TaskStatusChanged>,
}

impl ActionResult {
    fn executed(produced: Option<TaskStatusChanged>) -> Self {
        Self {
            outcome: FiringOutcome::Executed,
            detail: None,
            produced,
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            outcome: FiringOutcome::Skipped,
            detail: Some(reason.to_string()),
            produced: None,
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            outcome: FiringOutcome::Failed,
            detail: Some(detail),
            produced: None,
        }
    }
}
