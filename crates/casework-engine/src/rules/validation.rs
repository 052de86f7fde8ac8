//! Rule draft validation and trigger matching.
//!
//! Both halves are pure. Validation takes the existence lookups as closures
//! so it can collect every violation in one pass without touching the store
//! more than once per referenced id.

use casework_types::{RuleDraft, TargetType, TaskStatusChanged, TriggerCondition, WorkflowRule};

use crate::error::RuleViolation;

/// Check a draft against the rule constraints, reporting every violation.
///
/// `template_exists` and `user_exists` answer referential questions; they are
/// only asked about ids the draft actually carries.
pub fn validate_draft<E>(
    draft: &RuleDraft,
    mut template_exists: impl FnMut(&str) -> Result<bool, E>,
    mut user_exists: impl FnMut(&str) -> Result<bool, E>,
) -> Result<Vec<RuleViolation>, E> {
    let mut violations = Vec::new();

    match draft.trigger_condition {
        TriggerCondition::TaskCompleted if draft.trigger_task_id.is_none() => {
            violations.push(RuleViolation::MissingTriggerTask);
        }
        TriggerCondition::StatusChange if draft.trigger_status.is_none() => {
            violations.push(RuleViolation::MissingTriggerStatus);
        }
        _ => {}
    }

    if let Some(task_id) = &draft.trigger_task_id
        && !template_exists(task_id)?
    {
        violations.push(RuleViolation::UnknownTriggerTask {
            task_id: task_id.clone(),
        });
    }

    if draft.action.target_type() != draft.target_type {
        violations.push(RuleViolation::ActionTargetMismatch {
            action: draft.action.to_string(),
            target_type: draft.target_type.to_string(),
        });
    }

    match draft.target_type {
        TargetType::Task => match &draft.action_target_task_id {
            None => violations.push(RuleViolation::MissingTargetTask),
            Some(task_id) => {
                if !template_exists(task_id)? {
                    violations.push(RuleViolation::UnknownTargetTask {
                        task_id: task_id.clone(),
                    });
                }
            }
        },
        TargetType::User => match &draft.action_target_user_id {
            None => violations.push(RuleViolation::MissingTargetUser),
            Some(user_id) => {
                if !user_exists(user_id)? {
                    violations.push(RuleViolation::UnknownTargetUser {
                        user_id: user_id.clone(),
                    });
                }
            }
        },
    }

    if let (Some(trigger), Some(target)) = (&draft.trigger_task_id, &draft.action_target_task_id)
        && trigger == target
    {
        violations.push(RuleViolation::SelfTriggering {
            task_id: trigger.clone(),
        });
    }

    Ok(violations)
}

/// Whether `rule` should fire for `event`.
///
/// Only real transitions match: re-affirming a status never fires anything.
pub fn rule_matches(rule: &WorkflowRule, event: &TaskStatusChanged) -> bool {
    if !rule.is_active || !event.is_transition() {
        return false;
    }
    let task_matches = rule
        .trigger_task_id
        .as_deref()
        .is_none_or(|id| id == event.task_id);

    match rule.trigger_condition {
        TriggerCondition::TaskCompleted => {
            rule.trigger_task_id.is_some() && task_matches && event.became_completed()
        }
        TriggerCondition::StatusChange => {
            rule.trigger_status == Some(event.new_status) && task_matches
        }
    }
}
