//! Rules command - workflow automation rules.

use anyhow::{Result, bail};
use casework_engine::EngineError;
use casework_types::{RuleAction, RuleDraft, TargetType, TaskStatus, TriggerCondition};
use clap::{Args, Subcommand};
use console::Style;

use super::{Context, dim, heading, success};

/// Arguments for the rules command.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Register a rule (every problem with it is reported at once)
    Add(AddRuleArgs),

    /// List registered rules
    List,

    /// Re-enable a rule
    Enable {
        /// Rule ID
        id: String,
    },

    /// Stop a rule from firing without deleting it
    Disable {
        /// Rule ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct AddRuleArgs {
    /// task_completed or status_change
    #[arg(long)]
    pub trigger: TriggerCondition,

    /// Task whose change fires the rule (required for task_completed)
    #[arg(long)]
    pub trigger_task: Option<String>,

    /// Status that fires a status_change rule
    #[arg(long)]
    pub trigger_status: Option<TaskStatus>,

    /// auto_enable, auto_complete, assign_user or send_notification
    #[arg(long)]
    pub action: RuleAction,

    /// task or user (defaults to what the action expects)
    #[arg(long)]
    pub target_type: Option<TargetType>,

    /// Task the action moves
    #[arg(long)]
    pub target_task: Option<String>,

    /// User the action assigns or notifies
    #[arg(long)]
    pub target_user: Option<String>,

    /// Human-readable rule name
    #[arg(long)]
    pub name: Option<String>,

    /// Text sent with assignments and notifications
    #[arg(long)]
    pub message: Option<String>,
}

impl From<AddRuleArgs> for RuleDraft {
    fn from(args: AddRuleArgs) -> Self {
        RuleDraft {
            name: args.name,
            trigger_condition: args.trigger,
            trigger_task_id: args.trigger_task,
            trigger_status: args.trigger_status,
            action: args.action,
            target_type: args.target_type.unwrap_or(args.action.target_type()),
            action_target_task_id: args.target_task,
            action_target_user_id: args.target_user,
            message: args.message,
        }
    }
}

/// Run the rules command.
pub fn run(args: RulesArgs, ctx: &Context) -> Result<()> {
    let services = ctx.services()?;
    let rules = services.rules();

    match args.command {
        RulesCommand::Add(add) => match rules.register(add.into()) {
            Ok(rule) => {
                if !ctx.emit_json(&rule)? {
                    success(format!("Registered rule {}", rule.id));
                }
            }
            Err(EngineError::ReferentialIntegrity { violations }) => {
                if !ctx.emit_json(&serde_json::json!({ "violations": violations }))? {
                    let red = Style::new().red();
                    eprintln!("{} rule rejected", red.apply_to("Error:"));
                    for v in &violations {
                        eprintln!("  - {v}");
                    }
                }
                bail!("rule rejected with {} violation(s)", violations.len());
            }
            Err(e) => return Err(e.into()),
        },
        RulesCommand::List => {
            let all = rules.list_rules()?;
            if ctx.emit_json(&all)? {
                return Ok(());
            }
            heading("Workflow Rules");
            if all.is_empty() {
                println!("{}", dim("No rules registered"));
            }
            for rule in &all {
                let trigger = match (rule.trigger_condition, &rule.trigger_task_id, rule.trigger_status) {
                    (TriggerCondition::TaskCompleted, Some(task), _) => format!("{task} completed"),
                    (_, Some(task), Some(status)) => format!("{task} → {status}"),
                    (_, None, Some(status)) => format!("any task → {status}"),
                    _ => rule.trigger_condition.to_string(),
                };
                let target = rule
                    .action_target_task_id
                    .as_deref()
                    .or(rule.action_target_user_id.as_deref())
                    .unwrap_or("?");
                let state = if rule.is_active { "" } else { " (disabled)" };
                println!(
                    "  {}  when {trigger}: {} {target}{state}",
                    dim(rule.label()),
                    rule.action
                );
            }
        }
        RulesCommand::Enable { id } => {
            rules.set_rule_active(&id, true)?;
            if !ctx.emit_json(&serde_json::json!({ "id": id, "active": true }))? {
                success(format!("Enabled rule {id}"));
            }
        }
        RulesCommand::Disable { id } => {
            rules.set_rule_active(&id, false)?;
            if !ctx.emit_json(&serde_json::json!({ "id": id, "active": false }))? {
                success(format!("Disabled rule {id}"));
            }
        }
    }

    Ok(())
}
