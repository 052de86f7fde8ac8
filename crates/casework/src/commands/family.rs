//! Family command - task list, readiness and status updates for one family.

use anyhow::{Result, anyhow};
use casework_engine::{BoardColumn, FiringReport, StatusUpdate};
use casework_types::TaskStatus;
use clap::{Args, Subcommand};
use console::Style;
use serde::Serialize;

use super::{Context, dim, heading, success};

/// Arguments for the family command.
#[derive(Args, Debug)]
pub struct FamilyArgs {
    #[command(subcommand)]
    pub command: FamilyCommand,
}

#[derive(Subcommand, Debug)]
pub enum FamilyCommand {
    /// Create the family's task list from the active catalog
    Init {
        /// Family ID
        family: String,
    },

    /// List the family's tasks and their status
    Tasks { family: String },

    /// Tasks the family can start now
    Ready { family: String },

    /// Check one task's dependencies for the family
    Check { family: String, task: String },

    /// Show the family's tasks grouped by readiness
    Board { family: String },

    /// Update a task's status and run any matching workflow rules
    SetStatus {
        family: String,
        task: String,

        /// not_started, in_progress or completed
        status: TaskStatus,

        /// Notes to store with the update
        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(Serialize)]
struct SetStatusOutput {
    update: StatusUpdate,
    automation: FiringReport,
}

/// Run the family command.
pub fn run(args: FamilyArgs, ctx: &Context) -> Result<()> {
    let services = ctx.services()?;

    match args.command {
        FamilyCommand::Init { family } => {
            let created = services.tracker().initialize_family_tasks(&family)?;
            if !ctx.emit_json(&serde_json::json!({ "family_id": family, "created": created }))? {
                success(format!("Initialized {created} task(s) for family {family}"));
            }
        }
        FamilyCommand::Tasks { family } => {
            let rows: Vec<_> = services
                .store()
                .family_task_rows(&family)?
                .into_iter()
                .filter(|r| r.instance.is_some())
                .collect();
            if ctx.emit_json(&rows)? {
                return Ok(());
            }
            heading(&format!("Tasks for {family}"));
            if rows.is_empty() {
                println!("{}", dim("No tasks; run `casework family init` first"));
            }
            for row in &rows {
                if let Some(inst) = &row.instance {
                    let retired = if row.template.active { "" } else { " (retired)" };
                    println!(
                        "  {:<12} {:<20} {}{}",
                        status_label(inst.status),
                        row.template.id,
                        row.template.title,
                        retired
                    );
                    if ctx.verbose
                        && let Some(notes) = &inst.notes
                    {
                        println!("  {:<12} {}", "", dim(notes));
                    }
                }
            }
        }
        FamilyCommand::Ready { family } => {
            let ready = services.readiness().ready_tasks_for_family(&family)?;
            if ctx.emit_json(&ready)? {
                return Ok(());
            }
            heading(&format!("Ready for {family}"));
            if ready.is_empty() {
                println!("{}", dim("Nothing can start right now"));
            }
            for task in &ready {
                println!("  {:<20} {}", task.task_id, task.title);
                if !task.missing_optional.is_empty() {
                    println!(
                        "  {:<20} {}",
                        "",
                        dim(format!("recommended first: {}", task.missing_optional.join(", ")))
                    );
                }
            }
        }
        FamilyCommand::Check { family, task } => {
            let check = services.readiness().validate_dependencies(&task, &family)?;
            if ctx.emit_json(&check)? {
                return Ok(());
            }
            if check.can_start {
                success(format!("{task} can start"));
            } else {
                println!("{} {task} is blocked", Style::new().red().apply_to("✗"));
            }
            for title in &check.missing_required {
                println!("  required: {title}");
            }
            for title in &check.missing_optional {
                println!("  {}", dim(format!("optional: {title}")));
            }
        }
        FamilyCommand::Board { family } => {
            let board = services.readiness().task_board(&family)?;
            if ctx.emit_json(&board)? {
                return Ok(());
            }
            for (column, title) in [
                (BoardColumn::Ready, "Ready"),
                (BoardColumn::Waiting, "Waiting"),
                (BoardColumn::InProgress, "In progress"),
                (BoardColumn::Completed, "Completed"),
            ] {
                heading(title);
                let entries: Vec<_> = board.iter().filter(|e| e.column == column).collect();
                if entries.is_empty() {
                    println!("{}", dim("none"));
                }
                for entry in entries {
                    println!("  {:<20} {}", entry.task_id, entry.title);
                    if !entry.waiting_on.is_empty() {
                        println!(
                            "  {:<20} {}",
                            "",
                            dim(format!("waiting on: {}", entry.waiting_on.join(", ")))
                        );
                    }
                }
                println!();
            }
        }
        FamilyCommand::SetStatus {
            family,
            task,
            status,
            notes,
        } => {
            let instance = services
                .tracker()
                .instance_for(&family, &task)?
                .ok_or_else(|| anyhow!("family {family} has no task {task}; run `casework family init`"))?;

            // Subscribe before the update so its event and every cascade are queued.
            let mut rx = services.events().subscribe();
            let update = services
                .tracker()
                .update_status(&instance.id, status, notes.as_deref())?;
            let automation = services.rules().drain(&mut rx)?;

            let output = SetStatusOutput { update, automation };
            if ctx.emit_json(&output)? {
                return Ok(());
            }
            success(format!(
                "{task}: {} → {}",
                output.update.event.old_status, output.update.event.new_status
            ));
            let report = &output.automation;
            if report.matched > 0 {
                println!(
                    "  {}",
                    dim(format!(
                        "automation: {} executed, {} skipped, {} failed",
                        report.executed, report.skipped, report.failed
                    ))
                );
            }
        }
    }

    Ok(())
}

fn status_label(status: TaskStatus) -> String {
    let style = match status {
        TaskStatus::Completed => Style::new().green(),
        TaskStatus::InProgress => Style::new().yellow(),
        TaskStatus::NotStarted => Style::new().dim(),
    };
    style.apply_to(status.as_str()).to_string()
}
