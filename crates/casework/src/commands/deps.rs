//! Deps command - dependencies between task templates.

use anyhow::Result;
use casework_types::DependencyType;
use clap::{Args, Subcommand};

use super::{Context, dim, heading, success};

/// Arguments for the deps command.
#[derive(Args, Debug)]
pub struct DepsArgs {
    #[command(subcommand)]
    pub command: DepsCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepsCommand {
    /// Make TASK depend on DEPENDS_ON
    Add {
        task: String,
        depends_on: String,

        /// Record an optional (advisory) dependency instead of a required one
        #[arg(long)]
        optional: bool,
    },

    /// Remove the dependency of TASK on DEPENDS_ON
    Remove {
        task: String,
        depends_on: String,

        /// Only remove the edge of this type (required or optional)
        #[arg(long = "type")]
        dependency_type: Option<DependencyType>,
    },

    /// Show what a task depends on and what depends on it
    Show {
        /// Template ID
        task: String,
    },

    /// Print templates so that every task follows its dependencies
    Order,
}

/// Run the deps command.
pub fn run(args: DepsArgs, ctx: &Context) -> Result<()> {
    let services = ctx.services()?;
    let graph = services.graph();

    match args.command {
        DepsCommand::Add {
            task,
            depends_on,
            optional,
        } => {
            let kind = if optional {
                DependencyType::Optional
            } else {
                DependencyType::Required
            };
            let edge = graph.add_dependency(&task, &depends_on, kind)?;
            if !ctx.emit_json(&edge)? {
                success(format!("{task} now depends on {depends_on} ({kind})"));
            }
        }
        DepsCommand::Remove {
            task,
            depends_on,
            dependency_type,
        } => {
            let removed = graph.remove_dependency(&task, &depends_on, dependency_type)?;
            if !ctx.emit_json(&serde_json::json!({ "removed": removed }))? {
                success(format!("Removed {removed} edge(s) {task} -> {depends_on}"));
            }
        }
        DepsCommand::Show { task } => {
            let depends_on = graph.dependencies_of(&task)?;
            let dependents = graph.dependents_of(&task)?;
            if ctx.emit_json(&serde_json::json!({
                "task_id": task,
                "depends_on": depends_on,
                "dependents": dependents,
            }))? {
                return Ok(());
            }

            heading(&format!("Dependencies of {task}"));
            if depends_on.is_empty() {
                println!("{}", dim("none"));
            }
            for e in &depends_on {
                println!("  → {} {}", e.depends_on_task_id, dim(e.dependency_type));
            }
            println!();
            heading(&format!("Tasks depending on {task}"));
            if dependents.is_empty() {
                println!("{}", dim("none"));
            }
            for e in &dependents {
                println!("  ← {} {}", e.task_id, dim(e.dependency_type));
            }
        }
        DepsCommand::Order => {
            let order = graph.topological_order()?;
            if ctx.emit_json(&order)? {
                return Ok(());
            }
            heading("Dependency Order");
            for (i, id) in order.iter().enumerate() {
                println!("{:>4}. {id}", i + 1);
            }
        }
    }

    Ok(())
}
