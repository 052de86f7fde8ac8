//! Catalog command - task template catalog.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use casework_config::CatalogFile;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::{Context, dim, heading, success};

/// Arguments for the catalog command.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Seed templates and dependencies from a TOML catalog file
    Seed {
        /// Catalog file with [[task]] and [[dependency]] tables
        file: PathBuf,
    },

    /// List task templates in catalog order
    List {
        /// Include retired templates
        #[arg(short, long)]
        all: bool,
    },

    /// Retire a template (or bring it back with --restore)
    Retire {
        /// Template ID
        id: String,

        /// Reactivate instead of retiring
        #[arg(long)]
        restore: bool,
    },
}

#[derive(Serialize)]
struct SeedSummary {
    templates_added: usize,
    templates_in_file: usize,
    dependencies: usize,
}

/// Run the catalog command.
pub fn run(args: CatalogArgs, ctx: &Context) -> Result<()> {
    let services = ctx.services()?;

    match args.command {
        CatalogCommand::Seed { file } => {
            let catalog = CatalogFile::from_file(&file)
                .with_context(|| format!("failed to load catalog {}", file.display()))?;
            let added = services.store().seed_templates(&catalog.tasks)?;
            for dep in &catalog.dependencies {
                services
                    .graph()
                    .add_dependency(&dep.task, &dep.depends_on, dep.dependency_type)
                    .with_context(|| {
                        format!("failed to add dependency {} -> {}", dep.task, dep.depends_on)
                    })?;
            }

            let summary = SeedSummary {
                templates_added: added,
                templates_in_file: catalog.tasks.len(),
                dependencies: catalog.dependencies.len(),
            };
            if !ctx.emit_json(&summary)? {
                success(format!(
                    "Seeded {} new template(s) ({} in file), {} dependency edge(s)",
                    summary.templates_added, summary.templates_in_file, summary.dependencies
                ));
            }
        }
        CatalogCommand::List { all } => {
            let templates = services.store().list_templates(all)?;
            if ctx.emit_json(&templates)? {
                return Ok(());
            }
            heading("Task Catalog");
            if templates.is_empty() {
                println!("{}", dim("No templates found"));
            }
            for t in &templates {
                let retired = if t.active { "" } else { " (retired)" };
                println!(
                    "{:>4}  {:<20} {}{}  {}",
                    t.order,
                    t.id,
                    t.title,
                    retired,
                    dim(&t.category)
                );
            }
        }
        CatalogCommand::Retire { id, restore } => {
            let active = restore;
            let was_active = services.store().set_template_active(&id, active)?;
            if !ctx.emit_json(&serde_json::json!({ "id": id, "active": active, "was_active": was_active }))? {
                let verb = if active { "Restored" } else { "Retired" };
                success(format!("{verb} template {id}"));
            }
        }
    }

    Ok(())
}
