//! Casework - task dependencies and workflow automation for family case management
//!
//! Main entry point for the casework CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{catalog, config, deps, family, rules, users};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Casework - task dependencies and workflow automation for family case management
#[derive(Parser)]
#[command(name = "casework")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Database file (overrides [store] path from config)
    #[arg(long, global = true, env = "CASEWORK_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Task template catalog
    Catalog(catalog::CatalogArgs),

    /// Dependencies between task templates
    Deps(deps::DepsArgs),

    /// A family's task list, readiness and status updates
    Family(family::FamilyArgs),

    /// Workflow automation rules
    Rules(rules::RulesArgs),

    /// Users that rules may assign or notify
    Users(users::UsersArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = casework_config::load_config(None)?;

    // Console (human-readable, stderr so --json output stays clean) plus an
    // optional rotating JSON file.
    let console_filter = if cli.verbose {
        "casework=debug,casework_engine=debug,casework_store=debug,casework_config=debug,info"
            .to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| loaded.config.log_level().to_string())
    };

    use tracing_subscriber::prelude::*;
    let file_layer = if loaded.config.file_logging() {
        let log_dir = loaded
            .config
            .log_directory()
            .cloned()
            .or_else(|| casework_config::user_config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "casework.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "casework=trace,casework_engine=trace,casework_store=trace,casework_config=trace,info",
            ));
        Some((layer, guard))
    } else {
        None
    };
    let (file_layer, _guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        db_override: cli.db,
        config: loaded,
    };

    match cli.command {
        Commands::Catalog(args) => catalog::run(args, &ctx),
        Commands::Deps(args) => deps::run(args, &ctx),
        Commands::Family(args) => family::run(args, &ctx),
        Commands::Rules(args) => rules::run(args, &ctx),
        Commands::Users(args) => users::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}
