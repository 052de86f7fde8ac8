//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{Context, dim, heading};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration and which files it came from
    Show,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let loaded = &ctx.config;
            let db_path = ctx.db_path();
            if ctx.emit_json(&serde_json::json!({
                "config": loaded.config,
                "db_path": db_path,
                "sources": loaded
                    .sources
                    .iter()
                    .map(|s| serde_json::json!({ "path": s.path, "loaded": s.loaded }))
                    .collect::<Vec<_>>(),
                "warnings": loaded.warnings,
            }))? {
                return Ok(());
            }

            heading("Configuration");
            println!("database:       {}", db_path.display());
            println!("busy timeout:   {} ms", loaded.config.busy_timeout().as_millis());
            println!("event capacity: {}", loaded.config.event_capacity());
            println!("log level:      {}", loaded.config.log_level());
            println!();
            heading("Sources (lowest precedence first)");
            for source in &loaded.sources {
                let state = if source.loaded { "loaded" } else { "not found" };
                println!("  {} {}", source.path.display(), dim(state));
            }
            for warning in &loaded.warnings {
                println!("  {}", dim(warning));
            }
        }
    }

    Ok(())
}
