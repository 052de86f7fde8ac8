//! CLI command handlers.

pub mod catalog;
pub mod config;
pub mod deps;
pub mod family;
pub mod rules;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use casework_config::LoadedConfig;
use casework_engine::{CaseworkServices, EngineConfig, LogNotifier};
use casework_store::CaseworkStore;
use console::{Style, style};
use serde::Serialize;

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// `--db` flag, wins over every config layer.
    pub db_override: Option<PathBuf>,
    /// Merged configuration and where it came from.
    pub config: LoadedConfig,
}

impl Context {
    /// Database path after applying `--db` over the config layers.
    pub fn db_path(&self) -> PathBuf {
        self.db_override
            .clone()
            .or_else(|| self.config.config.db_path().cloned())
            .unwrap_or_else(casework_config::default_db_path)
    }

    /// Open the store and wire up the engine.
    pub fn services(&self) -> Result<CaseworkServices> {
        let path = self.db_path();
        let store = CaseworkStore::open_with_timeout(&path, self.config.config.busy_timeout())
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let engine_config = EngineConfig {
            event_capacity: self.config.config.event_capacity(),
        };
        Ok(CaseworkServices::new(
            Arc::new(store),
            Arc::new(LogNotifier),
            engine_config,
        ))
    }

    /// Print `value` as pretty JSON when `--json` is set; returns whether it did.
    pub fn emit_json<T: Serialize>(&self, value: &T) -> Result<bool> {
        if self.json_output {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(self.json_output)
    }
}

/// Bold title followed by a rule line.
pub fn heading(title: &str) {
    println!("{}", style(title).bold());
    println!("{}", Style::new().dim().apply_to("─".repeat(50)));
}

/// Green check mark and a message.
pub fn success(message: impl std::fmt::Display) {
    println!("{} {}", Style::new().green().apply_to("✓"), message);
}

pub fn dim(text: impl std::fmt::Display) -> String {
    Style::new().dim().apply_to(text).to_string()
}
