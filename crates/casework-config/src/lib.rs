//! Configuration for casework.
//!
//! Provides TOML-based configuration with:
//! - `[store]`, `[engine]` and `[logging]` sections, all optional
//! - Config file layering (user config dir + project-local overrides)
//! - Catalog seed files (`[[task]]` and `[[dependency]]` tables)

pub mod catalog;
pub mod discovery;
pub mod error;
pub mod types;

pub use catalog::{CatalogFile, DependencySeed};
pub use discovery::{
    ConfigSource, LoadedConfig, default_db_path, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
