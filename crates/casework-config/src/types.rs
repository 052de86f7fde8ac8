//! Configuration file types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default broadcast capacity for status-change events.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Default console log level when neither `RUST_LOG` nor config sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override of just the database path) can be loaded and merged.
///
/// ```toml
/// [store]
/// path = "/var/lib/casework/casework.db"
/// busy_timeout_ms = 5000
///
/// [engine]
/// event_capacity = 1024
///
/// [logging]
/// level = "info"
/// file = true
/// directory = "/var/log/casework"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseworkConfig {
    pub store: Option<StoreSection>,
    pub engine: Option<EngineSection>,
    pub logging: Option<LoggingSection>,
}

impl CaseworkConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections merge field by field, so a layer that only sets
    /// `store.path` keeps the earlier layer's `busy_timeout_ms`.
    pub fn merge(&mut self, other: CaseworkConfig) {
        if let Some(store) = other.store {
            let base = self.store.get_or_insert_with(StoreSection::default);
            if store.path.is_some() {
                base.path = store.path;
            }
            if store.busy_timeout_ms.is_some() {
                base.busy_timeout_ms = store.busy_timeout_ms;
            }
        }

        if let Some(engine) = other.engine {
            let base = self.engine.get_or_insert_with(EngineSection::default);
            if engine.event_capacity.is_some() {
                base.event_capacity = engine.event_capacity;
            }
        }

        if let Some(logging) = other.logging {
            let base = self.logging.get_or_insert_with(LoggingSection::default);
            if logging.level.is_some() {
                base.level = logging.level;
            }
            if logging.file.is_some() {
                base.file = logging.file;
            }
            if logging.directory.is_some() {
                base.directory = logging.directory;
            }
        }
    }

    /// Configured database path, if any layer set one.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.store.as_ref().and_then(|s| s.path.as_ref())
    }

    pub fn busy_timeout(&self) -> Duration {
        let ms = self
            .store
            .as_ref()
            .and_then(|s| s.busy_timeout_ms)
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn event_capacity(&self) -> usize {
        self.engine
            .as_ref()
            .and_then(|e| e.event_capacity)
            .unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Whether JSON file logging is on. Defaults to off.
    pub fn file_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.file).unwrap_or(false)
    }

    pub fn log_directory(&self) -> Option<&PathBuf> {
        self.logging.as_ref().and_then(|l| l.directory.as_ref())
    }
}

/// `[store]`: where the SQLite database lives and how long to wait on locks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
}

/// `[engine]`: event delivery tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,
}

/// `[logging]`: console level and the optional JSON log file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive for the console, e.g. `"info"` or `"casework_engine=debug"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Write daily-rotated JSON logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<bool>,
    /// Where log files go. Defaults to the data directory's `logs/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = CaseworkConfig::from_toml("").unwrap();
        assert!(config.db_path().is_none());
        assert_eq!(config.busy_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.event_capacity(), 1024);
        assert_eq!(config.log_level(), "info");
        assert!(!config.file_logging());
    }

    #[test]
    fn test_parse_full_config() {
        let config = CaseworkConfig::from_toml(
            r#"
[store]
path = "/tmp/cw.db"
busy_timeout_ms = 250

[engine]
event_capacity = 16

[logging]
level = "debug"
file = true
directory = "/tmp/cw-logs"
"#,
        )
        .unwrap();
        assert_eq!(config.db_path(), Some(&PathBuf::from("/tmp/cw.db")));
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.event_capacity(), 16);
        assert_eq!(config.log_level(), "debug");
        assert!(config.file_logging());
        assert_eq!(config.log_directory(), Some(&PathBuf::from("/tmp/cw-logs")));
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let mut base = CaseworkConfig::from_toml(
            "[store]\npath = \"/a.db\"\nbusy_timeout_ms = 100\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();
        let layer = CaseworkConfig::from_toml("[store]\npath = \"/b.db\"\n").unwrap();
        base.merge(layer);

        assert_eq!(base.db_path(), Some(&PathBuf::from("/b.db")));
        assert_eq!(base.busy_timeout(), Duration::from_millis(100));
        assert_eq!(base.log_level(), "warn");
    }

    #[test]
    fn test_roundtrip_keeps_only_set_fields() {
        let config = CaseworkConfig::from_toml("[engine]\nevent_capacity = 8\n").unwrap();
        let text = config.to_toml().unwrap();
        assert!(text.contains("event_capacity = 8"));
        assert!(!text.contains("busy_timeout_ms"));
        assert_eq!(CaseworkConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_wrong_value_type_is_parse_error() {
        let err = CaseworkConfig::from_toml("[store]\npath = 7\n").unwrap_err();
        assert!(matches!(err, crate::ConfigError::Parse(_)));
    }
}
