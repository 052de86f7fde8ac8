//! Catalog seed files.
//!
//! ```toml
//! [[task]]
//! id = "intake"
//! title = "Intake interview"
//! category = "intake"
//! order = 1
//!
//! [[task]]
//! id = "home-visit"
//! title = "Home visit"
//! order = 2
//!
//! [[dependency]]
//! task = "home-visit"
//! depends_on = "intake"
//! type = "required"
//! ```

use std::collections::HashSet;
use std::path::Path;

use casework_types::{DependencyType, TaskTemplate};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// One `[[dependency]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySeed {
    pub task: String,
    pub depends_on: String,
    #[serde(rename = "type", default = "default_dependency_type")]
    pub dependency_type: DependencyType,
}

fn default_dependency_type() -> DependencyType {
    DependencyType::Required
}

/// A catalog of templates and the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskTemplate>,
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencySeed>,
}

impl CatalogFile {
    /// Parse and check a catalog.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(toml_str)?;
        catalog.check_ids()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Task ids must be unique and non-empty. Dependencies may name tasks
    /// seeded earlier, so they are not checked against this file.
    fn check_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "task '{}' has an empty id",
                    task.title
                )));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let catalog = CatalogFile::from_toml(
            r#"
[[task]]
id = "T1"
title = "Intake interview"
category = "intake"
order = 1

[[task]]
id = "T2"
title = "Home visit"
order = 2
active = false

[[dependency]]
task = "T2"
depends_on = "T1"

[[dependency]]
task = "T2"
depends_on = "T0"
type = "optional"
"#,
        )
        .unwrap();

        assert_eq!(catalog.tasks.len(), 2);
        assert_eq!(catalog.tasks[0].category, "intake");
        assert!(catalog.tasks[0].active);
        assert!(!catalog.tasks[1].active);
        assert_eq!(catalog.dependencies[0].dependency_type, DependencyType::Required);
        assert_eq!(catalog.dependencies[1].dependency_type, DependencyType::Optional);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = CatalogFile::from_toml(
            "[[task]]\nid = \"a\"\ntitle = \"A\"\n[[task]]\nid = \"a\"\ntitle = \"B\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCatalog(msg) if msg.contains("'a'")));
    }

    #[test]
    fn test_unknown_dependency_type_rejected() {
        let err = CatalogFile::from_toml(
            "[[dependency]]\ntask = \"a\"\ndepends_on = \"b\"\ntype = \"sometimes\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
