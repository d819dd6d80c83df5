//! Configuration types for dumpmask.
//!
//! Two pieces of configuration drive a masking run:
//!
//! - **Masking rules file** (YAML): maps a table name to a mapping of column
//!   name to template source, e.g.
//!
//!   ```yaml
//!   users:
//!     email: "{{ .First 3 }}***"
//!     password: "{{ .Hashed }}"
//!   ```
//!
//! - **Runtime settings** ([`MaskSettings`]): hashing cost, processing mode,
//!   worker count and the per-line size ceiling. Built once at startup and
//!   never mutated afterwards.

pub mod settings;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use settings::{
    MaskSettings, ProcessingMode, DEFAULT_HASH_COST, DEFAULT_MAX_LINE_BYTES, MAX_HASH_COST,
    MIN_HASH_COST,
};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Raw masking rules as read from the rules file.
///
/// Template sources are kept as plain strings here; compiling them is the job
/// of the rule compiler in `dumpmask-sql`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskRulesFile {
    /// Table name -> column name -> template source.
    pub tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl MaskRulesFile {
    /// Load masking rules from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Config(msg) => {
                ConfigError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse masking rules from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Config(
                "masking rules file is empty".to_string(),
            ));
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Build rules from an in-memory mapping.
    pub fn from_tables(tables: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { tables }
    }

    /// Number of tables with at least one rule entry.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Total number of (table, column) rules.
    pub fn column_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
