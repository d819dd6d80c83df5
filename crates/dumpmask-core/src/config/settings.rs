//! Runtime settings for a masking run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// Smallest bcrypt cost accepted by the hashing backend.
pub const MIN_HASH_COST: u32 = 4;

/// Largest bcrypt cost accepted by the hashing backend.
pub const MAX_HASH_COST: u32 = 31;

/// Default bcrypt cost used by `{{ .Hashed }}`.
pub const DEFAULT_HASH_COST: u32 = 10;

/// Default per-line ceiling.
///
/// mysqldump writes one statement per line and a statement is bounded by
/// `max_allowed_packet`, whose maximum is 1G.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1000 * 1024 * 1024;

/// How the stream driver schedules lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// One line in flight at a time; output order equals input order.
    Sequential,
    /// Lines are masked by a bounded pool of workers and written back in
    /// input order.
    Ordered,
    /// Lines are masked by a bounded pool of workers and written as soon as
    /// they complete. Output order may differ from input order.
    #[default]
    Unordered,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Sequential => "sequential",
            ProcessingMode::Ordered => "ordered",
            ProcessingMode::Unordered => "unordered",
        }
    }

    /// Whether output lines keep the input order.
    pub fn preserves_order(&self) -> bool {
        !matches!(self, ProcessingMode::Unordered)
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ProcessingMode::Sequential),
            "ordered" => Ok(ProcessingMode::Ordered),
            "unordered" | "parallel" => Ok(ProcessingMode::Unordered),
            other => Err(ConfigError::Config(format!(
                "unknown processing mode '{}' (expected sequential, ordered or unordered)",
                other
            ))),
        }
    }
}

/// Immutable settings for one masking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSettings {
    /// bcrypt work factor for `{{ .Hashed }}`.
    #[serde(default = "default_cost")]
    pub cost: u32,

    /// Line scheduling policy.
    #[serde(default)]
    pub mode: ProcessingMode,

    /// Maximum number of lines in flight in the parallel modes.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Longest accepted input line, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            cost: default_cost(),
            mode: ProcessingMode::default(),
            workers: default_workers(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl MaskSettings {
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Reject settings the hashing backend or the driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.cost) {
            return Err(ConfigError::Config(format!(
                "bcrypt cost {} out of range (min: {}, max: {})",
                self.cost, MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Config(
                "maximum line size must be at least 1 byte".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_cost() -> u32 {
    DEFAULT_HASH_COST
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}
