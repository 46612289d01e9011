//! Configuration schema and loader for partkv coordinators.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Replication and quorum thresholds.
    #[serde(default)]
    pub quorum: QuorumSettings,

    /// Fan-out execution settings.
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Static partition layout.
    #[serde(default)]
    pub partition: PartitionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumSettings {
    /// Replication factor (N).
    #[serde(default = "default_n")]
    pub n: usize,

    /// Read quorum (R).
    #[serde(default = "default_r")]
    pub r: usize,

    /// Write quorum (W).
    #[serde(default = "default_w")]
    pub w: usize,

    /// Per-node read deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Per-node write deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for QuorumSettings {
    fn default() -> Self {
        Self {
            n: default_n(),
            r: default_r(),
            w: default_w(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Maximum number of node calls in flight per coordinator.
    #[serde(default = "default_worker_permits")]
    pub worker_permits: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            worker_permits: default_worker_permits(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Node names in ring order. Node ids are derived from these.
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Ascending row keys separating consecutive partitions.
    #[serde(default)]
    pub split_points: Vec<String>,
}

// --- Defaults ---

fn default_n() -> usize {
    3
}
fn default_r() -> usize {
    2
}
fn default_w() -> usize {
    2
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_worker_permits() -> usize {
    16
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl CoordinatorConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quorum;
        if q.n == 0 {
            return Err(ConfigError::Invalid("quorum.n must be > 0".into()));
        }
        if q.r > q.n {
            return Err(ConfigError::Invalid(format!(
                "quorum.r ({}) must be <= quorum.n ({})",
                q.r, q.n
            )));
        }
        if q.w > q.n {
            return Err(ConfigError::Invalid(format!(
                "quorum.w ({}) must be <= quorum.n ({})",
                q.w, q.n
            )));
        }
        if self.executor.worker_permits == 0 {
            return Err(ConfigError::Invalid(
                "executor.worker_permits must be > 0".into(),
            ));
        }
        self.partition.validate(q.n)
    }
}

impl PartitionSettings {
    fn validate(&self, n: usize) -> Result<(), ConfigError> {
        // An empty node list means the partition map is wired in code.
        if self.nodes.is_empty() {
            return Ok(());
        }
        if self.nodes.len() < n {
            return Err(ConfigError::Invalid(format!(
                "partition.nodes has {} entries, need at least quorum.n ({})",
                self.nodes.len(),
                n
            )));
        }
        let mut seen = HashSet::new();
        for name in &self.nodes {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "partition.nodes contains duplicate name '{}'",
                    name
                )));
            }
        }
        if self.split_points.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "partition.split_points must not contain the empty key".into(),
            ));
        }
        if self.split_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(
                "partition.split_points must be strictly ascending".into(),
            ));
        }
        Ok(())
    }
}

/// Load a `CoordinatorConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<CoordinatorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `CoordinatorConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<CoordinatorConfig, ConfigError> {
    let config: CoordinatorConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
