//! Configuration types for fsnode
//!
//! Every section falls back to defaults so a partial TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for a storage node
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub metabase: MetabaseConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub get: GetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Full path of the metabase file
    #[must_use]
    pub fn metabase_path(&self) -> PathBuf {
        self.node.data_dir.join(&self.metabase.file)
    }

    /// Full path of the payload store file
    #[must_use]
    pub fn blob_path(&self) -> PathBuf {
        self.node.data_dir.join(&self.blob.file)
    }
}

/// Node identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name (human-readable identifier)
    #[serde(default = "default_node_name")]
    pub name: String,
    /// Root directory for the metabase and blob partitions
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            data_dir: default_data_dir(),
        }
    }
}

/// Metabase settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetabaseConfig {
    /// File name of the metabase inside the data directory
    #[serde(default = "default_metabase_file")]
    pub file: String,
}

impl Default for MetabaseConfig {
    fn default() -> Self {
        Self {
            file: default_metabase_file(),
        }
    }
}

/// Payload store settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobConfig {
    /// File name of the payload store inside the data directory
    #[serde(default = "default_blob_file")]
    pub file: String,
    /// Number of partitions the payloads are spread over
    #[serde(default = "default_partitions")]
    pub partitions: u16,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            file: default_blob_file(),
            partitions: default_partitions(),
        }
    }
}

/// Retrieval engine settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetConfig {
    /// How many epochs before the current one to search
    #[serde(default = "default_lookback_depth")]
    pub lookback_depth: u64,
    /// Whether virtual objects are assembled from their chunks
    #[serde(default = "default_true")]
    pub assembly: bool,
    /// Timeout for a single remote call, in milliseconds
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
}

impl Default for GetConfig {
    fn default() -> Self {
        Self {
            lookback_depth: default_lookback_depth(),
            assembly: true,
            remote_timeout_ms: default_remote_timeout_ms(),
        }
    }
}

/// Logging settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_node_name() -> String {
    "fsnode".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./fsnode-data")
}

fn default_metabase_file() -> String {
    "meta.redb".to_string()
}

fn default_blob_file() -> String {
    "blobs.redb".to_string()
}

const fn default_partitions() -> u16 {
    4
}

const fn default_lookback_depth() -> u64 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_remote_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.node.name, "fsnode");
        assert_eq!(config.blob.partitions, 4);
        assert_eq!(config.get.lookback_depth, 1);
        assert!(config.get.assembly);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"get": {"lookback_depth": 3}, "logging": {"json": true}}"#)
                .unwrap();
        assert_eq!(config.get.lookback_depth, 3);
        assert!(config.get.assembly);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.metabase.file, "meta.redb");
    }
}
