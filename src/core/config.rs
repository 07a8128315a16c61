use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,

    // memory zones
    pub core_memory_limit: usize,               // core zone never fails, exceeding aborts
    pub unknown_memory_limit: usize,            // unknown zone reports OutOfMemory

    // locking
    pub lock_timeout_ms: u64,

    // persistence
    pub force_sync_properties: bool,
    pub wait_for_sync: bool,
    pub server_id: u64,

    // indexes
    pub hash_initial_size: usize,
    pub fulltext_min_word_length: usize,
    pub fulltext_max_word_length: usize,
    pub fulltext_cleanup_batch: usize,
    pub bitarray_max_cardinality: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            core_memory_limit: usize::MAX,
            unknown_memory_limit: 1024 * 1024 * 1024,   // 1GB
            lock_timeout_ms: 30_000,
            force_sync_properties: true,
            wait_for_sync: false,
            server_id: 0,
            hash_initial_size: 251,
            fulltext_min_word_length: 2,
            fulltext_max_word_length: 40,
            fulltext_cleanup_batch: 256,
            bitarray_max_cardinality: u64::BITS as usize,
        }
    }
}

impl Config {
    pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: path.into(),
            ..Config::default()
        }
    }

    /// Loads a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lock_timeout_ms": 50, "server_id": 7}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(50));
        assert_eq!(config.server_id, 7);
        assert_eq!(config.hash_initial_size, 251);
        assert_eq!(config.bitarray_max_cardinality, 64);
    }
}
