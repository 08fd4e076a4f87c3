use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Engine tunables. Every field has a default so a partial JSON file is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrency: usize,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Sleep after each scan unit before its concurrency slot is released.
    pub politeness_delay_ms: u64,
    pub read_buffer_size: usize,
    pub max_response_size: usize,
    /// `None` keeps statistics in memory only.
    pub stats_path: Option<PathBuf>,
    /// 0 disables periodic saving; saves still happen after each task and on shutdown.
    pub autosave_interval_secs: u64,
    /// Minimum winning confidence for a probe attempt to count as a hit.
    pub confident_threshold: u8,
    /// Stop trying further probes on a port once an identification reaches this confidence.
    pub early_exit_confidence: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 50,
            connect_timeout_ms: 3000,
            write_timeout_ms: 3000,
            read_timeout_ms: 5000,
            politeness_delay_ms: 10,
            read_buffer_size: 2048,
            max_response_size: 8192,
            stats_path: Some(default_stats_path()),
            autosave_interval_secs: 0,
            confident_threshold: 70,
            early_exit_confidence: 90,
        }
    }
}

impl EngineConfig {
    /// Config with no statistics file, used by tests and embedders that manage persistence themselves.
    pub fn in_memory() -> Self {
        Self {
            stats_path: None,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::Config("max_concurrency must be at least 1".into()));
        }
        if self.read_buffer_size == 0 || self.max_response_size == 0 {
            return Err(EngineError::Config("buffer sizes must be non-zero".into()));
        }
        if self.confident_threshold > 100 || self.early_exit_confidence > 100 {
            return Err(EngineError::Config("confidence thresholds are percentages (0-100)".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

pub fn default_stats_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("probescope");
    path.push("probe_stats.json");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_concurrency": 8, "stats_path": null}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.read_timeout_ms, 5000);
        assert!(config.stats_path.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig {
            max_concurrency: 0,
            ..EngineConfig::in_memory()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_malformed_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(EngineConfig::load(file.path()).is_err());
    }
}
