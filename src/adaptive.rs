use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Running counters for one probe. `hit_rate` is always `successful / sent` (0 before first use).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatistics {
    pub name: String,
    pub sent: u64,
    pub successful: u64,
    pub hit_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl ProbeStatistics {
    pub fn new(name: &str) -> Self {
        ProbeStatistics {
            name: name.to_string(),
            sent: 0,
            successful: 0,
            hit_rate: 0.0,
            last_updated: Utc::now(),
        }
    }

    fn recompute(&mut self) {
        self.successful = self.successful.min(self.sent);
        self.hit_rate = if self.sent > 0 {
            self.successful as f64 / self.sent as f64
        } else {
            0.0
        };
    }

    fn merge(&mut self, stored: &ProbeStatistics) {
        self.sent = self.sent.saturating_add(stored.sent);
        self.successful = self.successful.saturating_add(stored.successful);
        self.last_updated = self.last_updated.max(stored.last_updated);
        self.recompute();
    }
}

/// On-disk layout of the statistics file.
#[derive(Debug, Serialize, Deserialize)]
struct StatisticsFile {
    stats: BTreeMap<String, ProbeStatistics>,
    last_save: DateTime<Utc>,
}

/// Per-probe hit-rate table shared by every identification task of an engine.
///
/// All reads and writes go through one `RwLock`. File writes are serialized by a separate mutex so
/// a background save never interleaves with an explicit one.
#[derive(Debug)]
pub struct StatisticsStore {
    stats: RwLock<BTreeMap<String, ProbeStatistics>>,
    path: Option<PathBuf>,
    save_lock: Mutex<()>,
}

impl StatisticsStore {
    /// Creates a zeroed entry for every known probe name.
    pub fn new<'a>(probe_names: impl IntoIterator<Item = &'a str>, path: Option<PathBuf>) -> Self {
        let stats = probe_names
            .into_iter()
            .map(|name| (name.to_string(), ProbeStatistics::new(name)))
            .collect();
        StatisticsStore {
            stats: RwLock::new(stats),
            path,
            save_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Adds the stored counters onto the in-memory ones. Returns how many entries were merged.
    ///
    /// A missing file is not an error; the first run simply starts from zero.
    pub fn load(&self) -> Result<usize> {
        let Some(path) = self.path.as_deref() else {
            return Ok(0);
        };
        if !path.exists() {
            debug!(path = %path.display(), "no statistics file yet");
            return Ok(0);
        }

        let content = fs::read_to_string(path).map_err(|e| EngineError::stats(path, e))?;
        let file: StatisticsFile =
            serde_json::from_str(&content).map_err(|e| EngineError::stats(path, e))?;

        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let merged = file.stats.len();
        for (name, stored) in file.stats {
            stats
                .entry(name.clone())
                .or_insert_with(|| ProbeStatistics::new(&name))
                .merge(&stored);
        }
        info!(path = %path.display(), entries = merged, "loaded probe statistics");
        Ok(merged)
    }

    pub fn record_outcome(&self, probe: &str, succeeded: bool) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let entry = stats
            .entry(probe.to_string())
            .or_insert_with(|| ProbeStatistics::new(probe));
        entry.sent += 1;
        if succeeded {
            entry.successful += 1;
        }
        entry.recompute();
        entry.last_updated = Utc::now();
    }

    pub fn hit_rate(&self, probe: &str) -> f64 {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(probe)
            .map_or(0.0, |s| s.hit_rate)
    }

    pub fn get(&self, probe: &str) -> Option<ProbeStatistics> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(probe)
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, ProbeStatistics> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries ordered best first: hit rate, then attempts, then name.
    pub fn ranked(&self) -> Vec<ProbeStatistics> {
        let mut entries: Vec<ProbeStatistics> = self.snapshot().into_values().collect();
        entries.sort_by(|a, b| {
            b.hit_rate
                .total_cmp(&a.hit_rate)
                .then(b.sent.cmp(&a.sent))
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    /// Writes the current table, replacing the file atomically through a temporary sibling.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let file = StatisticsFile {
            stats: self.snapshot(),
            last_save: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| EngineError::stats(path, e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EngineError::stats(path, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| EngineError::stats(path, e))?;
        fs::rename(&tmp, path).map_err(|e| EngineError::stats(path, e))?;

        debug!(path = %path.display(), entries = file.stats.len(), "saved probe statistics");
        Ok(())
    }

    /// Fire-and-forget save on the blocking pool. Failures are logged.
    pub fn save_in_background(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save() {
                warn!(error = %e, "statistics save failed");
            }
        })
    }

    /// Saves every `interval` until `cancel` fires, then once more on the way out.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = store.save_in_background().await;
                    }
                }
            }
            let _ = store.save_in_background().await;
        })
    }
}
