pub mod aggregator;
pub mod banner_rules;
pub mod capture;
pub mod ports;
pub mod probes;
pub mod protocol_parsers;
pub mod results;
pub mod selector;
pub mod tcp;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adaptive::StatisticsStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::network::{SystemResolver, TargetResolver};
use aggregator::{Observation, ResultAggregator};
use capture::{capture, http_get_request, CaptureSettings};
use probes::ProbeCatalog;
pub use results::{
    IdentificationSource, L4Protocol, PortResult, PortState, ScanResult, ScanStatus, ScanTask, Target,
};
use selector::ProbeSelector;
use tcp::{OpenPortHandler, PortScanner};

/// Probe name reported when the HTTP GET retry on a silent web port produced the identification.
pub const HTTP_FALLBACK_PROBE: &str = "HTTPFallbackGet";

/// Probes open ports and fingerprints what answers.
///
/// One engine serves any number of tasks; the probe statistics it learns from carry over between
/// them and are persisted to `EngineConfig::stats_path`.
pub struct Engine {
    config: EngineConfig,
    catalog: Arc<ProbeCatalog>,
    stats: Arc<StatisticsStore>,
    selector: ProbeSelector,
    aggregator: Arc<ResultAggregator>,
    resolver: Arc<dyn TargetResolver>,
    scanner: PortScanner,
}

impl Engine {
    /// Builds the catalog and statistics store and loads any saved statistics.
    ///
    /// Only an invalid configuration is an error. An unreadable statistics file is logged and the
    /// engine starts with fresh counters.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(ProbeCatalog::builtin());
        let stats = Arc::new(StatisticsStore::new(catalog.names(), config.stats_path.clone()));
        if let Err(e) = stats.load() {
            warn!(error = %e, "ignoring saved probe statistics");
        }

        let selector = ProbeSelector::new(Arc::clone(&catalog), Arc::clone(&stats));
        let scanner = PortScanner::with_limit(config.max_concurrency, config.politeness_delay());
        Ok(Self {
            config,
            catalog,
            stats,
            selector,
            aggregator: Arc::new(ResultAggregator::default()),
            resolver: Arc::new(SystemResolver),
            scanner,
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ProbeCatalog {
        &self.catalog
    }

    pub fn statistics(&self) -> &Arc<StatisticsStore> {
        &self.stats
    }

    /// Starts the periodic statistics save if an interval is configured.
    pub fn start_autosave(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if self.config.autosave_interval_secs == 0 || self.stats.path().is_none() {
            return None;
        }
        let interval = Duration::from_secs(self.config.autosave_interval_secs);
        Some(self.stats.spawn_autosave(interval, cancel))
    }

    /// Runs a task to completion and returns one result per target.
    ///
    /// Targets are scanned concurrently and share the engine-wide concurrency limit, which also
    /// bounds tasks running side by side on the same engine. A target that
    /// fails to resolve gets a failed result without affecting the others. Cancelling `cancel`
    /// stops admitting new ports; partially scanned targets come back as `Cancelled`.
    pub async fn execute(&self, task: &ScanTask, cancel: &CancellationToken) -> Vec<ScanResult> {
        if task.targets.is_empty() {
            let error = EngineError::Task {
                task_id: task.id.clone(),
                reason: "no targets".into(),
            };
            warn!(task = %task.id, "task has no targets");
            return vec![ScanResult::failed(&task.id, "", error)];
        }

        let ports: Vec<u16> = if task.ports.is_empty() {
            ports::DEFAULT_PORTS.to_vec()
        } else {
            let mut ports = task.ports.clone();
            ports.sort_unstable();
            ports.dedup();
            ports
        };

        info!(
            task = %task.id,
            targets = task.targets.len(),
            ports = ports.len(),
            deep = task.enable_deep_fingerprint,
            "starting task"
        );

        let handler: Arc<dyn OpenPortHandler> = Arc::new(PortIdentifier {
            selector: self.selector.clone(),
            aggregator: Arc::clone(&self.aggregator),
            settings: CaptureSettings::from(&self.config),
            connect_timeout: task.per_port_timeout(),
            deep: task.enable_deep_fingerprint,
            scan_depth: task.scan_depth,
            confident_threshold: self.config.confident_threshold,
            early_exit_confidence: self.config.early_exit_confidence,
            cancel: cancel.clone(),
        });

        let scans = task
            .targets
            .iter()
            .map(|target| self.scan_target(task, target, &ports, Arc::clone(&handler), cancel));
        let results = join_all(scans).await;

        let _ = self.stats.save_in_background();

        let open: usize = results.iter().map(|r| r.open_ports().count()).sum();
        info!(task = %task.id, open_ports = open, "task finished");
        results
    }

    async fn scan_target(
        &self,
        task: &ScanTask,
        target: &str,
        ports: &[u16],
        handler: Arc<dyn OpenPortHandler>,
        cancel: &CancellationToken,
    ) -> ScanResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let host = match self.resolver.resolve(target).await {
            Ok(host) => host,
            Err(e) => {
                warn!(target_spec = target, error = %e, "target skipped");
                return ScanResult::failed(&task.id, target, e);
            }
        };

        let mut port_results = self
            .scanner
            .scan(host, ports, task.per_port_timeout(), handler, cancel)
            .await;
        port_results.sort_by_key(|p| p.port);

        let status = if cancel.is_cancelled() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Success
        };
        debug!(target_spec = target, %host, open = port_results.len(), %status, "target done");

        ScanResult {
            task_id: task.id.clone(),
            target: target.to_string(),
            status,
            ports: port_results,
            response_time_ms: clock.elapsed().as_millis() as u64,
            error_message: None,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Probes one open port and builds its `PortResult`.
struct PortIdentifier {
    selector: ProbeSelector,
    aggregator: Arc<ResultAggregator>,
    settings: CaptureSettings,
    connect_timeout: Duration,
    deep: bool,
    scan_depth: usize,
    confident_threshold: u8,
    early_exit_confidence: u8,
    cancel: CancellationToken,
}

impl PortIdentifier {
    fn observe(&self, probe: &str, bytes: Vec<u8>) -> Observation {
        let parsed = self.aggregator.identify(&bytes);
        Observation {
            probe: probe.to_string(),
            bytes,
            parsed,
        }
    }

    async fn exchange(&self, stream: &mut TcpStream, payload: &[u8], peer: &str) -> Vec<u8> {
        match capture(stream, payload, &self.settings, peer).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "capture failed, treating as empty response");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl OpenPortHandler for PortIdentifier {
    async fn on_open(&self, target: Target, stream: TcpStream) -> PortResult {
        let plan = self.selector.plan(target.port, self.deep, self.scan_depth);
        let peer = target.to_string();
        let mut first = Some(stream);
        let mut best: Option<Observation> = None;

        for (attempt, probe) in plan.iter().enumerate() {
            // The sweep's connection serves the first probe; later probes need a fresh one.
            let mut stream = match first.take() {
                Some(stream) => stream,
                None => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    match tcp::connect(target, self.connect_timeout).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            debug!(error = %e, "reconnect failed, stopping probes");
                            break;
                        }
                    }
                }
            };

            let bytes = self.exchange(&mut stream, &probe.payload, &peer).await;
            let mut observation = self.observe(probe.name, bytes);
            let hit = observation.confidence() >= self.confident_threshold;
            self.selector.record_outcome(probe.name, hit);
            debug!(
                %target,
                probe = probe.name,
                bytes = observation.bytes.len(),
                confidence = observation.confidence(),
                hit,
                "probe finished"
            );

            if attempt == 0 && observation.bytes.is_empty() && ports::is_http_port(target.port) {
                let request = http_get_request(&target.host.to_string());
                let bytes = self.exchange(&mut stream, &request, &peer).await;
                if !bytes.is_empty() {
                    observation = self.observe(HTTP_FALLBACK_PROBE, bytes);
                }
            }

            let done = observation.confidence() >= self.early_exit_confidence;
            best = match best {
                Some(current) if !observation.beats(&current) => Some(current),
                _ => Some(observation),
            };
            if done {
                break;
            }
        }

        self.aggregator.finish(target.port, best)
    }
}
