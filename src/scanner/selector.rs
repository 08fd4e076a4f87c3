use std::sync::Arc;

use crate::adaptive::StatisticsStore;
use crate::scanner::ports;
use crate::scanner::probes::{Probe, ProbeCatalog};

/// Orders catalog probes by their recorded hit rate.
///
/// Hit rates are read once per selection, so outcomes recorded while a port is being probed only
/// affect later selections.
#[derive(Debug, Clone)]
pub struct ProbeSelector {
    catalog: Arc<ProbeCatalog>,
    stats: Arc<StatisticsStore>,
}

impl ProbeSelector {
    pub fn new(catalog: Arc<ProbeCatalog>, stats: Arc<StatisticsStore>) -> Self {
        Self { catalog, stats }
    }

    pub fn catalog(&self) -> &ProbeCatalog {
        &self.catalog
    }

    /// Candidates for a protocol hint, or the whole catalog without one, best first.
    ///
    /// Equal hit rates keep catalog declaration order.
    pub fn select_probes(&self, protocol_hint: Option<&str>) -> Vec<Probe> {
        let candidates: Vec<&Probe> = match protocol_hint {
            Some(hint) => self.catalog.by_protocol(hint),
            None => self.catalog.probes().iter().collect(),
        };

        let snapshot = self.stats.snapshot();
        let rate = |probe: &Probe| snapshot.get(probe.name).map_or(0.0, |s| s.hit_rate);

        let mut ranked: Vec<(f64, &Probe)> = candidates.into_iter().map(|p| (rate(p), p)).collect();
        // stable: ties stay in catalog order
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().map(|(_, p)| p.clone()).collect()
    }

    /// Probes to send to one open port.
    ///
    /// The fast path sends the best probe for the port's hinted protocol, or just listens for a
    /// greeting. Deep mode walks the ranked catalog, capped at `scan_depth` when non-zero.
    pub fn plan(&self, port: u16, deep: bool, scan_depth: usize) -> Vec<Probe> {
        if deep {
            let mut probes = self.select_probes(None);
            if scan_depth > 0 {
                probes.truncate(scan_depth);
            }
            return probes;
        }

        let hinted = ports::protocol_hint(port)
            .and_then(|hint| self.select_probes(Some(hint)).into_iter().next());
        match hinted {
            Some(probe) => vec![probe],
            None => self
                .catalog
                .probes()
                .iter()
                .find(|p| p.is_null())
                .cloned()
                .into_iter()
                .collect(),
        }
    }

    pub fn record_outcome(&self, probe: &str, succeeded: bool) {
        self.stats.record_outcome(probe, succeeded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> ProbeSelector {
        let catalog = Arc::new(ProbeCatalog::builtin());
        let stats = Arc::new(StatisticsStore::new(catalog.names(), None));
        ProbeSelector::new(catalog, stats)
    }

    fn names(probes: &[Probe]) -> Vec<&'static str> {
        probes.iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_untouched_stats_keep_catalog_order() {
        let selector = selector();
        let all = selector.select_probes(None);
        let catalog: Vec<_> = selector.catalog().names().collect();
        assert_eq!(names(&all), catalog);
    }

    #[test]
    fn test_successful_probe_moves_ahead_of_failing_one() {
        let selector = selector();
        for _ in 0..3 {
            selector.record_outcome("RTSPDescribe", true);
        }
        selector.record_outcome("RTSPOptions", false);

        let rtsp = selector.select_probes(Some("rtsp"));
        assert_eq!(names(&rtsp), vec!["RTSPDescribe", "RTSPOptions"]);

        let all = selector.select_probes(None);
        let x = all.iter().position(|p| p.name == "RTSPDescribe").unwrap();
        let y = all.iter().position(|p| p.name == "RTSPOptions").unwrap();
        assert!(x < y);
        assert_eq!(x, 0);
    }

    #[test]
    fn test_fast_path_uses_port_hint() {
        let selector = selector();
        assert_eq!(names(&selector.plan(22, false, 0)), vec!["SSHVersionExchange"]);
        assert_eq!(names(&selector.plan(502, false, 0)), vec!["ModbusReadCoils"]);
        assert_eq!(names(&selector.plan(31337, false, 0)), vec!["NULL"]);
    }

    #[test]
    fn test_deep_mode_respects_depth() {
        let selector = selector();
        let total = selector.catalog().len();
        assert_eq!(selector.plan(80, true, 0).len(), total);
        assert_eq!(selector.plan(80, true, 3).len(), 3);
        assert_eq!(selector.plan(80, true, total + 10).len(), total);
    }

    #[test]
    fn test_unknown_hint_selects_nothing() {
        let selector = selector();
        assert!(selector.select_probes(Some("gopher")).is_empty());
    }
}
