use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// One scan unit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub host: IpAddr,
    pub port: u16,
}

impl Target {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L4Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
        }
    }
}

/// Which layer produced a port's identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationSource {
    Parser,
    Rule,
    PortHeuristic,
    None,
}

impl std::fmt::Display for IdentificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentificationSource::Parser => write!(f, "parser"),
            IdentificationSource::Rule => write!(f, "rule"),
            IdentificationSource::PortHeuristic => write!(f, "port_heuristic"),
            IdentificationSource::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortResult {
    pub port: u16,
    pub l4_protocol: L4Protocol,
    pub state: PortState,
    pub service: String,
    pub version: String,
    pub product: String,
    pub os: String,
    pub banner: String,
    pub confidence: u8,
    pub source: IdentificationSource,
    pub probe: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl PortResult {
    /// A TCP port the scanner connected to, not yet identified.
    pub fn open(port: u16) -> Self {
        PortResult {
            port,
            l4_protocol: L4Protocol::Tcp,
            state: PortState::Open,
            service: String::new(),
            version: String::new(),
            product: String::new(),
            os: String::new(),
            banner: String::new(),
            confidence: 0,
            source: IdentificationSource::None,
            probe: None,
            fields: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTask {
    pub id: String,
    pub targets: Vec<String>,
    /// Empty means the default port set.
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default = "default_per_port_timeout_ms")]
    pub per_port_timeout_ms: u64,
    /// Probes tried per open port in deep mode; 0 tries the whole catalog.
    #[serde(default)]
    pub scan_depth: usize,
    #[serde(default)]
    pub enable_deep_fingerprint: bool,
}

fn default_per_port_timeout_ms() -> u64 {
    3000
}

impl ScanTask {
    pub fn new(id: impl Into<String>, targets: Vec<String>, ports: Vec<u16>) -> Self {
        ScanTask {
            id: id.into(),
            targets,
            ports,
            per_port_timeout_ms: default_per_port_timeout_ms(),
            scan_depth: 0,
            enable_deep_fingerprint: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_port_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn deep(mut self, scan_depth: usize) -> Self {
        self.enable_deep_fingerprint = true;
        self.scan_depth = scan_depth;
        self
    }

    pub fn per_port_timeout(&self) -> Duration {
        Duration::from_millis(self.per_port_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Success => write!(f, "success"),
            ScanStatus::Failed => write!(f, "failed"),
            ScanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub task_id: String,
    pub target: String,
    pub status: ScanStatus,
    pub ports: Vec<PortResult>,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    /// A result for a target that never got as far as scanning.
    pub fn failed(task_id: &str, target: &str, error: impl std::fmt::Display) -> Self {
        let now = Utc::now();
        ScanResult {
            task_id: task_id.to_string(),
            target: target.to_string(),
            status: ScanStatus::Failed,
            ports: Vec::new(),
            response_time_ms: 0,
            error_message: Some(error.to_string()),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.ports.iter().filter(|p| p.state == PortState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_result_serializes_lowercase() {
        let mut result = PortResult::open(22);
        result.source = IdentificationSource::PortHeuristic;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], "open");
        assert_eq!(json["l4_protocol"], "tcp");
        assert_eq!(json["source"], "port_heuristic");
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn test_task_defaults_from_json() {
        let task: ScanTask =
            serde_json::from_str(r#"{"id":"t1","targets":["127.0.0.1"]}"#).unwrap();
        assert!(task.ports.is_empty());
        assert_eq!(task.per_port_timeout(), Duration::from_millis(3000));
        assert!(!task.enable_deep_fingerprint);
    }

    #[test]
    fn test_failed_result_carries_message() {
        let result = ScanResult::failed("t", "nowhere.invalid", "resolution failed");
        assert_eq!(result.status, ScanStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("resolution failed"));
        assert_eq!(result.open_ports().count(), 0);
    }
}
