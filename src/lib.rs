//! Concurrent TCP probing and protocol fingerprinting.
//!
//! [`scanner::Engine`] sweeps ports under a shared concurrency limit, sends adaptively ordered
//! probes to the open ones and identifies the replies with a confidence-scored parser set.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod network;
pub mod scanner;

pub use adaptive::{ProbeStatistics, StatisticsStore};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use scanner::{Engine, PortResult, ScanResult, ScanStatus, ScanTask};
