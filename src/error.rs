use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Timeout, refusal or unreachable host while connecting. Callers treat the port as closed.
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// Reading or writing the probe failed. Callers treat this as an empty banner.
    #[error("capture from {addr} failed: {source}")]
    Capture {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{protocol} parser rejected input: {reason}")]
    Parse { protocol: String, reason: String },

    #[error("statistics file {path}: {reason}")]
    StatisticsPersistence { path: PathBuf, reason: String },

    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("task {task_id}: {reason}")]
    Task { task_id: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn stats(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        EngineError::StatisticsPersistence {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
