//! Typed error surfaces for structural failures. Task-boundary and
//! aggregate failures stay on `anyhow::Error` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} as JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter {source_id} timed out after {millis}ms")]
    Timeout { source_id: String, millis: u64 },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("venue rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("could not converge after {attempts} attempts: {reason}")]
    Unconverged { attempts: u32, reason: String },
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
