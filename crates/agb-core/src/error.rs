//! Error taxonomy shared by the gateway, the metric calculator and config loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::assets::AssetKey;

/// Failure of a remote asset query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The asset key does not resolve to a remote object.
    #[error("asset not found: {0}")]
    NotFound(AssetKey),
    /// The remote query ran but failed, or returned a payload we cannot read.
    #[error("compute error: {0}")]
    Compute(String),
    /// The request never produced an answer (connection, timeout, 429/5xx).
    /// The only variant the retry policy acts on.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

/// A derived metric is undefined for the given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("no data: {0}")]
    NoData(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
