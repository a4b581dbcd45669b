//! Error types shared by the transport, action and configuration layers.

use thiserror::Error;

/// A request that never produced an HTTP status.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure or timeout.
    #[error("network failure: {0}")]
    Network(String),

    /// The load-test runtime refused to build or record the request.
    #[error("harness error: {0}")]
    Harness(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Why a reservation action could not produce a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Every attempt hit a network fault or a 5xx.
    #[error("service unavailable after retries (last status: {status:?})")]
    Unavailable { status: Option<u16> },

    /// A terminal status the action does not treat as success.
    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    /// The body could not be read as the expected shape.
    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read users file {path}: {source}")]
    UsersFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse users file {path}: {source}")]
    UsersFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
