//! Error hierarchy for the station session subsystem.
//!
//! Three layers, all built on [`thiserror`]:
//!
//! - [`TransportError`]: socket-level failures (connect, send, unexpected
//!   close)
//! - [`SessionError`]: everything an operation on a connection or the
//!   registry can fail with — preconditions, server rejections, timeouts
//! - [`StorageError`]: durable config store failures
//!
//! [`ErrorInfo`] is the serializable surface form: the `last_error` field on
//! a connection's live state carries one so the dashboard can render or
//! retry without understanding the full hierarchy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Socket-level failure on the persistent station link.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the socket failed.
    #[error("failed to connect: {0}")]
    ConnectFailed(String),
    /// The socket is not open.
    #[error("socket is closed")]
    Closed,
    /// An outbound frame could not be written.
    #[error("send failed: {0}")]
    SendFailed(String),
    /// The socket failed mid-stream.
    #[error("socket error: {0}")]
    Socket(String),
}

/// Durable config store failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Filesystem error opening the store.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything a session operation can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport layer failed.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Operation requires an established connection.
    #[error("connection is not established")]
    NotConnected,
    /// Operation requires a completed configure exchange.
    #[error("monitoring has not been configured")]
    NotConfigured,
    /// Operation requires monitoring to be active.
    #[error("monitoring is not active")]
    NotMonitoring,
    /// Operation cannot run while monitoring is active.
    #[error("monitoring is already active")]
    MonitoringActive,

    /// The station rejected the configure exchange.
    #[error("station rejected the configuration")]
    ConfigurationRejected,
    /// The station answered a start request with a status other than
    /// `"started"`.
    #[error("station rejected start request (status: {status})")]
    StartRejected {
        /// Status value the station reported.
        status: String,
    },
    /// The station answered a stop request with a status other than
    /// `"stopped"`.
    #[error("station rejected stop request (status: {status})")]
    StopRejected {
        /// Status value the station reported.
        status: String,
    },

    /// No connection exists with the given id.
    #[error("no connection with id {0}")]
    UnknownConnection(String),
    /// A correlated request for the same response type is already pending
    /// on this connection. The wire protocol carries no request id, so
    /// overlapping same-type requests cannot be told apart.
    #[error("a request awaiting {0} is already in flight")]
    RequestInFlight(String),
    /// The correlated response did not arrive in time.
    #[error("timed out after {timeout_ms} ms waiting for {event_type}")]
    Timeout {
        /// Response type that was awaited.
        event_type: String,
        /// How long the wait lasted.
        timeout_ms: u64,
    },

    /// A supplied configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The durable config store failed.
    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::ConnectFailed(_)) => "CONNECT_FAILED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::NotMonitoring => "NOT_MONITORING",
            Self::MonitoringActive => "MONITORING_ACTIVE",
            Self::ConfigurationRejected => "CONFIGURATION_REJECTED",
            Self::StartRejected { .. } => "START_REJECTED",
            Self::StopRejected { .. } => "STOP_REJECTED",
            Self::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            Self::RequestInFlight(_) => "REQUEST_IN_FLIGHT",
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Serializable surface form for live state / the dashboard.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Surface form of an error, carried on a connection's live state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable code (e.g. `CONNECT_FAILED`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    /// Build an `ErrorInfo` from a transport failure.
    #[must_use]
    pub fn from_transport(err: &TransportError) -> Self {
        SessionError::Transport(err.clone()).info()
    }
}
