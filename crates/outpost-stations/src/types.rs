//! Data model for managed station connections.
//!
//! Two halves with very different lifetimes:
//!
//! - [`StationConfig`] is durable: persisted on every mutation, survives
//!   process restarts, and is the single source of truth for what should
//!   exist.
//! - [`ConnectionState`] is live: created fresh whenever a connection object
//!   is instantiated and reset whenever the socket goes away. Sockets cannot
//!   be serialized, so none of it is ever persisted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use outpost_core::errors::ErrorInfo;
use outpost_core::ids::{ConnectionId, ImageId, RequestId, StationId, UserId};

/// Bounds for a valid capture interval, in minutes (one minute to one day).
pub const INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=1440;

/// Durable configuration of one managed connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
    /// Registry-allocated identifier, also the persistence key.
    pub id: ConnectionId,
    /// Transport URL of the station endpoint.
    pub url: String,
    /// Station this connection monitors.
    pub station_id: StationId,
    /// Capture interval in minutes (1..=1440).
    pub interval_minutes: u32,
    /// Operator that owns this connection.
    pub user_id: UserId,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// ISO-8601 timestamp of the last edit.
    pub updated_at: String,
}

/// Input for creating a connection. The registry allocates the id and fills
/// in the owning user.
#[derive(Clone, Debug)]
pub struct NewConnection {
    /// Transport URL of the station endpoint.
    pub url: String,
    /// Station to monitor.
    pub station_id: StationId,
    /// Capture interval in minutes (1..=1440).
    pub interval_minutes: u32,
}

/// Partial edit of a persisted config. `None` fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct ConfigUpdate {
    /// New transport URL.
    pub url: Option<String>,
    /// New station id.
    pub station_id: Option<StationId>,
    /// New capture interval in minutes.
    pub interval_minutes: Option<u32>,
}

/// Lifecycle phase of a connection's session state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No live socket. The only phase that survives a restart.
    #[default]
    Disconnected,
    /// Socket open in progress.
    Connecting,
    /// Socket open, configure exchange not yet completed.
    Connected,
    /// Configure exchange in flight.
    Configuring,
    /// Station accepted the configuration; monitoring can start.
    Configured,
    /// Capture schedule running on the station.
    Monitoring,
}

/// Server-initiated capture demand awaiting a client reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Image the station expects.
    pub image_id: ImageId,
    /// Correlation id to echo in the response.
    pub request_id: RequestId,
    /// Station that issued the demand.
    pub station_id: StationId,
}

/// Live, non-durable state of one connection.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Current state-machine phase.
    pub phase: Phase,
    /// Whether the socket is open.
    pub is_connected: bool,
    /// Whether the station is running the capture schedule.
    pub is_monitoring: bool,
    /// Server-assigned session id from the last successful configure
    /// exchange. Non-null only while connected.
    pub server_connection_id: Option<String>,
    /// Most recent failure surfaced to the operator.
    pub last_error: Option<ErrorInfo>,
    /// Server-initiated capture requests not yet answered, oldest first.
    pub pending_captures: VecDeque<CaptureRequest>,
}

impl ConnectionState {
    /// Fresh all-false/empty state, as created at registry load or add.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Reset everything tied to the live socket. `last_error` and the
    /// pending capture queue are preserved — the operator may still want to
    /// see them after a drop.
    pub(crate) fn reset_live(&mut self) {
        self.phase = Phase::Disconnected;
        self.is_connected = false;
        self.is_monitoring = false;
        self.server_connection_id = None;
    }
}

/// Read-only (config, live state) pair for presentation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSnapshot {
    /// The durable record.
    pub config: StationConfig,
    /// Live state at the time of the read.
    pub state: ConnectionState,
}
