//! Wire protocol for the persistent station link.
//!
//! Every frame is a JSON object tagged by a `type` field. The client sends
//! `config`, `start_monitoring`, `stop_monitoring`, and `capture_response`;
//! the station replies with `config_response` and `monitoring_status`, and
//! may push unsolicited `capture_request` and `error` frames at any time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frame `type` tags as plain strings, for addressing the message router
/// with ad-hoc event types.
pub mod frame_type {
    /// Client → station: configure monitoring for a station.
    pub const CONFIG: &str = "config";
    /// Station → client: configuration acknowledgement.
    pub const CONFIG_RESPONSE: &str = "config_response";
    /// Client → station: begin the capture schedule.
    pub const START_MONITORING: &str = "start_monitoring";
    /// Client → station: halt the capture schedule.
    pub const STOP_MONITORING: &str = "stop_monitoring";
    /// Station → client: start/stop acknowledgement.
    pub const MONITORING_STATUS: &str = "monitoring_status";
    /// Station → client: unsolicited demand for an image.
    pub const CAPTURE_REQUEST: &str = "capture_request";
    /// Client → station: reply to a capture request.
    pub const CAPTURE_RESPONSE: &str = "capture_response";
    /// Station → client: free-form error report.
    pub const ERROR: &str = "error";
}

/// Monitoring status value a station reports after a start request was
/// accepted.
pub const STATUS_STARTED: &str = "started";
/// Monitoring status value a station reports after a stop request was
/// accepted.
pub const STATUS_STOPPED: &str = "stopped";

/// A single wire frame, in either direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Configure monitoring for one station on behalf of one operator.
    Config {
        /// Station to monitor.
        station_id: String,
        /// Operator that owns this session.
        user_id: String,
        /// Capture interval in minutes.
        interval_minutes: u32,
    },
    /// Station acknowledgement of a `config` frame.
    ConfigResponse {
        /// Whether the station accepted the configuration.
        success: bool,
        /// Server-assigned session identifier, present on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },
    /// Begin the capture schedule.
    StartMonitoring,
    /// Halt the capture schedule.
    StopMonitoring,
    /// Station acknowledgement of a start/stop request.
    MonitoringStatus {
        /// `"started"`, `"stopped"`, or an implementation-defined rejection
        /// value.
        status: String,
    },
    /// Unsolicited station demand for a client-side capture.
    CaptureRequest {
        /// Image the station expects.
        image_id: String,
        /// Correlation id the client must echo back.
        request_id: String,
        /// Station that issued the demand.
        station_id: String,
    },
    /// Client reply to a [`Frame::CaptureRequest`].
    CaptureResponse {
        /// Image that was captured.
        image_id: String,
        /// Where the captured image was uploaded.
        image_url: String,
        /// Echo of the request id being answered.
        request_id: String,
        /// Station the capture belongs to.
        station_id: String,
    },
    /// Free-form error report from the station.
    Error {
        /// Human-readable message, when the station provides one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Any additional implementation-defined fields.
        #[serde(flatten)]
        details: Map<String, Value>,
    },
}

impl Frame {
    /// The `type` tag this frame serializes with.
    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::Config { .. } => frame_type::CONFIG,
            Self::ConfigResponse { .. } => frame_type::CONFIG_RESPONSE,
            Self::StartMonitoring => frame_type::START_MONITORING,
            Self::StopMonitoring => frame_type::STOP_MONITORING,
            Self::MonitoringStatus { .. } => frame_type::MONITORING_STATUS,
            Self::CaptureRequest { .. } => frame_type::CAPTURE_REQUEST,
            Self::CaptureResponse { .. } => frame_type::CAPTURE_RESPONSE,
            Self::Error { .. } => frame_type::ERROR,
        }
    }

    /// Serialize to the wire representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
