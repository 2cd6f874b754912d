//! One managed session to one monitoring station.
//!
//! A [`StationConnection`] pairs a transport wire with a message router and
//! implements the protocol operations as correlated request/response
//! exchanges: each operation sends one frame, claims the router's
//! single-shot slot for the expected response type, and suspends until the
//! response arrives or the request timeout fires. Unsolicited
//! `capture_request` and `error` frames are consumed through durable
//! subscriptions the connection holds on its own router.
//!
//! Recovery from any transport failure is a fresh socket: the event pump
//! resets the live state to disconnected and nothing reconnects
//! automatically.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use outpost_core::errors::{ErrorInfo, SessionError, TransportError};
use outpost_core::ids::{ConnectionId, ImageId, RequestId, StationId, UserId};
use outpost_core::protocol::{Frame, STATUS_STARTED, STATUS_STOPPED, frame_type};

use crate::router::{Router, Subscription, SubscriptionId};
use crate::transport::{Dialer, SocketEvent, Wire};
use crate::types::{CaptureRequest, ConnectionState, Phase};

/// Default time allowed for a correlated response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One managed session to one station URL: socket, router, protocol state.
pub struct StationConnection {
    id: ConnectionId,
    dialer: Arc<dyn Dialer>,
    router: Arc<Router>,
    state: Arc<RwLock<ConnectionState>>,
    wire: Mutex<Option<Arc<dyn Wire>>>,
    request_timeout: Duration,
}

impl StationConnection {
    /// Create a connection in `Disconnected` with fresh live state.
    ///
    /// Must be called from within a Tokio runtime: the intake tasks for
    /// unsolicited frames are spawned here and live as long as the
    /// connection does.
    #[must_use]
    pub fn new(id: ConnectionId, dialer: Arc<dyn Dialer>, request_timeout: Duration) -> Self {
        let router = Arc::new(Router::new());
        let state = Arc::new(RwLock::new(ConnectionState::fresh()));
        spawn_capture_intake(&router, &state, &id);
        spawn_error_intake(&router, &state, &id);
        Self {
            id,
            dialer,
            router,
            state,
            wire: Mutex::new(None),
            request_timeout,
        }
    }

    /// The registry-allocated identifier of this connection.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Clone of the live state at this instant.
    #[must_use]
    pub fn state_snapshot(&self) -> ConnectionState {
        self.state.read().clone()
    }

    /// Register an ad-hoc durable listener for one inbound frame type.
    pub fn subscribe(&self, event_type: &str) -> Subscription {
        self.router.subscribe(event_type)
    }

    /// Remove a listener registered with [`Self::subscribe`].
    pub fn unsubscribe(&self, event_type: &str, id: SubscriptionId) {
        self.router.unsubscribe(event_type, id);
    }

    // ─── Protocol operations ─────────────────────────────────────────────

    /// Open the socket. No-op success when already connected.
    pub async fn connect(&self, url: &str) -> Result<(), SessionError> {
        let mut wire_slot = self.wire.lock().await;
        if self.state.read().is_connected {
            debug!(connection = %self.id, "already connected");
            return Ok(());
        }

        self.state.write().phase = Phase::Connecting;
        info!(connection = %self.id, url, "connecting to station");
        match self.dialer.dial(url).await {
            Ok((wire, events)) => {
                *wire_slot = Some(wire);
                {
                    let mut state = self.state.write();
                    state.phase = Phase::Connected;
                    state.is_connected = true;
                    state.last_error = None;
                }
                let _ = tokio::spawn(pump(
                    self.id.clone(),
                    events,
                    Arc::clone(&self.router),
                    Arc::clone(&self.state),
                ));
                Ok(())
            }
            Err(e) => {
                self.state.write().phase = Phase::Disconnected;
                Err(self.fail(e.into()))
            }
        }
    }

    /// Run the configure exchange; resolves with the server-assigned
    /// connection id.
    pub async fn configure(
        &self,
        station_id: &StationId,
        user_id: &UserId,
        interval_minutes: u32,
    ) -> Result<String, SessionError> {
        let precheck = {
            let state = self.state.read();
            if !state.is_connected {
                Some(SessionError::NotConnected)
            } else if state.phase == Phase::Monitoring {
                Some(SessionError::MonitoringActive)
            } else {
                None
            }
        };
        if let Some(err) = precheck {
            return Err(self.fail(err));
        }

        self.state.write().phase = Phase::Configuring;
        let frame = Frame::Config {
            station_id: station_id.to_string(),
            user_id: user_id.to_string(),
            interval_minutes,
        };
        let response = match self.request(frame, frame_type::CONFIG_RESPONSE).await {
            Ok(value) => value,
            Err(e) => {
                self.revert_phase(Phase::Configuring, Phase::Connected);
                return Err(self.fail(e));
            }
        };

        match serde_json::from_value::<Frame>(response) {
            Ok(Frame::ConfigResponse {
                success: true,
                connection_id: Some(server_id),
            }) => {
                let mut state = self.state.write();
                state.phase = Phase::Configured;
                state.server_connection_id = Some(server_id.clone());
                state.last_error = None;
                drop(state);
                info!(connection = %self.id, server_id, "monitoring configured");
                Ok(server_id)
            }
            Ok(Frame::ConfigResponse { .. }) => {
                self.revert_phase(Phase::Configuring, Phase::Connected);
                Err(self.fail(SessionError::ConfigurationRejected))
            }
            Ok(_) | Err(_) => {
                warn!(connection = %self.id, "malformed config_response");
                self.revert_phase(Phase::Configuring, Phase::Connected);
                Err(self.fail(SessionError::ConfigurationRejected))
            }
        }
    }

    /// Ask the station to begin the capture schedule.
    pub async fn start_monitoring(&self) -> Result<(), SessionError> {
        let precheck = {
            let state = self.state.read();
            if !state.is_connected {
                Some(SessionError::NotConnected)
            } else {
                match state.phase {
                    Phase::Monitoring => Some(SessionError::MonitoringActive),
                    Phase::Configured => None,
                    _ => Some(SessionError::NotConfigured),
                }
            }
        };
        if let Some(err) = precheck {
            return Err(self.fail(err));
        }

        let response = self
            .request(Frame::StartMonitoring, frame_type::MONITORING_STATUS)
            .await
            .map_err(|e| self.fail(e))?;

        match monitoring_status(&self.id, response) {
            Some(status) if status == STATUS_STARTED => {
                let mut state = self.state.write();
                state.is_monitoring = true;
                state.phase = Phase::Monitoring;
                state.last_error = None;
                drop(state);
                info!(connection = %self.id, "monitoring started");
                Ok(())
            }
            Some(status) => Err(self.fail(SessionError::StartRejected { status })),
            None => Err(self.fail(SessionError::StartRejected {
                status: "unparseable".into(),
            })),
        }
    }

    /// Ask the station to halt the capture schedule.
    pub async fn stop_monitoring(&self) -> Result<(), SessionError> {
        let precheck = {
            let state = self.state.read();
            if !state.is_connected {
                Some(SessionError::NotConnected)
            } else if state.phase != Phase::Monitoring {
                Some(SessionError::NotMonitoring)
            } else {
                None
            }
        };
        if let Some(err) = precheck {
            return Err(self.fail(err));
        }

        let response = self
            .request(Frame::StopMonitoring, frame_type::MONITORING_STATUS)
            .await
            .map_err(|e| self.fail(e))?;

        match monitoring_status(&self.id, response) {
            Some(status) if status == STATUS_STOPPED => {
                let mut state = self.state.write();
                state.is_monitoring = false;
                state.phase = Phase::Configured;
                state.last_error = None;
                drop(state);
                info!(connection = %self.id, "monitoring stopped");
                Ok(())
            }
            Some(status) => Err(self.fail(SessionError::StopRejected { status })),
            None => Err(self.fail(SessionError::StopRejected {
                status: "unparseable".into(),
            })),
        }
    }

    /// Answer a pending capture request. Fire-and-forget: no station reply
    /// is awaited; the matching queue entry is dequeued on successful send.
    pub async fn send_capture_response(
        &self,
        image_id: &ImageId,
        image_url: &str,
        request_id: &RequestId,
        station_id: &StationId,
    ) -> Result<(), SessionError> {
        if !self.state.read().is_connected {
            return Err(self.fail(SessionError::NotConnected));
        }
        let frame = Frame::CaptureResponse {
            image_id: image_id.to_string(),
            image_url: image_url.to_string(),
            request_id: request_id.to_string(),
            station_id: station_id.to_string(),
        };
        match self.send_frame(&frame).await {
            Ok(()) => {
                let mut state = self.state.write();
                let before = state.pending_captures.len();
                state
                    .pending_captures
                    .retain(|req| req.request_id != *request_id);
                if state.pending_captures.len() == before {
                    debug!(connection = %self.id, request = %request_id,
                        "capture response matched no pending request");
                }
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Close the socket. Idempotent; live flags reset immediately.
    pub async fn disconnect(&self) {
        let wire = self.wire.lock().await.take();
        if let Some(wire) = wire {
            info!(connection = %self.id, "disconnecting from station");
            wire.close().await;
        }
        self.state.write().reset_live();
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    /// Send `frame` and wait for the first `response_type` frame, bounded
    /// by the request timeout.
    async fn request(&self, frame: Frame, response_type: &'static str) -> Result<Value, SessionError> {
        let rx = self.router.take_response(response_type)?;
        if let Err(e) = self.send_frame(&frame).await {
            self.router.cancel_response(response_type);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            // Slot dropped without an answer: the router went away with the
            // connection.
            Ok(Err(_)) => Err(TransportError::Closed.into()),
            Err(_) => {
                self.router.cancel_response(response_type);
                warn!(connection = %self.id, response_type, "correlated response timed out");
                Err(SessionError::Timeout {
                    event_type: response_type.to_string(),
                    timeout_ms: u64::try_from(self.request_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                })
            }
        }
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), SessionError> {
        let wire = self
            .wire
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)?;
        let json = frame
            .to_json()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        wire.send(json).await?;
        Ok(())
    }

    /// Record the failure on live state and hand it back to the caller.
    /// `last_error` is the single channel failures surface through.
    fn fail(&self, err: SessionError) -> SessionError {
        self.state.write().last_error = Some(err.info());
        err
    }

    fn revert_phase(&self, from: Phase, to: Phase) {
        let mut state = self.state.write();
        if state.phase == from {
            state.phase = to;
        }
    }

    pub(crate) fn shared_state(&self) -> Arc<RwLock<ConnectionState>> {
        Arc::clone(&self.state)
    }
}

/// Parse a `monitoring_status` frame, logging anything malformed.
fn monitoring_status(id: &ConnectionId, value: Value) -> Option<String> {
    match serde_json::from_value::<Frame>(value) {
        Ok(Frame::MonitoringStatus { status }) => Some(status),
        _ => {
            warn!(connection = %id, "malformed monitoring_status");
            None
        }
    }
}

/// Event pump: one task per live socket, draining events in transport
/// order. Ends when the socket emits its terminal `Closed`.
async fn pump(
    id: ConnectionId,
    mut events: mpsc::Receiver<SocketEvent>,
    router: Arc<Router>,
    state: Arc<RwLock<ConnectionState>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Message(text) => {
                let _ = router.dispatch(&text);
            }
            SocketEvent::Error(e) => {
                warn!(connection = %id, error = %e, "transport error");
                state.write().last_error = Some(ErrorInfo::from_transport(&e));
            }
            SocketEvent::Closed => break,
        }
    }
    state.write().reset_live();
    info!(connection = %id, "station link closed");
}

/// Durable intake of unsolicited `capture_request` frames into the pending
/// queue. Runs for the life of the connection.
fn spawn_capture_intake(
    router: &Arc<Router>,
    state: &Arc<RwLock<ConnectionState>>,
    id: &ConnectionId,
) {
    let mut sub = router.subscribe(frame_type::CAPTURE_REQUEST);
    let state = Arc::clone(state);
    let id = id.clone();
    let _ = tokio::spawn(async move {
        while let Some(value) = sub.rx.recv().await {
            match serde_json::from_value::<Frame>(value) {
                Ok(Frame::CaptureRequest {
                    image_id,
                    request_id,
                    station_id,
                }) => {
                    debug!(connection = %id, request = %request_id, "capture request queued");
                    state.write().pending_captures.push_back(CaptureRequest {
                        image_id: image_id.into(),
                        request_id: request_id.into(),
                        station_id: station_id.into(),
                    });
                }
                _ => warn!(connection = %id, "dropping malformed capture_request"),
            }
        }
    });
}

/// Durable intake of station `error` frames into `last_error`.
fn spawn_error_intake(
    router: &Arc<Router>,
    state: &Arc<RwLock<ConnectionState>>,
    id: &ConnectionId,
) {
    let mut sub = router.subscribe(frame_type::ERROR);
    let state = Arc::clone(state);
    let id = id.clone();
    let _ = tokio::spawn(async move {
        while let Some(value) = sub.rx.recv().await {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("station reported an error")
                .to_string();
            warn!(connection = %id, message, "station error frame");
            state.write().last_error = Some(ErrorInfo {
                code: "STATION_ERROR".into(),
                message,
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::testing::{FakeDialer, wait_until};

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn connection(dialer: &Arc<FakeDialer>) -> StationConnection {
        StationConnection::new(
            ConnectionId::from("conn-1"),
            Arc::clone(dialer) as Arc<dyn Dialer>,
            TIMEOUT,
        )
    }

    async fn connected(dialer: &Arc<FakeDialer>) -> StationConnection {
        let conn = connection(dialer);
        conn.connect("ws://station/ws").await.unwrap();
        conn
    }

    async fn configured(dialer: &Arc<FakeDialer>) -> StationConnection {
        let conn = connected(dialer).await;
        let _ = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap();
        conn
    }

    // ── connect ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_success_sets_connected() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let state = conn.state_snapshot();
        assert!(state.is_connected);
        assert!(!state.is_monitoring);
        assert_eq!(state.phase, Phase::Connected);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn connect_when_connected_is_noop() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        conn.connect("ws://station/ws").await.unwrap();
        assert_eq!(dialer.dial_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_records_error() {
        let dialer = Arc::new(FakeDialer::refusing());
        let conn = connection(&dialer);
        let err = conn.connect("ws://station/ws").await.unwrap_err();
        assert_matches!(
            err,
            SessionError::Transport(TransportError::ConnectFailed(_))
        );
        let state = conn.state_snapshot();
        assert_eq!(state.phase, Phase::Disconnected);
        assert!(!state.is_connected);
        assert_eq!(state.last_error.unwrap().code, "CONNECT_FAILED");
    }

    // ── configure ───────────────────────────────────────────────────

    #[tokio::test]
    async fn configure_requires_connection() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connection(&dialer);
        let err = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::NotConnected);
    }

    #[tokio::test]
    async fn configure_success_stores_server_id() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let server_id = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap();
        assert_eq!(server_id, "srv-st-1");
        let state = conn.state_snapshot();
        assert_eq!(state.phase, Phase::Configured);
        assert_eq!(state.server_connection_id.as_deref(), Some("srv-st-1"));
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn configure_rejected_stays_connected() {
        let dialer = Arc::new(FakeDialer::new(|frame| match frame {
            Frame::Config { .. } => vec![Frame::ConfigResponse {
                success: false,
                connection_id: None,
            }],
            _ => vec![],
        }));
        let conn = connected(&dialer).await;
        let err = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::ConfigurationRejected);
        let state = conn.state_snapshot();
        assert!(state.is_connected);
        assert_eq!(state.phase, Phase::Connected);
        assert!(state.server_connection_id.is_none());
        assert_eq!(state.last_error.unwrap().code, "CONFIGURATION_REJECTED");
    }

    #[tokio::test]
    async fn configure_timeout_frees_the_slot() {
        // Station that never answers configuration
        let dialer = Arc::new(FakeDialer::new(|_| vec![]));
        let conn = connected(&dialer).await;

        let err = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::Timeout { ref event_type, .. }
            if event_type == "config_response");

        // The orphaned listener was unregistered: the retry times out too
        // instead of failing with RequestInFlight.
        let err = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::Timeout { .. });
    }

    // ── start / stop ────────────────────────────────────────────────

    #[tokio::test]
    async fn start_requires_configured() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let err = conn.start_monitoring().await.unwrap_err();
        assert_matches!(err, SessionError::NotConfigured);
    }

    #[tokio::test]
    async fn start_requires_connection() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connection(&dialer);
        let err = conn.start_monitoring().await.unwrap_err();
        assert_matches!(err, SessionError::NotConnected);
    }

    #[tokio::test]
    async fn start_monitoring_success() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;
        conn.start_monitoring().await.unwrap();
        let state = conn.state_snapshot();
        assert!(state.is_monitoring);
        assert_eq!(state.phase, Phase::Monitoring);
    }

    #[tokio::test]
    async fn start_rejected_stays_configured() {
        let dialer = Arc::new(FakeDialer::new(|frame| match frame {
            Frame::Config { station_id, .. } => vec![Frame::ConfigResponse {
                success: true,
                connection_id: Some(format!("srv-{station_id}")),
            }],
            Frame::StartMonitoring => vec![Frame::MonitoringStatus {
                status: "station_busy".into(),
            }],
            _ => vec![],
        }));
        let conn = configured(&dialer).await;
        let err = conn.start_monitoring().await.unwrap_err();
        assert_matches!(err, SessionError::StartRejected { ref status } if status == "station_busy");
        let state = conn.state_snapshot();
        assert!(!state.is_monitoring);
        assert_eq!(state.phase, Phase::Configured);
    }

    #[tokio::test]
    async fn start_when_monitoring_fails() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;
        conn.start_monitoring().await.unwrap();
        let err = conn.start_monitoring().await.unwrap_err();
        assert_matches!(err, SessionError::MonitoringActive);
    }

    #[tokio::test]
    async fn stop_when_not_monitoring_fails() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;
        let err = conn.stop_monitoring().await.unwrap_err();
        assert_matches!(err, SessionError::NotMonitoring);
    }

    #[tokio::test]
    async fn stop_then_start_again() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;

        conn.start_monitoring().await.unwrap();
        conn.stop_monitoring().await.unwrap();
        let state = conn.state_snapshot();
        assert!(!state.is_monitoring);
        assert_eq!(state.phase, Phase::Configured);

        // Repeatable start/stop cycle
        conn.start_monitoring().await.unwrap();
        let state = conn.state_snapshot();
        assert!(state.is_monitoring);
        assert_eq!(state.phase, Phase::Monitoring);
    }

    #[tokio::test]
    async fn configure_while_monitoring_fails() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;
        conn.start_monitoring().await.unwrap();
        let err = conn
            .configure(&"st-1".into(), &"user-1".into(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::MonitoringActive);
    }

    // ── capture requests ────────────────────────────────────────────

    #[tokio::test]
    async fn capture_requests_are_queued_in_order() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let wire = dialer.wire();

        for i in 0..3 {
            wire.push(&Frame::CaptureRequest {
                image_id: format!("img-{i}"),
                request_id: format!("req-{i}"),
                station_id: "st-1".into(),
            })
            .await;
        }

        let state = conn.shared_state();
        wait_until(|| state.read().pending_captures.len() == 3).await;
        let snapshot = conn.state_snapshot();
        assert_eq!(snapshot.pending_captures[0].request_id.as_str(), "req-0");
        assert_eq!(snapshot.pending_captures[2].request_id.as_str(), "req-2");
    }

    #[tokio::test]
    async fn capture_response_dequeues_matching_request() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let wire = dialer.wire();

        for i in 0..3 {
            wire.push(&Frame::CaptureRequest {
                image_id: format!("img-{i}"),
                request_id: format!("req-{i}"),
                station_id: "st-1".into(),
            })
            .await;
        }
        let state = conn.shared_state();
        wait_until(|| state.read().pending_captures.len() == 3).await;

        conn.send_capture_response(
            &"img-1".into(),
            "https://cdn/img-1.jpg",
            &"req-1".into(),
            &"st-1".into(),
        )
        .await
        .unwrap();

        let snapshot = conn.state_snapshot();
        assert_eq!(snapshot.pending_captures.len(), 2);
        assert!(
            snapshot
                .pending_captures
                .iter()
                .all(|req| req.request_id.as_str() != "req-1")
        );
    }

    #[tokio::test]
    async fn capture_response_for_unknown_request_leaves_queue() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let wire = dialer.wire();

        wire.push(&Frame::CaptureRequest {
            image_id: "img-0".into(),
            request_id: "req-0".into(),
            station_id: "st-1".into(),
        })
        .await;
        let state = conn.shared_state();
        wait_until(|| state.read().pending_captures.len() == 1).await;

        conn.send_capture_response(
            &"img-9".into(),
            "https://cdn/img-9.jpg",
            &"req-9".into(),
            &"st-1".into(),
        )
        .await
        .unwrap();

        assert_eq!(conn.state_snapshot().pending_captures.len(), 1);
    }

    #[tokio::test]
    async fn capture_response_requires_connection() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connection(&dialer);
        let err = conn
            .send_capture_response(&"img".into(), "url", &"req".into(), &"st".into())
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::NotConnected);
    }

    #[tokio::test]
    async fn malformed_capture_request_is_dropped() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let wire = dialer.wire();

        wire.push_raw(r#"{"type":"capture_request","image_id":42}"#).await;
        wire.push(&Frame::CaptureRequest {
            image_id: "img-ok".into(),
            request_id: "req-ok".into(),
            station_id: "st-1".into(),
        })
        .await;

        let state = conn.shared_state();
        wait_until(|| state.read().pending_captures.len() == 1).await;
        assert_eq!(
            conn.state_snapshot().pending_captures[0].image_id.as_str(),
            "img-ok"
        );
    }

    // ── disconnect / server close ───────────────────────────────────

    #[tokio::test]
    async fn server_close_resets_live_state() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = configured(&dialer).await;
        conn.start_monitoring().await.unwrap();

        dialer.wire().drop_from_server().await;

        let state = conn.shared_state();
        wait_until(|| !state.read().is_connected).await;
        let snapshot = conn.state_snapshot();
        assert!(!snapshot.is_monitoring);
        assert!(snapshot.server_connection_id.is_none());
        assert_eq!(snapshot.phase, Phase::Disconnected);
        // No automatic reconnection
        assert_eq!(dialer.dial_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let wire = dialer.wire();

        conn.disconnect().await;
        conn.disconnect().await;

        assert_eq!(wire.close_count(), 1);
        let state = conn.state_snapshot();
        assert!(!state.is_connected);
        assert_eq!(state.phase, Phase::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_dials_again() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        conn.disconnect().await;
        conn.connect("ws://station/ws").await.unwrap();
        assert_eq!(dialer.dial_count(), 2);
        assert!(conn.state_snapshot().is_connected);
    }

    // ── error frames ────────────────────────────────────────────────

    #[tokio::test]
    async fn station_error_frame_surfaces_as_last_error() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        dialer
            .wire()
            .push_raw(r#"{"type":"error","message":"sensor offline"}"#)
            .await;

        let state = conn.shared_state();
        wait_until(|| state.read().last_error.is_some()).await;
        let err = conn.state_snapshot().last_error.unwrap();
        assert_eq!(err.code, "STATION_ERROR");
        assert_eq!(err.message, "sensor offline");
    }

    #[tokio::test]
    async fn ad_hoc_subscription_sees_frames() {
        let dialer = Arc::new(FakeDialer::accepting());
        let conn = connected(&dialer).await;
        let mut sub = conn.subscribe("monitoring_status");

        dialer
            .wire()
            .push_raw(r#"{"type":"monitoring_status","status":"started"}"#)
            .await;

        let value = tokio::time::timeout(Duration::from_secs(2), sub.rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["status"], "started");
    }
}
