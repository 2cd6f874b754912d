//! In-memory socket fakes and scripted station behaviors for unit tests.
//!
//! A [`FakeDialer`] hands out [`FakeWire`]s: frames the client sends are fed
//! to a responder closure playing the station, whose replies come back as
//! inbound socket events. Tests can also push unsolicited frames or drop the
//! link from the server side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use outpost_core::errors::TransportError;
use outpost_core::protocol::{Frame, STATUS_STARTED, STATUS_STOPPED};

use crate::transport::{Dialer, SocketEvent, Wire};

/// Station behavior: replies to one client frame.
type Responder = dyn Fn(&Frame) -> Vec<Frame> + Send + Sync;

/// In-memory socket half handed to the connection under test.
pub(crate) struct FakeWire {
    sent: mpsc::UnboundedSender<String>,
    events: mpsc::Sender<SocketEvent>,
    open: Arc<AtomicBool>,
    close_count: Arc<AtomicUsize>,
}

impl FakeWire {
    /// Push an unsolicited inbound frame, as the station would.
    pub async fn push(&self, frame: &Frame) {
        let _ = self
            .events
            .send(SocketEvent::Message(frame.to_json().unwrap()))
            .await;
    }

    /// Push a raw inbound text frame.
    pub async fn push_raw(&self, raw: &str) {
        let _ = self.events.send(SocketEvent::Message(raw.into())).await;
    }

    /// Drop the link from the server side.
    pub async fn drop_from_server(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(SocketEvent::Closed).await;
        }
    }

    /// How many times the client closed this wire.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Wire for FakeWire {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.sent.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.close_count.fetch_add(1, Ordering::AcqRel);
            let _ = self.events.send(SocketEvent::Closed).await;
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Dialer producing in-memory sockets wired to a scripted station.
pub(crate) struct FakeDialer {
    responder: Arc<Responder>,
    refuse: AtomicBool,
    dial_count: AtomicUsize,
    last_wire: Mutex<Option<Arc<FakeWire>>>,
}

impl FakeDialer {
    /// Station driven by an arbitrary responder.
    pub fn new(responder: impl Fn(&Frame) -> Vec<Frame> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            refuse: AtomicBool::new(false),
            dial_count: AtomicUsize::new(0),
            last_wire: Mutex::new(None),
        }
    }

    /// Happy-path station: accepts configuration (`srv-<station>` ids) and
    /// acknowledges start/stop.
    pub fn accepting() -> Self {
        Self::new(|frame| match frame {
            Frame::Config { station_id, .. } => vec![Frame::ConfigResponse {
                success: true,
                connection_id: Some(format!("srv-{station_id}")),
            }],
            Frame::StartMonitoring => vec![Frame::MonitoringStatus {
                status: STATUS_STARTED.into(),
            }],
            Frame::StopMonitoring => vec![Frame::MonitoringStatus {
                status: STATUS_STOPPED.into(),
            }],
            _ => vec![],
        })
    }

    /// Station that is unreachable: every dial fails.
    pub fn refusing() -> Self {
        let dialer = Self::new(|_| vec![]);
        dialer.refuse.store(true, Ordering::Release);
        dialer
    }

    /// The wire handed out by the most recent dial.
    pub fn wire(&self) -> Arc<FakeWire> {
        self.last_wire.lock().clone().expect("no dial happened yet")
    }

    /// How many dials were attempted.
    pub fn dial_count(&self) -> usize {
        self.dial_count.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(
        &self,
        _url: &str,
    ) -> Result<(Arc<dyn Wire>, mpsc::Receiver<SocketEvent>), TransportError> {
        let _ = self.dial_count.fetch_add(1, Ordering::AcqRel);
        if self.refuse.load(Ordering::Acquire) {
            return Err(TransportError::ConnectFailed("connection refused".into()));
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<String>();
        let wire = Arc::new(FakeWire {
            sent: sent_tx,
            events: event_tx.clone(),
            open: Arc::new(AtomicBool::new(true)),
            close_count: Arc::new(AtomicUsize::new(0)),
        });
        *self.last_wire.lock() = Some(Arc::clone(&wire));

        let responder = Arc::clone(&self.responder);
        let _ = tokio::spawn(async move {
            while let Some(raw) = sent_rx.recv().await {
                let Ok(frame) = serde_json::from_str::<Frame>(&raw) else {
                    continue;
                };
                for reply in responder(&frame) {
                    let _ = event_tx
                        .send(SocketEvent::Message(reply.to_json().unwrap()))
                        .await;
                }
            }
        });

        Ok((wire as Arc<dyn Wire>, event_rx))
    }
}

/// Poll until `check` holds, failing the test after two seconds.
pub(crate) async fn wait_until(check: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within 2s");
}
