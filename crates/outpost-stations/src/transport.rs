//! Transport socket — one persistent full-duplex text-frame link to one
//! station URL.
//!
//! The socket emits zero or more [`SocketEvent::Message`]s while open, at
//! most one [`SocketEvent::Error`], and then exactly one terminal
//! [`SocketEvent::Closed`]. There is no automatic reconnection: a closed
//! socket stays closed until the owner explicitly dials again.
//!
//! [`Wire`] and [`Dialer`] are the seams the tests replace with an
//! in-memory channel pair; [`WsDialer`] is the production implementation
//! over `tokio-tungstenite`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use outpost_core::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifecycle and message events surfaced by an open socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// A text frame arrived.
    Message(String),
    /// The socket failed; a terminal `Closed` follows.
    Error(TransportError),
    /// Terminal event: the socket is gone.
    Closed,
}

/// Outbound half of an open socket.
#[async_trait]
pub trait Wire: Send + Sync {
    /// Write one text frame. Fails with [`TransportError::Closed`] once the
    /// socket is gone.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Close the socket. Idempotent.
    async fn close(&self);

    /// Whether the socket is still open.
    fn is_open(&self) -> bool;
}

/// Opens sockets. Tests substitute an in-memory implementation.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a socket to `url`, returning the outbound half and the event
    /// stream for the inbound half.
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Wire>, mpsc::Receiver<SocketEvent>), TransportError>;
}

/// Production dialer over `tokio-tungstenite`.
pub struct WsDialer {
    connect_timeout: Duration,
}

impl WsDialer {
    /// Dialer with an explicit handshake timeout.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsDialer {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Wire>, mpsc::Receiver<SocketEvent>), TransportError> {
        let (ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                TransportError::ConnectFailed(format!(
                    "handshake timed out after {} ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(64);
        let (event_tx, event_rx) = mpsc::channel::<SocketEvent>(256);
        let open = Arc::new(AtomicBool::new(true));
        let _ = tokio::spawn(socket_task(ws, cmd_rx, event_tx, Arc::clone(&open)));
        debug!(url, "socket opened");

        Ok((Arc::new(WsWire { cmd_tx, open }), event_rx))
    }
}

/// Command sent from [`WsWire`] to the socket task.
enum WsCommand {
    Send(String, oneshot::Sender<Result<(), TransportError>>),
    Close,
}

/// Outbound handle bridging to the socket task.
struct WsWire {
    cmd_tx: mpsc::Sender<WsCommand>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl Wire for WsWire {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send(frame, tx))
            .await
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.cmd_tx.send(WsCommand::Close).await;
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Socket task: multiplexes outbound commands against inbound frames until
/// either side goes away, then emits the terminal events.
async fn socket_task(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<WsCommand>,
    event_tx: mpsc::Sender<SocketEvent>,
    open: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut error: Option<TransportError> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::Send(frame, ack)) => {
                    let result = ws_tx
                        .send(Message::Text(frame.into()))
                        .await
                        .map_err(|e| TransportError::SendFailed(e.to_string()));
                    let failed = result.is_err();
                    let _ = ack.send(result);
                    if failed {
                        error = Some(TransportError::Socket("write side failed".into()));
                        break;
                    }
                }
                // Owner asked for close, or dropped the wire entirely.
                Some(WsCommand::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if event_tx.send(SocketEvent::Message(text.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by tungstenite; binary is not part
                // of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error = Some(TransportError::Socket(e.to_string()));
                    break;
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    if let Some(e) = error {
        warn!(error = %e, "socket failed");
        let _ = event_tx.send(SocketEvent::Error(e)).await;
    }
    let _ = event_tx.send(SocketEvent::Closed).await;
}
