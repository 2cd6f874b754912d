//! Message router — fans inbound frames out to listeners by `type`.
//!
//! Two kinds of listener:
//!
//! - Durable subscriptions ([`Router::subscribe`]) receive every matching
//!   frame in arrival order, in registration order, until unsubscribed.
//! - Single-shot response slots ([`Router::take_response`]) back the
//!   request/response correlation of the protocol operations: the wire
//!   protocol has no request id, so at most ONE slot per response type may
//!   be pending at a time — a second registration fails fast instead of
//!   racing for the same frame.
//!
//! Malformed inbound frames (bad JSON, missing `type`) are logged and
//! dropped; they never fail the connection.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use outpost_core::errors::SessionError;

/// Handle identifying one durable subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A durable subscription to one event type.
pub struct Subscription {
    /// Handle for [`Router::unsubscribe`].
    pub id: SubscriptionId,
    /// Stream of matching frames (the full decoded object, `type` included).
    pub rx: mpsc::UnboundedReceiver<Value>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    durable: HashMap<String, Vec<(SubscriptionId, mpsc::UnboundedSender<Value>)>>,
    pending: HashMap<String, oneshot::Sender<Value>>,
}

/// Per-connection dispatcher from raw inbound text to typed listeners.
#[derive(Default)]
pub struct Router {
    inner: Mutex<Listeners>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a durable listener for `event_type`.
    pub fn subscribe(&self, event_type: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .durable
            .entry(event_type.to_string())
            .or_default()
            .push((id, tx));
        Subscription { id, rx }
    }

    /// Remove a durable listener. Unknown handles are ignored.
    pub fn unsubscribe(&self, event_type: &str, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        let emptied = match inner.durable.get_mut(event_type) {
            Some(subs) => {
                subs.retain(|(sub_id, _)| *sub_id != id);
                subs.is_empty()
            }
            None => false,
        };
        if emptied {
            let _ = inner.durable.remove(event_type);
        }
    }

    /// Claim the single-shot response slot for `event_type`.
    ///
    /// The returned receiver resolves with the first matching frame, after
    /// which the slot is free again. Fails with
    /// [`SessionError::RequestInFlight`] if a previous claim is still
    /// pending.
    pub fn take_response(&self, event_type: &str) -> Result<oneshot::Receiver<Value>, SessionError> {
        let mut inner = self.inner.lock();
        if inner.pending.contains_key(event_type) {
            return Err(SessionError::RequestInFlight(event_type.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        let _ = inner.pending.insert(event_type.to_string(), tx);
        Ok(rx)
    }

    /// Release an unanswered response slot (timed-out or failed send).
    pub fn cancel_response(&self, event_type: &str) {
        let _ = self.inner.lock().pending.remove(event_type);
    }

    /// Decode one inbound frame and deliver it to every listener for its
    /// `type`. Returns how many listeners accepted it.
    pub fn dispatch(&self, raw: &str) -> usize {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return 0;
            }
        };
        let Some(event_type) = value.get("type").and_then(Value::as_str) else {
            warn!("dropping frame without a string `type` field");
            return 0;
        };
        let event_type = event_type.to_string();

        let mut inner = self.inner.lock();
        let mut delivered = 0;

        // Durable listeners, in registration order. A listener whose
        // receiver is gone is pruned without affecting the others.
        let emptied = match inner.durable.get_mut(&event_type) {
            Some(subs) => {
                subs.retain(|(_, tx)| {
                    if tx.send(value.clone()).is_ok() {
                        delivered += 1;
                        true
                    } else {
                        false
                    }
                });
                subs.is_empty()
            }
            None => false,
        };
        if emptied {
            let _ = inner.durable.remove(&event_type);
        }

        // The response slot consumes exactly one frame, then frees itself.
        if let Some(tx) = inner.pending.remove(&event_type) {
            if tx.send(value).is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            debug!(event_type, "frame had no listeners");
        }
        delivered
    }
}
