//! Station registry — owns every live connection and the durable store.
//!
//! The registry is an explicit instance handed to its callers; there is no
//! ambient/static state. It is the only writer of the durable store, and
//! every config mutation is persisted synchronously with the in-memory
//! update. Live connection state is reconstructed from scratch at startup:
//! sockets cannot be serialized, so reconciliation always begins
//! disconnected and the operator re-arms monitoring explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use outpost_core::errors::SessionError;
use outpost_core::ids::{ConnectionId, ImageId, RequestId, UserId};
use outpost_settings::SessionSettings;

use crate::connection::StationConnection;
use crate::store::{ConfigStore, now_iso};
use crate::transport::Dialer;
use crate::types::{
    CaptureRequest, ConfigUpdate, INTERVAL_RANGE, NewConnection, StationConfig, StationSnapshot,
};

/// Tuning knobs for the registry's connections.
#[derive(Clone, Copy, Debug)]
pub struct RegistryOptions {
    /// Time allowed for each correlated response.
    pub request_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            request_timeout: crate::connection::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl From<&SessionSettings> for RegistryOptions {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
        }
    }
}

/// Owns the set of all station connections, keyed by config id.
pub struct StationRegistry {
    user_id: UserId,
    dialer: Arc<dyn Dialer>,
    store: ConfigStore,
    connections: RwLock<HashMap<ConnectionId, Arc<StationConnection>>>,
    options: RegistryOptions,
}

impl StationRegistry {
    /// Create a registry. Call [`Self::load`] afterwards to reconcile the
    /// durable store into live (disconnected) connection objects.
    #[must_use]
    pub fn new(
        store: ConfigStore,
        dialer: Arc<dyn Dialer>,
        user_id: UserId,
        options: RegistryOptions,
    ) -> Self {
        Self {
            user_id,
            dialer,
            store,
            connections: RwLock::new(HashMap::new()),
            options,
        }
    }

    /// Startup reconciliation: instantiate a disconnected connection for
    /// every persisted config. Never dials. Returns how many were loaded.
    pub async fn load(&self) -> Result<usize, SessionError> {
        let configs = self.store.list()?;
        let mut connections = self.connections.write().await;
        let mut loaded = 0;
        for config in configs {
            if connections.contains_key(&config.id) {
                continue;
            }
            let _ = connections.insert(
                config.id.clone(),
                Arc::new(self.make_connection(config.id.clone())),
            );
            loaded += 1;
        }
        info!(count = loaded, "reconciled persisted connections");
        Ok(loaded)
    }

    /// Create a connection: persist the config, then best-effort connect
    /// and configure. Protocol failures after the record is persisted do
    /// not fail the call — they surface via `last_error` so the operator
    /// can retry.
    pub async fn add_connection(
        &self,
        input: NewConnection,
    ) -> Result<StationConfig, SessionError> {
        validate_interval(input.interval_minutes)?;
        let now = now_iso();
        let config = StationConfig {
            id: ConnectionId::new(),
            url: input.url,
            station_id: input.station_id,
            interval_minutes: input.interval_minutes,
            user_id: self.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert(&config)?;

        let connection = Arc::new(self.make_connection(config.id.clone()));
        {
            let mut connections = self.connections.write().await;
            let _ = connections.insert(config.id.clone(), Arc::clone(&connection));
        }
        info!(connection = %config.id, station = %config.station_id, "connection added");

        match connection.connect(&config.url).await {
            Ok(()) => {
                if let Err(e) = connection
                    .configure(&config.station_id, &self.user_id, config.interval_minutes)
                    .await
                {
                    warn!(connection = %config.id, error = %e, "initial configure failed");
                }
            }
            Err(e) => {
                warn!(connection = %config.id, error = %e, "initial connect failed");
            }
        }

        Ok(config)
    }

    /// Remove a connection: close its socket if open, discard live state,
    /// delete the durable record.
    pub async fn remove_connection(&self, id: &ConnectionId) -> Result<(), SessionError> {
        let connection = {
            let mut connections = self.connections.write().await;
            connections
                .remove(id)
                .ok_or_else(|| SessionError::UnknownConnection(id.to_string()))?
        };
        connection.disconnect().await;
        let _ = self.store.delete(id.as_str())?;
        info!(connection = %id, "connection removed");
        Ok(())
    }

    /// Edit a persisted config. The merged record is written through before
    /// any protocol work; when the connection is live, the configure
    /// exchange is re-run with the new values and its failure propagates —
    /// the persisted edit stays either way.
    pub async fn update_connection(
        &self,
        id: &ConnectionId,
        update: ConfigUpdate,
    ) -> Result<StationConfig, SessionError> {
        if let Some(interval) = update.interval_minutes {
            validate_interval(interval)?;
        }
        let mut config = self.stored_config(id)?;
        if let Some(url) = update.url {
            config.url = url;
        }
        if let Some(station_id) = update.station_id {
            config.station_id = station_id;
        }
        if let Some(interval) = update.interval_minutes {
            config.interval_minutes = interval;
        }
        config.updated_at = now_iso();
        let _ = self.store.update(&config)?;
        info!(connection = %id, "configuration updated");

        let connection = self.connection(id).await?;
        if connection.state_snapshot().is_connected {
            let _ = connection
                .configure(&config.station_id, &self.user_id, config.interval_minutes)
                .await?;
        }
        Ok(config)
    }

    // ─── Thin delegation ─────────────────────────────────────────────────

    /// Open the socket for `id` using its persisted URL.
    pub async fn connect(&self, id: &ConnectionId) -> Result<(), SessionError> {
        let config = self.stored_config(id)?;
        self.connection(id).await?.connect(&config.url).await
    }

    /// Close the socket for `id`. Idempotent.
    pub async fn disconnect(&self, id: &ConnectionId) -> Result<(), SessionError> {
        self.connection(id).await?.disconnect().await;
        Ok(())
    }

    /// Re-run the configure exchange for `id` from its persisted record.
    /// Resolves with the server-assigned connection id.
    pub async fn configure(&self, id: &ConnectionId) -> Result<String, SessionError> {
        let config = self.stored_config(id)?;
        self.connection(id)
            .await?
            .configure(&config.station_id, &self.user_id, config.interval_minutes)
            .await
    }

    /// Start the capture schedule on `id`.
    pub async fn start_monitoring(&self, id: &ConnectionId) -> Result<(), SessionError> {
        self.connection(id).await?.start_monitoring().await
    }

    /// Stop the capture schedule on `id`.
    pub async fn stop_monitoring(&self, id: &ConnectionId) -> Result<(), SessionError> {
        self.connection(id).await?.stop_monitoring().await
    }

    /// Answer a pending capture request on `id`. The station id is filled
    /// in from the persisted record.
    pub async fn send_capture_response(
        &self,
        id: &ConnectionId,
        image_id: &ImageId,
        image_url: &str,
        request_id: &RequestId,
    ) -> Result<(), SessionError> {
        let config = self.stored_config(id)?;
        self.connection(id)
            .await?
            .send_capture_response(image_id, image_url, request_id, &config.station_id)
            .await
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    /// Snapshot of every connection: durable config paired with live state
    /// read at call time.
    pub async fn list_connections(&self) -> Result<Vec<StationSnapshot>, SessionError> {
        let configs = self.store.list()?;
        let connections = self.connections.read().await;
        let mut snapshots = Vec::with_capacity(configs.len());
        for config in configs {
            let Some(connection) = connections.get(&config.id) else {
                // A config without a live object means load() was skipped.
                warn!(connection = %config.id, "persisted config has no live connection");
                continue;
            };
            snapshots.push(StationSnapshot {
                state: connection.state_snapshot(),
                config,
            });
        }
        Ok(snapshots)
    }

    /// Pending capture requests for `id`, oldest first.
    pub async fn pending_captures(
        &self,
        id: &ConnectionId,
    ) -> Result<Vec<CaptureRequest>, SessionError> {
        let connection = self.connection(id).await?;
        Ok(connection
            .state_snapshot()
            .pending_captures
            .into_iter()
            .collect())
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    fn make_connection(&self, id: ConnectionId) -> StationConnection {
        StationConnection::new(id, Arc::clone(&self.dialer), self.options.request_timeout)
    }

    async fn connection(&self, id: &ConnectionId) -> Result<Arc<StationConnection>, SessionError> {
        self.connections
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownConnection(id.to_string()))
    }

    fn stored_config(&self, id: &ConnectionId) -> Result<StationConfig, SessionError> {
        self.store
            .get(id.as_str())?
            .ok_or_else(|| SessionError::UnknownConnection(id.to_string()))
    }
}

fn validate_interval(interval_minutes: u32) -> Result<(), SessionError> {
    if INTERVAL_RANGE.contains(&interval_minutes) {
        Ok(())
    } else {
        Err(SessionError::InvalidConfig(format!(
            "interval_minutes must be within {}..={}, got {interval_minutes}",
            INTERVAL_RANGE.start(),
            INTERVAL_RANGE.end()
        )))
    }
}
