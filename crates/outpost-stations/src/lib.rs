//! # outpost-stations
//!
//! Multi-connection real-time session manager for monitoring stations.
//!
//! The dashboard opens an arbitrary number of independent persistent
//! WebSocket sessions, one per remote station. Each session pairs a
//! [`transport`] socket with a [`router`] that fans inbound tagged-JSON
//! frames out to listeners; [`connection::StationConnection`] builds the
//! protocol operations (configure, start/stop monitoring, capture replies)
//! as correlated request/response exchanges on top. The
//! [`registry::StationRegistry`] owns every connection plus the durable
//! configuration [`store`], and reconciles the two at startup — live socket
//! state never survives a restart.

#![deny(unsafe_code)]

pub mod connection;
pub mod registry;
pub mod router;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::StationConnection;
pub use registry::{RegistryOptions, StationRegistry};
pub use store::ConfigStore;
pub use transport::{Dialer, SocketEvent, Wire, WsDialer};
pub use types::{
    CaptureRequest, ConfigUpdate, ConnectionState, NewConnection, Phase, StationConfig,
    StationSnapshot,
};
