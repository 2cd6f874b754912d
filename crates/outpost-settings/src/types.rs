//! Settings type definitions.

use serde::{Deserialize, Serialize};

/// Top-level settings for the dashboard core.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutpostSettings {
    /// Settings schema version.
    pub version: u32,
    /// Durable config store location.
    pub store: StoreSettings,
    /// Session protocol tuning.
    pub session: SessionSettings,
    /// Log filter directives (overridden by `OUTPOST_LOG`).
    pub log_filter: String,
}

impl Default for OutpostSettings {
    fn default() -> Self {
        Self {
            version: 1,
            store: StoreSettings::default(),
            session: SessionSettings::default(),
            log_filter: "info".to_string(),
        }
    }
}

/// Durable config store location.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Path to the SQLite file holding connection configs.
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self {
            path: format!("{home}/.outpost/stations.db"),
        }
    }
}

/// Session protocol tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How long a correlated response may take before the operation fails
    /// with a timeout. Range 1000..=120000.
    pub request_timeout_ms: u64,
    /// How long a socket open may take. Range 1000..=120000.
    pub connect_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            connect_timeout_ms: 15_000,
        }
    }
}
