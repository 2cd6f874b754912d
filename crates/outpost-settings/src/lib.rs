//! # outpost-settings
//!
//! Layered configuration for the Outpost dashboard core.
//!
//! Loading flow:
//! 1. Start with compiled [`OutpostSettings::default()`]
//! 2. If `~/.outpost/settings.json` exists, deep-merge user values over
//!    defaults
//! 3. Apply `OUTPOST_*` environment variable overrides (highest priority)

#![deny(unsafe_code)]

mod errors;
mod loader;
mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, parse_u64_range,
    settings_path,
};
pub use types::{OutpostSettings, SessionSettings, StoreSettings};
