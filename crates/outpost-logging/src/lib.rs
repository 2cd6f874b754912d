//! # outpost-logging
//!
//! Structured logging with `tracing` for Outpost binaries and tests.
//!
//! Filtering is environment-driven: `OUTPOST_LOG` wins, then `RUST_LOG`,
//! then the compiled default of `info`.

#![deny(unsafe_code)]

use tracing_subscriber::EnvFilter;

/// Environment variable checked first for the log filter.
pub const LOG_ENV: &str = "OUTPOST_LOG";

/// Resolve the active filter directive string.
#[must_use]
pub fn filter_directives() -> String {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Install the global `fmt` subscriber.
///
/// Safe to call more than once; later calls are no-ops (useful in tests
/// where several cases race to initialize).
pub fn init() {
    init_with_filter(&filter_directives());
}

/// Install the global `fmt` subscriber with an explicit filter.
pub fn init_with_filter(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init_with_filter("debug");
        init_with_filter("info");
    }

    #[test]
    fn bad_directives_fall_back() {
        // Must not panic even on garbage input
        init_with_filter(":::");
    }

    #[test]
    fn filter_directives_non_empty() {
        assert!(!filter_directives().is_empty());
    }
}
