//! Structured logging setup.
//!
//! The crate itself only emits `tracing` events; this helper installs a
//! formatted subscriber honoring `RUST_LOG` for binaries and tests that do
//! not bring their own.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
