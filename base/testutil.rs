//! Utilities for automated testing, shared by the flvdemux crates.

static INIT: std::sync::Once = std::sync::Once::new();

/// Performs global initialization for tests: installs a `tracing`
/// subscriber so `tracing::warn!` output from the demuxer shows up under
/// `cargo test -- --nocapture`.
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
