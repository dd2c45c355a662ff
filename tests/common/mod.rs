//! Shared test fixtures for stepline integration tests

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Initialize test logging
///
/// Respects `RUST_LOG`, defaulting stepline itself to debug so stepper
/// transitions show up under `--nocapture`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("stepline=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}
