//! Test logging bootstrap.
//!
//! Installs a `tracing` fmt subscriber once per process so scheduler tests
//! can surface log output under `--nocapture`. Filtering follows the usual
//! `RUST_LOG` environment variable.

/// Installs the global fmt subscriber; repeated calls are no-ops.
pub fn init() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
