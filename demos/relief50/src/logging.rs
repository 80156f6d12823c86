//! Log subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
