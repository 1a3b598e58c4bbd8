//! Tracing setup for pipeline consumers.

use tracing_subscriber::EnvFilter;

/// Initializes a global tracing subscriber.
///
/// Respects `RUST_LOG` when set and defaults to `info` otherwise. Safe to
/// call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
