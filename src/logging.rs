//! Log output setup for the `tvcache` binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary (or to whatever application embeds the cache).

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "tvcache=info";

/// Installs a stderr subscriber filtered by `RUST_LOG`
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
