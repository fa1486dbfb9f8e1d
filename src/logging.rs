//! Ambient tracing setup, shared by the CLI and (if embedded) a daemon
//! host process.

use tracing_subscriber::EnvFilter;

/// Install a `tracing-subscriber` global default, honoring `RUST_LOG` and
/// falling back to `info` for this crate's own spans.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gitfs=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
