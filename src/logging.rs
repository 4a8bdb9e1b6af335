//! Process-wide log setup.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed (by the
/// host application or an earlier trial); that subscriber is kept.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();
    if !installed {
        debug!("global tracing subscriber already installed");
    }
    installed
}
