//! Tracing subscriber setup for applications and tests embedding fluxgate.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber. `RUST_LOG` overrides `default_level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
