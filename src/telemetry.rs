use tracing_subscriber::EnvFilter;

use crate::config::BridgeConfig;

/// Install a `tracing` fmt subscriber. `RUST_LOG` takes precedence over `filter`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(true)
        .try_init()
        .is_ok()
}

pub fn init_tracing_from_config(config: &BridgeConfig) -> bool {
    init_tracing(&config.log_filter)
}
