use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter. Safe to call more than once;
/// later calls are ignored.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
