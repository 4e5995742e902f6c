//! Observability utilities.
//!
//! Chunk lifecycle records are emitted inside each context's `chunk_exec`
//! span; this module installs the subscriber that renders them.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt subscriber for the process.
///
/// The filter directive comes from `config.filter` unless `RUST_LOG` is set.
/// Returns false if a global subscriber was already installed, in which case
/// nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.filter, json = config.json, "tracing initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_noop() {
        let config = LoggingConfig::default();
        // another test may have installed a subscriber first
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
