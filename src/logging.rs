//! Logging setup
//!
//! Events are written to stderr so the stdio transport keeps stdout for
//! protocol messages. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{KeplerError, Result};

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`KeplerError::Config`] if the level is not a valid filter or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()
    };

    installed.map_err(|e| KeplerError::Config(format!("Failed to initialize logging: {e}")))
}

/// `RUST_LOG` when set and valid, otherwise `level`.
fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| KeplerError::Config(format!("Invalid log level '{level}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_build_filter_accepts_directives() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("kepler_mcp_gitlab=trace,reqwest=warn").is_ok());
    }

    #[test]
    #[serial]
    fn test_build_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("kepler=[[").is_err());
    }
}
