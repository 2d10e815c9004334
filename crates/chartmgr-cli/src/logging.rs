//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
//! Logs go to stderr so command output on stdout stays machine readable.

use std::sync::Once;

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat, debug: bool) {
    INIT.call_once(|| {
        let default_level = if debug { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_noop() {
        init_logging(LogFormat::Json, false);
        init_logging(LogFormat::Pretty, true);
        tracing::info!("logging initialised");
    }
}
