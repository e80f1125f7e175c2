//! Logging setup for the plugin binary.
//!
//! All output goes to **stderr**; stdout carries only the handshake line.
//! Filtering follows `RUST_LOG`, falling back to `NOMAD_PROVIDER_LOG_LEVEL`
//! and finally to `info`.
//!
//! ```bash
//! RUST_LOG=nomad_provider=debug ./nomad-provider
//! RUST_LOG=nomad_provider::api=debug,info ./nomad-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "NOMAD_PROVIDER_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_LEVEL_ENV))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(
    default_level: &str,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the stderr subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber(DEFAULT_LEVEL).init();
}

/// Install the stderr subscriber with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Install the stderr subscriber unless one is already set.
///
/// Returns `false` when a subscriber was already installed, which is the
/// normal case when several tests share a process.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_LEVEL).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("nomad_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,nomad_provider::api=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
