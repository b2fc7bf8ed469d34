//! # relay-logging
//!
//! Global `tracing` subscriber setup.
//!
//! Library crates only emit events; the binary calls one of the `init_*`
//! functions once at startup. `RUST_LOG` always wins over the configured
//! level. Output goes to stderr so stdout stays reserved for agent text.

#![deny(unsafe_code)]

use relay_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install a compact human-readable subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Install a JSON-lines subscriber.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}

/// Install the subscriber described by the logging settings.
///
/// `verbose` forces `debug` regardless of the configured level.
pub fn init_from_settings(settings: &LoggingSettings, verbose: bool) {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    if settings.json {
        init_json_subscriber(level);
    } else {
        init_subscriber(level);
    }
}
