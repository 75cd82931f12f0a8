//! Logging setup shared by the library and the binaries.
//!
//! Library code imports the macros through [`prelude`] so every module logs
//! the same way. Binaries call [`init_journald_or_stdout`] once at startup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) logs go to journald when the socket is
/// reachable. Everywhere else they go to stderr with local timestamps.
pub fn init_journald_or_stdout() {
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => eprintln!("journald unavailable ({e}), logging to stderr"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::LocalTime::rfc_3339()),
        )
        .init();
}
