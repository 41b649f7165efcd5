//! Logging setup.

use std::env;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `default_filter`.
/// Timestamps are on unless `MOTORSHOP_LOG_TIME` is `0` or `false` (log
/// collectors that stamp lines themselves). Returns `false` if a subscriber
/// was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    init_logging_with(default_filter, log_time_enabled(env::var("MOTORSHOP_LOG_TIME").ok()))
}

/// Like [`init_logging`] with explicit control over timestamps.
///
/// Targets and ANSI colours are off so lines read cleanly in collected logs.
pub fn init_logging_with(default_filter: &str, with_time: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false);

    if with_time {
        builder.try_init().is_ok()
    } else {
        builder.without_time().try_init().is_ok()
    }
}

fn log_time_enabled(value: Option<String>) -> bool {
    match value.as_deref().map(str::trim) {
        Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
        None => true,
    }
}
