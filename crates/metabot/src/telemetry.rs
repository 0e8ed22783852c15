//! Logging setup.
//!
//! Environment variables:
//! - `RUST_LOG`: log filter (default: `info` plus `debug` for the metabot crates)
//! - `METABOT_LOG_FORMAT`: `json` for one JSON object per line, anything else for text

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,metabot=debug,metabot_links=debug,metabot_irc=debug";

/// Install the global subscriber. Fails if one is already set.
pub fn init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("METABOT_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let fmt_layer = if json {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(json, "Logging initialized");
    Ok(())
}
