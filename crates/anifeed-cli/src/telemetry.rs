//! Log subscriber setup.
//!
//! Logs go to stderr so stdout stays parseable. The filter comes from
//! `ANIFEED_LOG`, then `RUST_LOG`, then defaults to `warn`.

use tracing_subscriber::EnvFilter;

const LOG_VAR: &str = "ANIFEED_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
