use crate::config::LoggingConfig;

use tracing_subscriber::EnvFilter;

/// Environment switch for JSON log lines, e.g. when shipping to a collector.
pub const LOG_FORMAT_ENV: &str = "RECONCILER_LOG_FORMAT";

/// Install the global subscriber with default settings.
pub fn init() {
    init_with(&LoggingConfig::default());
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so that
/// stdout carries only command results.
pub fn init_with(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if wants_json(config) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_directive(config: &LoggingConfig) -> String {
    format!("resource_reconciler={}", config.level.as_str())
}

fn wants_json(config: &LoggingConfig) -> bool {
    config.json
        || std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}
