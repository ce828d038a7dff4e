//! Logging initialization.
//!
//! Thin wrapper over the `observability` package so binaries only pass a
//! service name and a level.

use crate::Paths;
use observability::LogConfig;

/// Initialize tracing for a portal program.
///
/// Writes JSONL to `~/.portal/logs/portal.jsonl` (or under `paths` when
/// given) and mirrors to stderr when `also_stderr` is set. `RUST_LOG`
/// overrides `level`.
pub fn init_logging(service_name: &str, level: &str, paths: Option<&Paths>, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr,
        ..Default::default()
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
