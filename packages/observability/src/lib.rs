//! # Observability
//!
//! Centralized tracing setup for the portal workspace.
//!
//! Binaries call [`init_with_config`] once at startup and use the standard
//! `tracing` macros everywhere else. Library crates never install a
//! subscriber themselves.
//!
//! Output goes to a JSONL file (`~/.portal/logs/portal.jsonl` by default),
//! one object per line, plus an optional compact stderr layer:
//!
//! ```text
//! tail -f ~/.portal/logs/portal.jsonl | jq
//! ```
//!
//! Fields that carry credentials (`token`, `id_token`, `api_key`,
//! `signature`, ...) are replaced with `[redacted]` before they reach the
//! file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "cli".into(),
//!         default_level: "warn".into(),
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file_sink;
mod json_layer;

pub use file_sink::{default_log_path, LogFileWriter};
pub use json_layer::{is_sensitive_field, JsonLayer, LogEntry, REDACTED};

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the emitting program (e.g. "cli"). Written into every line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info,portal_api=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Custom log file path. Defaults to `~/.portal/logs/portal.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Disable the JSONL file sink entirely.
    pub file_sink: bool,

    /// Also emit compact human-readable lines on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            file_sink: true,
            also_stderr: false,
        }
    }
}

/// Initialize tracing with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize tracing with custom configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// If the log file cannot be opened the file sink is skipped and a stderr
/// layer is installed instead, so logging never takes the process down.
pub fn init_with_config(config: LogConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let log_path = config.log_path.clone().or_else(default_log_path);
    let file_writer = if config.file_sink {
        log_path
            .as_ref()
            .and_then(|path| LogFileWriter::new(path).ok())
    } else {
        None
    };

    let json_layer = file_writer.as_ref().map(|writer| {
        JsonLayer::new(config.service_name.clone(), writer.clone()).with_filter(filter())
    });

    let stderr_layer = if config.also_stderr || file_writer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        match (&file_writer, &log_path) {
            (Some(_), Some(path)) => {
                tracing::debug!(log_path = %path.display(), "observability initialized")
            }
            _ => tracing::debug!("observability initialized without file sink"),
        }
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(config.file_sink);
        assert!(!config.also_stderr);
    }
}
