//! Tracing subscriber setup for hosts embedding the security layer.
//!
//! Every component logs through `tracing` under its module path
//! (`vec_guard::permission`, `vec_guard::egress`, ...), so hosts can filter
//! per subsystem with `RUST_LOG=vec_guard::egress=debug`.
//!
//! Secrets are never written to the log: scanners only report redacted
//! excerpts, counts and detector names.

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    Pretty,

    /// Single-line output.
    Compact,

    /// JSON lines, for log shippers.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive (e.g. `"info"` or `"vec_guard=debug"`).
    ///
    /// If None, uses RUST_LOG or defaults to "info".
    pub directive: Option<String>,

    /// Output format.
    pub format: LogFormat,

    /// Include timestamps.
    pub timestamps: bool,

    /// Include target module names.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: None,
            format: LogFormat::Compact,
            timestamps: true,
            target: true,
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> EnvFilter {
        match &self.directive {
            Some(directive) => EnvFilter::new(directive),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Install a global subscriber with default settings.
///
/// Returns false when a global subscriber was already installed.
pub fn init_subscriber() -> bool {
    init_subscriber_with_config(LoggingConfig::default())
}

/// Install a global subscriber with custom settings.
///
/// Returns false when a global subscriber was already installed.
///
/// # Example
///
/// ```ignore
/// use vec_guard::logging::{init_subscriber_with_config, LogFormat, LoggingConfig};
///
/// init_subscriber_with_config(LoggingConfig {
///     format: LogFormat::Json,
///     ..Default::default()
/// });
/// ```
pub fn init_subscriber_with_config(config: LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(config.target);

    let installed = match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => builder.pretty().try_init(),
        (LogFormat::Pretty, false) => builder.pretty().without_time().try_init(),
        (LogFormat::Compact, true) => builder.compact().try_init(),
        (LogFormat::Compact, false) => builder.compact().without_time().try_init(),
        (LogFormat::Json, true) => builder.json().try_init(),
        (LogFormat::Json, false) => builder.json().without_time().try_init(),
    };

    installed.is_ok()
}
