use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event (suitable for Vector / Loki / ELK).
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "human" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. "info" or "ak_daemon=debug,warn".
    pub default_level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(default_level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            default_level: default_level.into(),
            format,
        }
    }

    /// Build from the raw strings found in the config file. An unrecognised
    /// format falls back to pretty output.
    pub fn from_settings(level: &str, format: &str) -> Self {
        Self::new(level, format.parse().unwrap_or_default())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info", LogFormat::Pretty)
    }
}

/// Install the global subscriber.
///
/// Events go to stderr so stdout stays free for command output.
/// `RUST_LOG` takes priority over `config.default_level`. Safe to call
/// multiple times (e.g. in tests); subsequent calls are no-ops.
pub fn init_logging(service_name: &str, config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    match config.format {
        LogFormat::Pretty => {
            subscriber_fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            subscriber_fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .try_init()
                .ok();
        }
    }

    tracing::info!(service = service_name, format = %config.format, "logging initialised");
}
