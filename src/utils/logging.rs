//! Subscriber setup and batch progress lines

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::domain::errors::DomainError;

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Colour escape codes in pretty and compact output
    pub ansi: bool,
    /// Prefix events with the emitting module
    pub show_target: bool,
    /// Log a line per exported range
    pub progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            ansi: true,
            show_target: false,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const NAMES: &'static [(&'static str, LogLevel)] = &[
        ("error", LogLevel::Error),
        ("warn", LogLevel::Warn),
        ("warning", LogLevel::Warn),
        ("info", LogLevel::Info),
        ("debug", LogLevel::Debug),
        ("trace", LogLevel::Trace),
    ];

    /// Directive understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        lookup(Self::NAMES, value, "log level")
    }
}

/// How events are rendered on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    const NAMES: &'static [(&'static str, LogFormat)] = &[
        ("pretty", LogFormat::Pretty),
        ("compact", LogFormat::Compact),
        ("json", LogFormat::Json),
    ];
}

impl FromStr for LogFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        lookup(Self::NAMES, value, "log format")
    }
}

fn lookup<T: Copy>(table: &[(&str, T)], value: &str, what: &str) -> Result<T, DomainError> {
    let wanted = value.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, item)| *item)
        .ok_or_else(|| {
            let known: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
            DomainError::Config(format!(
                "Invalid {} '{}'; expected one of: {}",
                what,
                value,
                known.join(", ")
            ))
        })
}

/// Handle to the installed global subscriber
pub struct LoggingSystem {
    config: LoggingConfig,
}

impl LoggingSystem {
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn log_system_info(&self) {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            level = self.config.level.as_filter(),
            format = ?self.config.format,
            "rangecrop starting"
        );
    }
}

/// Install the global subscriber for `config`; `RUST_LOG` wins over the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingSystem, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.show_target)
        .with_ansi(config.ansi);

    match config.format {
        LogFormat::Pretty => builder.pretty().try_init()?,
        LogFormat::Compact => builder.compact().try_init()?,
        LogFormat::Json => builder.json().try_init()?,
    }

    Ok(LoggingSystem {
        config: config.clone(),
    })
}

/// Progress lines for a batch of `total` units, shareable across observers
pub struct ProgressReporter {
    label: String,
    total: usize,
    done: AtomicUsize,
    enabled: bool,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total: usize, enabled: bool) -> Self {
        let label = label.into();
        if enabled {
            info!(total, "Starting {}", label);
        }
        Self {
            label,
            total,
            done: AtomicUsize::new(0),
            enabled,
            started: Instant::now(),
        }
    }

    /// Count one unit as started and log where the batch stands
    pub fn advance(&self, what: &str) -> usize {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if self.enabled {
            let fraction = done as f64 / self.total.max(1) as f64;
            let elapsed = self.started.elapsed().as_secs_f64();
            let remaining = if done > 1 {
                elapsed / (done - 1) as f64 * (self.total.saturating_sub(done - 1)) as f64
            } else {
                0.0
            };
            info!(
                "[{:>3.0}%] {}/{} {}{}",
                (fraction * 100.0).min(100.0),
                done,
                self.total,
                what,
                if remaining >= 1.0 {
                    format!(" (about {:.0}s left)", remaining)
                } else {
                    String::new()
                }
            );
        }
        done
    }

    pub fn warning(&self, message: &str) {
        warn!("{}: {}", self.label, message);
    }

    pub fn failure(&self, message: &str) {
        error!("{}: {}", self.label, message);
    }

    pub fn finish(&self, success: bool) {
        let elapsed = self.started.elapsed().as_secs_f64();
        if success {
            info!("{} finished in {:.1}s", self.label, elapsed);
        } else {
            warn!("{} finished with problems after {:.1}s", self.label, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_and_format_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);

        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert!(err.to_string().contains("trace"));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_logging_section_from_toml() {
        let config: LoggingConfig = toml::from_str("level = \"trace\"\nformat = \"compact\"").unwrap();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.progress);
    }

    #[test]
    fn test_progress_counts_units() {
        let progress = ProgressReporter::new("export", 3, false);
        assert_eq!(progress.advance("a"), 1);
        assert_eq!(progress.advance("b"), 2);
    }
}
