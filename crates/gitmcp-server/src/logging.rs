//! Logging initialization.
//!
//! Logs always go to **stderr**: with the stdio transport, stdout is the
//! protocol channel. A log directory adds a file copy through a non-blocking
//! writer whose guard must be held until exit.
//!
//! ```rust,no_run
//! use gitmcp_server::LoggingSettings;
//!
//! let _guard = LoggingSettings::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! `RUST_LOG` replaces the configured filter entirely when set.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use gitmcp_transport_traits::CONNECTION_LOG_TARGET;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// File name of the log file inside the configured directory.
pub const LOG_FILE_NAME: &str = "gitmcp.log";

/// Severity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Filter directive token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned for an unrecognised level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected one of: trace, debug, info, warn, error)")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    /// Case-insensitive; `warning` and `critical` are accepted as aliases of
    /// `warn` and `error`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            _ => Err(UnknownLogLevel(s.to_string())),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Global threshold.
    pub level: LogLevel,
    /// When false, per-connection events are capped at `warn`.
    pub transport_details: bool,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// Also write to `<directory>/gitmcp.log`.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            transport_details: true,
            json: false,
            directory: None,
        }
    }
}

/// Flushes the log file on drop. Hold it until the process exits.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingSettings {
    /// Filter directives derived from these settings.
    pub fn directives(&self) -> String {
        if self.transport_details {
            self.level.to_string()
        } else {
            format!("{},{CONNECTION_LOG_TARGET}=warn", self.level)
        }
    }

    /// Install the global subscriber.
    ///
    /// Returns `Some(LoggingGuard)` when a log directory is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log directory cannot be created
    /// - A global subscriber is already installed
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()));

        match &self.directory {
            None => {
                init_stderr(self.json, filter)?;
                Ok(None)
            }
            Some(dir) => init_stderr_and_file(self.json, dir, filter).map(Some),
        }
    }
}

fn init_stderr(json: bool, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tfmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(tfmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

fn init_stderr_and_file(json: bool, dir: &Path, filter: EnvFilter) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let writer = file_writer.and(io::stderr);

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tfmt::layer().json().with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    } else {
        subscriber
            .with(tfmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_parsing() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!(" Warning ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("critical".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_directives_cap_connection_target() {
        let quiet = LoggingSettings {
            level: LogLevel::Debug,
            transport_details: false,
            ..LoggingSettings::default()
        };
        assert_eq!(quiet.directives(), "debug,gitmcp::connection=warn");
        assert_eq!(LoggingSettings::default().directives(), "info");

        // Both parse as filters.
        let _ = EnvFilter::try_new(quiet.directives()).expect("valid directives");
    }
}
