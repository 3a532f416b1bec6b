//! Logging initialization, with optional file rotation.
//!
//! Stderr-only output needs no guard; file output buffers writes on a
//! background thread, so the returned [`LoggingGuard`] must be held for the
//! life of the process or pending log lines are lost on exit.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Suppress logging entirely.
    None,
    /// Stderr only.
    Stderr,
    /// A rotating file only.
    FileOnly,
    /// Stderr and a rotating file.
    Both,
}

/// File rotation cadence, when logging to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Minute,
    Hourly,
    Daily,
    #[default]
    Never,
}

/// Logging configuration, deserializable from the same config source as
/// [`mcp_core::config::ServerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"agency_mcpd=debug,tower_http=info"`.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub structured: bool,
    /// Where output goes.
    pub output: LogOutput,
    /// Directory for file output; required when `output` writes to a file.
    pub directory: Option<PathBuf>,
    /// File name prefix passed to `tracing_appender`.
    pub file_prefix: String,
    /// Rotation cadence for file output.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
            directory: None,
            file_prefix: "agency-mcpd".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// Holds the worker thread(s) backing non-blocking file output. Dropping it
/// flushes and stops the writer.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    _stderr_guard: Option<WorkerGuard>,
}

impl LoggingConfig {
    /// Initialize the global `tracing` subscriber from this configuration.
    pub fn init(&self) -> io::Result<LoggingGuard> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(LoggingGuard {
                _file_guard: None,
                _stderr_guard: None,
            }),
            LogOutput::Stderr => {
                self.init_stderr(filter)?;
                Ok(LoggingGuard {
                    _file_guard: None,
                    _stderr_guard: None,
                })
            }
            LogOutput::FileOnly => {
                let dir = self.require_directory()?;
                let (non_blocking, guard) = tracing_appender::non_blocking(self.file_appender(dir));
                self.init_file_only(filter, non_blocking)?;
                Ok(LoggingGuard {
                    _file_guard: Some(guard),
                    _stderr_guard: None,
                })
            }
            LogOutput::Both => {
                let dir = self.require_directory()?;
                let (file_nb, file_guard) = tracing_appender::non_blocking(self.file_appender(dir));
                let (stderr_nb, stderr_guard) = tracing_appender::non_blocking(io::stderr());
                self.init_combined(filter, file_nb, stderr_nb)?;
                Ok(LoggingGuard {
                    _file_guard: Some(file_guard),
                    _stderr_guard: Some(stderr_guard),
                })
            }
        }
    }

    fn init_stderr(&self, filter: EnvFilter) -> io::Result<()> {
        let subscriber = tracing_subscriber::registry().with(filter);
        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }

    fn init_file_only(
        &self,
        filter: EnvFilter,
        writer: tracing_appender::non_blocking::NonBlocking,
    ) -> io::Result<()> {
        let subscriber = tracing_subscriber::registry().with(filter);
        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(writer))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_writer(writer))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }

    fn init_combined(
        &self,
        filter: EnvFilter,
        file_writer: tracing_appender::non_blocking::NonBlocking,
        stderr_writer: tracing_appender::non_blocking::NonBlocking,
    ) -> io::Result<()> {
        let combined = file_writer.and(stderr_writer);
        let subscriber = tracing_subscriber::registry().with(filter);
        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(combined))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_writer(combined))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }

    fn require_directory(&self) -> io::Result<&Path> {
        let dir = self
            .directory
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file logging requires a directory"))?;
        std::fs::create_dir_all(dir)?;
        Ok(dir)
    }

    fn file_appender(&self, dir: &Path) -> RollingFileAppender {
        match self.rotation {
            LogRotation::Minute => tracing_appender::rolling::minutely(dir, &self.file_prefix),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, &self.file_prefix),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, &self.file_prefix),
            LogRotation::Never => tracing_appender::rolling::never(dir, &self.file_prefix),
        }
    }
}
