//! Logging plugin.
//!
//! Provides [`LogPlugin`], which configures the [`Logs`] service and installs
//! the `tracing` subscriber.
//!
//! # Lifecycle
//!
//! - **`build()`** applies the [`LogConfig`] to the [`Logs`] service so
//!   mods built afterwards write to the configured directory.
//! - **`ready()`** initializes the tracing subscriber.
//! - **`cleanup()`** drops every log channel.
//!
//! # Example
//!
//! ```
//! use weft_system::server::Server;
//! use weft_log::{LogFormat, LogPlugin, Logs};
//! use tracing::Level;
//!
//! let mut server = Server::new();
//! server.add_plugins(
//!     LogPlugin::default()
//!         .with_level(Level::DEBUG)
//!         .with_format(LogFormat::Compact)
//!         .with_directory(std::env::temp_dir().join("weft-doc"))
//!         .with_max_file_bytes(64 * 1024),
//! );
//! server.finish();
//!
//! assert_eq!(server.service::<Logs>().config().max_file_bytes, 64 * 1024);
//! ```

use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use weft_system::plugin::Plugin;
use weft_system::server::Server;

use crate::logs::{LogConfig, Logs};

/// Console output format of the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output.
    Json,
}

/// Logging plugin.
///
/// | Service | Effect |
/// |---------|--------|
/// | [`Logs`] | configured with directory and rotation budget |
#[derive(Clone)]
pub struct LogPlugin {
    level: Level,
    format: LogFormat,
    env_filter: Option<String>,
    span_events: bool,
    config: LogConfig,
}

impl Default for LogPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            env_filter: None,
            span_events: false,
            config: LogConfig::default(),
        }
    }
}

impl LogPlugin {
    /// Creates a `LogPlugin` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum `tracing` level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the console output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter, e.g. `"weft=debug,weft::mod=info"`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Sets the directory holding the per-mod log files.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.directory = directory.into();
        self
    }

    /// Sets the size budget after which log files rotate.
    #[must_use]
    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.config.max_file_bytes = max_file_bytes;
        self
    }
}

impl Plugin for LogPlugin {
    fn build(&self, server: &mut Server) {
        server.service::<Logs>().configure(self.config.clone());
    }

    fn ready(&self, _server: &mut Server) {
        let env_filter = match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        };

        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        // try_init().ok(): the host may already have installed a subscriber.
        match self.format {
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            LogFormat::Compact => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
        }

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            directory = %self.config.directory.display(),
            "LogPlugin initialized"
        );
    }

    fn cleanup(&self, server: &mut Server) {
        server.service::<Logs>().clear_channels();
        tracing::info!("LogPlugin shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weft_system::identity::ModIdentity;

    #[test]
    fn log_plugin_defaults() {
        let plugin = LogPlugin::default();
        assert_eq!(plugin.level, Level::INFO);
        assert_eq!(plugin.format, LogFormat::Pretty);
        assert_eq!(plugin.config, LogConfig::default());
    }

    #[test]
    fn log_plugin_builders() {
        let plugin = LogPlugin::new()
            .with_env_filter("weft=debug")
            .with_span_events(true)
            .with_directory("/var/log/host");
        assert_eq!(plugin.env_filter.as_deref(), Some("weft=debug"));
        assert!(plugin.span_events);
        assert_eq!(plugin.config.directory, PathBuf::from("/var/log/host"));
    }

    #[test]
    fn cleanup_clears_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = Server::new();
        server.add_plugins(LogPlugin::default().with_directory(dir.path()));
        server.finish();

        let owner = Arc::new(
            ModIdentity::builder("Plug")
                .author("t")
                .namespace("plug")
                .file_path("Mods/Plug")
                .version("1")
                .build()
                .unwrap(),
        );
        let logs = server.service::<Logs>();
        let _ = logs.channel(&owner, "main");
        assert_eq!(logs.config().directory, dir.path());

        server.cleanup();
        assert!(logs.channels().is_empty());
    }
}
