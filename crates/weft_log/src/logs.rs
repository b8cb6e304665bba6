//! The logging service: configuration, channel registry and fault capture.

use core::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::Level;
use weft_system::identity::ModIdentity;
use weft_system::service::{Service, Services};

use crate::channel::LogChannel;
use crate::fault::{Fault, isolate};
use crate::sink::{DEFAULT_MAX_FILE_BYTES, FileSink, SinkKind};

// ─────────────────────────────────────────────────────────────────────────────
// LogConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Where log files live and when they rotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Host-chosen directory holding every mod's log files.
    pub directory: PathBuf,
    /// Size budget after which a file is rotated before the next write.
    pub max_file_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("weft").join("logs"),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// LogWriter
// ─────────────────────────────────────────────────────────────────────────────

/// Shared between the service and its channels; serializes file writes.
pub(crate) struct LogWriter {
    config: RwLock<LogConfig>,
    write_lock: Mutex<()>,
}

impl LogWriter {
    fn sink(&self, mod_name: &str, kind: SinkKind) -> FileSink {
        let config = self.config.read();
        FileSink::new(
            config.directory.clone(),
            mod_name,
            kind,
            config.max_file_bytes,
        )
    }

    fn append(&self, mod_name: &str, kind: SinkKind, text: &str) {
        let sink = self.sink(mod_name, kind);
        let _guard = self.write_lock.lock();
        if let Err(err) = sink.append(text) {
            tracing::warn!(
                target: "weft::log",
                path = %sink.path().display(),
                error = %err,
                "failed to write log file"
            );
        }
    }

    /// Formats one line, mirrors it to `tracing` and appends it.
    pub(crate) fn write_line(
        &self,
        owner: &ModIdentity,
        channel: Option<&str>,
        level: Level,
        message: &str,
        kind: SinkKind,
    ) {
        let channel = channel.unwrap_or("-");
        let mod_name = owner.name();
        if level == Level::ERROR {
            tracing::error!(target: "weft::mod", mod_name, channel, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "weft::mod", mod_name, channel, "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "weft::mod", mod_name, channel, "{message}");
        } else {
            tracing::debug!(target: "weft::mod", mod_name, channel, "{message}");
        }

        let line = format!(
            "[{}] [{}] [{}] {}: {}",
            timestamp(),
            mod_name,
            channel,
            level,
            message
        );
        self.append(mod_name, kind, &line);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExceptionRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One captured failure, as written to `<Mod>_Exceptions.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    /// Local time of capture.
    pub timestamp: String,
    /// Mod attribution prefix.
    pub attribution: String,
    /// Caller-supplied description of what was running.
    pub message: String,
    /// Caller context followed by the fault's own context.
    pub context: Vec<(String, String)>,
    /// Type name of the fault.
    pub fault_type: String,
    /// The fault's description.
    pub fault_message: String,
    /// Raise site, when known.
    pub location: Option<String>,
    /// Stack trace from the raise site outward.
    pub trace: String,
}

impl ExceptionRecord {
    /// Assembles a record for `fault` raised in code owned by `owner`.
    #[must_use]
    pub fn capture(
        owner: &ModIdentity,
        message: &str,
        fault: &Fault,
        context: &[(&str, String)],
    ) -> Self {
        let context = context
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .chain(fault.context().iter().cloned())
            .collect();
        Self {
            timestamp: timestamp(),
            attribution: owner.attribution(),
            message: message.to_string(),
            context,
            fault_type: fault.type_name().to_string(),
            fault_message: fault.message().to_string(),
            location: fault.location().map(ToString::to_string),
            trace: fault.trace().to_string(),
        }
    }

    /// Renders the record as it appears in the exceptions file.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("[{}] [{}] {}", self.timestamp, self.attribution, self.message);
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            out.push_str(" | ");
            out.push_str(&pairs.join(", "));
        }
        out.push_str(&format!("\n  {}: {}", self.fault_type, self.fault_message));
        if let Some(location) = &self.location {
            out.push_str(&format!("\n  raised at {location}"));
        }
        out.push_str("\n  stack trace:\n");
        out.push_str(&self.trace);
        out
    }
}

impl fmt::Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logs Service
// ─────────────────────────────────────────────────────────────────────────────

/// Logging service: channels, advisories and fault capture for every mod.
///
/// ```
/// use std::sync::Arc;
/// use weft_log::{Fault, LogConfig, Logs};
/// use weft_system::identity::ModIdentity;
///
/// let dir = std::env::temp_dir().join("weft-doc-logs");
/// let logs = Arc::new(Logs::new(LogConfig { directory: dir, ..LogConfig::default() }));
/// let owner = Arc::new(
///     ModIdentity::builder("DocMod").author("a").namespace("doc")
///         .file_path("Mods/DocMod").version("1").build().unwrap(),
/// );
///
/// let parse = logs.catch_exceptions(&owner, 0, |raw: &str| Ok(raw.parse::<i32>()?));
/// assert_eq!(parse("7"), 7);
/// assert_eq!(parse("seven"), 0);
/// ```
pub struct Logs {
    writer: Arc<LogWriter>,
    channels: RwLock<HashMap<(String, String), Arc<LogChannel>>>,
    /// States requested for channels that did not exist yet.
    requested: Mutex<HashMap<(String, String), bool>>,
}

impl Service for Logs {
    fn create(_: &Services) -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Debug for Logs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logs")
            .field("config", &*self.writer.config.read())
            .field("channels", &self.channels.read().len())
            .finish()
    }
}

impl Logs {
    /// Creates a logging service writing under `config.directory`.
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        Self {
            writer: Arc::new(LogWriter {
                config: RwLock::new(config),
                write_lock: Mutex::new(()),
            }),
            channels: RwLock::new(HashMap::new()),
            requested: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the configuration. Applies to every later write, including
    /// writes through existing channels.
    pub fn configure(&self, config: LogConfig) {
        *self.writer.config.write() = config;
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> LogConfig {
        self.writer.config.read().clone()
    }

    /// Path of `mod_name`'s log file of the given kind.
    #[must_use]
    pub fn sink_path(&self, mod_name: &str, kind: SinkKind) -> PathBuf {
        self.writer.sink(mod_name, kind).path()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the `(owner, name)` channel, creating it on first use.
    ///
    /// A new channel starts disabled unless [`Logs::set_enabled`] asked for
    /// it before it existed.
    #[must_use]
    pub fn channel(&self, owner: &Arc<ModIdentity>, name: &str) -> Arc<LogChannel> {
        let key = (owner.name().to_string(), name.to_string());
        if let Some(channel) = self.channels.read().get(&key) {
            return Arc::clone(channel);
        }
        let mut channels = self.channels.write();
        let requested = self.requested.lock().remove(&key);
        Arc::clone(channels.entry(key).or_insert_with(|| {
            let channel = LogChannel::new(
                Arc::clone(owner),
                name.to_string(),
                Arc::clone(&self.writer),
            );
            if let Some(enabled) = requested {
                channel.set_enabled(enabled);
            }
            Arc::new(channel)
        }))
    }

    /// Looks up an existing channel by mod name and channel name.
    #[must_use]
    pub fn find_channel(&self, mod_name: &str, name: &str) -> Option<Arc<LogChannel>> {
        self.channels
            .read()
            .get(&(mod_name.to_string(), name.to_string()))
            .cloned()
    }

    /// Toggles a channel.
    ///
    /// Returns false if no such channel exists yet; the state is then
    /// remembered and applied when the mod creates the channel.
    pub fn set_enabled(&self, mod_name: &str, name: &str, enabled: bool) -> bool {
        let key = (mod_name.to_string(), name.to_string());
        let channels = self.channels.read();
        if let Some(channel) = channels.get(&key) {
            channel.set_enabled(enabled);
            return true;
        }
        self.requested.lock().insert(key, enabled);
        false
    }

    /// Every channel, ordered by mod then channel name.
    #[must_use]
    pub fn channels(&self) -> Vec<Arc<LogChannel>> {
        let mut channels: Vec<_> = self.channels.read().values().cloned().collect();
        channels.sort_by(|a, b| {
            (a.owner().name(), a.name()).cmp(&(b.owner().name(), b.name()))
        });
        channels
    }

    /// Drops every channel and remembered request. Called at shutdown.
    pub fn clear_channels(&self) {
        self.channels.write().clear();
        self.requested.lock().clear();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unconditional records
    // ─────────────────────────────────────────────────────────────────────────

    /// Writes a structured warning to the owner's messages file regardless
    /// of channel state. Used for host-integration advisories.
    pub fn advisory(&self, owner: &ModIdentity, message: &str, context: &[(&str, String)]) {
        let line = with_context(message, context);
        self.writer
            .write_line(owner, None, Level::WARN, &line, SinkKind::Messages);
    }

    /// Writes an error line to the owner's exceptions file regardless of
    /// channel state. Used when there is no fault to attach, such as a
    /// rejected registration.
    pub fn error(&self, owner: &ModIdentity, message: &str, context: &[(&str, String)]) {
        let line = with_context(message, context);
        self.writer
            .write_line(owner, None, Level::ERROR, &line, SinkKind::Exceptions);
    }

    /// Records `fault` in the owner's exceptions file.
    pub fn log_exception(&self, owner: &ModIdentity, message: &str, fault: &Fault) {
        self.log_exception_with(owner, message, fault, &[]);
    }

    /// Records `fault` with extra `key=value` context.
    pub fn log_exception_with(
        &self,
        owner: &ModIdentity,
        message: &str,
        fault: &Fault,
        context: &[(&str, String)],
    ) {
        let record = ExceptionRecord::capture(owner, message, fault, context);
        tracing::error!(
            target: "weft::mod",
            mod_name = owner.name(),
            fault_type = %record.fault_type,
            fault = %record.fault_message,
            "{message}"
        );
        self.writer
            .append(owner.name(), SinkKind::Exceptions, &record.render());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catching
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs `f` in an isolation frame; on failure records the fault and
    /// returns `fallback`.
    pub fn guard<R>(
        &self,
        owner: &ModIdentity,
        message: &str,
        fallback: R,
        f: impl FnOnce() -> Result<R, Fault>,
    ) -> R {
        match isolate(f) {
            Ok(value) => value,
            Err(fault) => {
                self.log_exception(owner, message, &fault);
                fallback
            }
        }
    }

    /// Wraps `f` so any failure is recorded against `owner` and `fallback`
    /// is returned instead.
    pub fn catch_exceptions<A, R, F>(
        self: &Arc<Self>,
        owner: &Arc<ModIdentity>,
        fallback: R,
        f: F,
    ) -> impl Fn(A) -> R + Send + Sync + 'static
    where
        A: 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(A) -> Result<R, Fault> + Send + Sync + 'static,
    {
        let logs = Arc::clone(self);
        let owner = Arc::clone(owner);
        let message = format!("Exception caught in {}", core::any::type_name::<F>());
        move |args: A| logs.guard(&owner, &message, fallback.clone(), || f(args))
    }
}

fn with_context(message: &str, context: &[(&str, String)]) -> String {
    if context.is_empty() {
        return message.to_string();
    }
    let pairs: Vec<String> = context
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("{message} | {}", pairs.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Arc<ModIdentity> {
        Arc::new(
            ModIdentity::builder("Unit")
                .author("tests")
                .namespace("unit")
                .file_path("Mods/Unit")
                .version("0.1")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn channels_are_unique_per_mod_and_name() {
        let logs = Logs::new(LogConfig::default());
        let owner = owner();
        let a = logs.channel(&owner, "ai");
        let b = logs.channel(&owner, "ai");
        let c = logs.channel(&owner, "zones");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!a.is_enabled());
        assert_eq!(logs.channels().len(), 2);
    }

    #[test]
    fn set_enabled_reports_missing_channels() {
        let logs = Logs::new(LogConfig::default());
        let channel = logs.channel(&owner(), "ai");
        assert!(logs.set_enabled("Unit", "ai", true));
        assert!(channel.is_enabled());
        assert!(!logs.set_enabled("Unit", "missing", true));
        logs.clear_channels();
        assert!(logs.find_channel("Unit", "ai").is_none());
        assert!(!logs.channel(&owner(), "missing").is_enabled());
    }

    #[test]
    fn state_requested_before_creation_is_applied() {
        let logs = Logs::new(LogConfig::default());
        assert!(!logs.set_enabled("Unit", "ai", true));
        assert!(logs.find_channel("Unit", "ai").is_none());

        let channel = logs.channel(&owner(), "ai");
        assert!(channel.is_enabled());

        assert!(!logs.set_enabled("Unit", "zones", true));
        assert!(!logs.set_enabled("Unit", "zones", false));
        assert!(!logs.channel(&owner(), "zones").is_enabled());
    }

    #[test]
    fn context_is_rendered_as_pairs() {
        assert_eq!(with_context("m", &[]), "m");
        assert_eq!(
            with_context("m", &[("a", "1".into()), ("b", "2".into())]),
            "m | a=1, b=2"
        );
    }

    #[test]
    fn record_merges_caller_and_fault_context() {
        let fault = Fault::new("broken").with_context("sim", 7);
        let record =
            ExceptionRecord::capture(&owner(), "in handler", &fault, &[("event", "Load".into())]);
        assert_eq!(
            record.context,
            [
                ("event".to_string(), "Load".to_string()),
                ("sim".to_string(), "7".to_string())
            ]
        );
        let rendered = record.render();
        assert!(rendered.contains("[Unit v0.1 by tests] in handler | event=Load, sim=7"));
        assert!(rendered.contains("Fault: broken"));
    }
}
