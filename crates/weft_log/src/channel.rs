//! Toggleable per-mod log channels.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Level;
use weft_system::identity::ModIdentity;

use crate::logs::LogWriter;
use crate::sink::SinkKind;

/// A named log stream owned by one mod.
///
/// Channels start disabled. While disabled, every logging call returns
/// before the message is formatted. Debug, info and warning lines go to
/// `<Mod>_Messages.txt`, errors to `<Mod>_Exceptions.txt`.
pub struct LogChannel {
    owner: Arc<ModIdentity>,
    name: String,
    enabled: AtomicBool,
    writer: Arc<LogWriter>,
}

impl fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogChannel")
            .field("owner", &self.owner.name())
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl LogChannel {
    pub(crate) fn new(owner: Arc<ModIdentity>, name: String, writer: Arc<LogWriter>) -> Self {
        Self {
            owner,
            name,
            enabled: AtomicBool::new(false),
            writer,
        }
    }

    /// The mod that owns this channel.
    #[must_use]
    pub fn owner(&self) -> &Arc<ModIdentity> {
        &self.owner
    }

    /// Channel name, unique within the owning mod.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the channel currently writes.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns the channel on or off. Not persisted.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Turns the channel on.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Turns the channel off.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Logs at debug level.
    pub fn debug(&self, message: impl fmt::Display) {
        self.log_with(Level::DEBUG, || message.to_string());
    }

    /// Logs at info level.
    pub fn info(&self, message: impl fmt::Display) {
        self.log_with(Level::INFO, || message.to_string());
    }

    /// Logs at warning level.
    pub fn warn(&self, message: impl fmt::Display) {
        self.log_with(Level::WARN, || message.to_string());
    }

    /// Logs at error level, to the exceptions file.
    pub fn error(&self, message: impl fmt::Display) {
        self.log_with(Level::ERROR, || message.to_string());
    }

    /// Logs a lazily built message. `message` only runs if the channel is enabled.
    pub fn log_with(&self, level: Level, message: impl FnOnce() -> String) {
        if !self.is_enabled() {
            return;
        }
        let message = message();
        let kind = if level == Level::ERROR {
            SinkKind::Exceptions
        } else {
            SinkKind::Messages
        };
        self.writer
            .write_line(&self.owner, Some(&self.name), level, &message, kind);
    }
}
