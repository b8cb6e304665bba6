//! Logging and fault capture for weft.
//!
//! - [`Logs`] - the logging service: per-mod [`LogChannel`]s, advisories and
//!   [`Logs::log_exception`]
//! - [`Fault`] - a captured failure carrying the stack of its raise site
//! - [`isolate`] - runs mod code, turning panics into faults
//! - [`FileSink`] - `<Mod>_Messages.txt` / `<Mod>_Exceptions.txt` with rotation
//! - [`LogPlugin`] - configures the service and the `tracing` subscriber

mod channel;
mod fault;
mod logs;
mod plugin;
mod sink;

pub use channel::LogChannel;
pub use fault::{Fault, isolate};
pub use logs::{ExceptionRecord, LogConfig, Logs};
pub use plugin::{LogFormat, LogPlugin};
pub use sink::{DEFAULT_MAX_FILE_BYTES, FileSink, SinkKind};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{Fault, LogChannel, LogConfig, LogPlugin, Logs, isolate};
}
