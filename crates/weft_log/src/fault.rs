//! Captured failures.
//!
//! A [`Fault`] is what weft records whenever mod code fails: an error
//! returned through `?`, an explicit [`Fault::new`], or a panic caught by
//! [`isolate`]. The stack trace is taken where the fault is created (or, for
//! panics, where the panic started), so the trace always reaches back past
//! the point where weft eventually catches it.

use core::any::Any;
use core::fmt;
use core::panic::Location;
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FAULT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_FAULT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A captured failure with its stack trace and context.
///
/// Any [`std::error::Error`] converts into a `Fault`, so mod code can use `?`
/// freely inside injected callables, event handlers and tests:
///
/// ```
/// use weft_log::Fault;
///
/// fn parse_level(raw: &str) -> Result<u8, Fault> {
///     let level: u8 = raw.parse()?;
///     if level > 10 {
///         return Err(Fault::new("skill level out of range").with_context("level", level));
///     }
///     Ok(level)
/// }
///
/// let fault = parse_level("eleven").unwrap_err();
/// assert!(fault.type_name().contains("ParseIntError"));
/// assert_eq!(parse_level("11").unwrap_err().context()[0], ("level".into(), "11".into()));
/// ```
pub struct Fault {
    id: u64,
    type_name: Cow<'static, str>,
    message: String,
    context: Vec<(String, String)>,
    location: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    trace: Backtrace,
    panic: Option<Box<dyn Any + Send + 'static>>,
}

impl Fault {
    /// Creates a fault from a message, capturing the current stack.
    #[must_use]
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            type_name: Cow::Borrowed("Fault"),
            message: message.into(),
            context: Vec::new(),
            location: Some(Location::caller().to_string()),
            source: None,
            trace: Backtrace::force_capture(),
            panic: None,
        }
    }

    /// Wraps an error value, capturing the current stack.
    #[must_use]
    #[track_caller]
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            id: next_id(),
            type_name: Cow::Borrowed(core::any::type_name::<E>()),
            message: error.to_string(),
            context: Vec::new(),
            location: Some(Location::caller().to_string()),
            source: Some(Box::new(error)),
            trace: Backtrace::force_capture(),
            panic: None,
        }
    }

    fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        let captured = CAPTURED_PANIC.with(|slot| slot.borrow_mut().take());
        let (trace, location) = match captured {
            Some(captured) => (captured.trace, captured.location),
            None => (Backtrace::force_capture(), None),
        };
        Self {
            id: next_id(),
            type_name: Cow::Borrowed("panic"),
            message,
            context: Vec::new(),
            location,
            source: None,
            trace,
            panic: Some(payload),
        }
    }

    /// Adds a `key=value` pair rendered alongside the fault.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    /// Process-unique identity of this fault. Adding context keeps it.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Type name of the underlying error, `"Fault"` for message faults or
    /// `"panic"` for caught panics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Context pairs in insertion order.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Source location where the fault was raised, when known.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Stack trace captured at the raise site.
    #[must_use]
    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }

    /// Returns true if this fault came from a caught panic.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        self.panic.is_some()
    }

    /// Returns true if the wrapped error is of type `E`.
    #[must_use]
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Borrows the wrapped error as `E`.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref()?.downcast_ref::<E>()
    }

    /// Re-raises the fault the way it was originally raised: panics resume
    /// unwinding with their original payload, everything else comes back as `Err`.
    pub fn rethrow<T>(self) -> Result<T, Fault> {
        match self.panic {
            Some(payload) => panic::resume_unwind(payload),
            None => Err(self),
        }
    }
}

impl<E> From<E> for Fault
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Fault::from_error(error)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("type_name", &self.type_name)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Isolation
// ─────────────────────────────────────────────────────────────────────────────

struct CapturedPanic {
    trace: Backtrace,
    location: Option<String>,
}

thread_local! {
    static ISOLATION_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

/// Chains a panic hook that records the panic-site stack while an
/// isolation frame is active. Panics outside isolation reach the previous hook.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if ISOLATION_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let captured = CapturedPanic {
                trace: Backtrace::force_capture(),
                location: info.location().map(ToString::to_string),
            };
            CAPTURED_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

struct IsolationFrame;

impl IsolationFrame {
    fn enter() -> Self {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for IsolationFrame {
    fn drop(&mut self) {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Runs `f` inside an isolation frame, converting a panic into a [`Fault`].
///
/// ```
/// use weft_log::{isolate, Fault};
///
/// let fault = isolate(|| -> Result<(), Fault> { panic!("boom") }).unwrap_err();
/// assert!(fault.is_panic());
/// assert_eq!(fault.message(), "boom");
/// ```
///
/// # Errors
///
/// Returns the fault produced by `f`, or the converted panic.
pub fn isolate<R>(f: impl FnOnce() -> Result<R, Fault>) -> Result<R, Fault> {
    install_panic_hook();
    let outcome = {
        let _frame = IsolationFrame::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(Fault::from_panic(payload)),
    }
}
