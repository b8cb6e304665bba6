//! The event bus.
//!
//! Handlers are registered against an event type and receive every
//! dispatched event of that type or of any type specializing it. Each
//! handler runs in its own isolation frame: a failing handler is recorded
//! in its owner's exceptions file and dispatch moves on to the next one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use weft_events::{EventBus, SimDied, SimEvent, SimId};
//! use weft_log::{LogConfig, Logs};
//! use weft_system::identity::ModIdentity;
//!
//! let logs = Arc::new(Logs::new(LogConfig {
//!     directory: std::env::temp_dir().join("weft-doc-bus"),
//!     ..LogConfig::default()
//! }));
//! let bus = EventBus::new(logs);
//! let owner = Arc::new(
//!     ModIdentity::builder("Graveyard").author("a").namespace("graves")
//!         .file_path("Mods/Graveyard").version("1").build().unwrap(),
//! );
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! bus.register(&owner, "count_sims", move |event: &SimEvent| {
//!     sink.lock().push(event.sim_id);
//!     Ok(())
//! })
//! .unwrap();
//!
//! bus.dispatch(&SimDied { sim: SimEvent { sim_id: SimId(7) }, death_type: 1 });
//! assert_eq!(*seen.lock(), vec![SimId(7)]);
//! ```
//!
//! A handler must take exactly one event reference:
//!
//! ```compile_fail
//! # use std::sync::Arc;
//! # use weft_events::{EventBus, HostReady};
//! # use weft_log::{LogConfig, Logs};
//! # use weft_system::identity::ModIdentity;
//! # let bus = EventBus::new(Arc::new(Logs::new(LogConfig::default())));
//! # let owner = ModIdentity::framework();
//! bus.register(&owner, "two_args", |_: &HostReady, _: u32| Ok(()));
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::RwLock;
use weft_log::{Fault, Logs, isolate};
use weft_system::identity::ModIdentity;
use weft_system::service::{Service, Services};

use crate::builtin::host_event_types;
use crate::event::{Event, EventType, lineage, view};

/// Type-erased handler callable.
type BoxedHandler = Box<dyn Fn(&dyn Event) -> Result<(), Fault> + Send + Sync>;

/// Identifies one registration; pass it to [`EventBus::unregister`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Error returned when a handler cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRegistrationError {
    /// The handler's event type was never declared on the bus.
    UnknownEventType {
        /// Name given to the handler.
        handler: String,
        /// The undeclared event type.
        event: &'static str,
    },
}

impl fmt::Display for EventRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEventType { handler, event } => write!(
                f,
                "handler '{handler}' listens for '{event}', which is not a declared event type"
            ),
        }
    }
}

impl core::error::Error for EventRegistrationError {}

struct HandlerEntry {
    id: HandlerId,
    owner: Arc<ModIdentity>,
    name: String,
    accepts: EventType,
    handler: BoxedHandler,
}

/// Routes events to the handlers registered for them.
///
/// Handlers run in registration order. Registering or unregistering from
/// inside a handler is allowed and takes effect from the next dispatch.
pub struct EventBus {
    known: RwLock<HashSet<EventType>>,
    handlers: RwLock<Vec<Arc<HandlerEntry>>>,
    next_id: AtomicU64,
    logs: Arc<Logs>,
}

impl Service for EventBus {
    fn create(services: &Services) -> Self {
        Self::new(services.get::<Logs>())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("known", &self.known.read().len())
            .field("handlers", &self.handler_names())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with every host event type declared.
    #[must_use]
    pub fn new(logs: Arc<Logs>) -> Self {
        Self {
            known: RwLock::new(host_event_types().into_iter().collect()),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            logs,
        }
    }

    /// Declares a mod-defined event type. Returns false if it was already
    /// declared.
    pub fn declare<E: Event>(&self) -> bool {
        self.known.write().insert(EventType::of::<E>())
    }

    /// Returns true if `E` may be registered for and dispatched.
    #[must_use]
    pub fn is_declared<E: Event>(&self) -> bool {
        self.known.read().contains(&EventType::of::<E>())
    }

    /// Registers `handler` for events of type `E` and its specializations.
    ///
    /// Registration is additive: registering the same callable twice makes
    /// it run twice. Fails, and records the failure in the owner's
    /// exceptions file, if `E` is not declared.
    pub fn register<E, F>(
        &self,
        owner: &Arc<ModIdentity>,
        name: impl Into<String>,
        handler: F,
    ) -> Result<HandlerId, EventRegistrationError>
    where
        E: Event,
        F: Fn(&E) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let name = name.into();
        let accepts = EventType::of::<E>();

        if !self.known.read().contains(&accepts) {
            let error = EventRegistrationError::UnknownEventType {
                handler: name.clone(),
                event: accepts.name(),
            };
            self.logs.error(
                owner,
                "Failed to register event handler",
                &[("handler", name), ("reason", error.to_string())],
            );
            return Err(error);
        }

        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: BoxedHandler = Box::new(move |event: &dyn Event| match view::<E>(event) {
            Some(event) => handler(event),
            None => Ok(()),
        });
        tracing::debug!(
            mod_name = owner.name(),
            handler = %name,
            event = %accepts,
            "handler registered"
        );
        self.handlers.write().push(Arc::new(HandlerEntry {
            id,
            owner: Arc::clone(owner),
            name,
            accepts,
            handler,
        }));
        Ok(id)
    }

    /// Removes a registration. Returns false if it was already removed.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|entry| entry.id != id);
        handlers.len() != before
    }

    /// Removes every handler owned by `mod_name`. Returns how many were removed.
    pub fn unregister_mod(&self, mod_name: &str) -> usize {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|entry| entry.owner.name() != mod_name);
        before - handlers.len()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Names of registered handlers in dispatch order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Dispatches `event` to every matching handler.
    ///
    /// Returns false, without calling anything, if the event's type was
    /// never declared. Handler failures never reach the caller.
    pub fn dispatch<E: Event>(&self, event: &E) -> bool {
        self.dispatch_dyn(event)
    }

    /// Dispatches a type-erased event. See [`EventBus::dispatch`].
    pub fn dispatch_dyn(&self, event: &dyn Event) -> bool {
        let types = lineage(event);
        let own_type = event.event_type();
        if !self.known.read().contains(&own_type) {
            tracing::error!(event = %own_type, "dispatch of undeclared event type");
            return false;
        }

        // Snapshot so handlers can (un)register without deadlocking.
        let matching: Vec<Arc<HandlerEntry>> = self
            .handlers
            .read()
            .iter()
            .filter(|entry| types.contains(&entry.accepts))
            .cloned()
            .collect();

        for entry in matching {
            if let Err(fault) = isolate(|| (entry.handler)(event)) {
                self.logs.log_exception_with(
                    &entry.owner,
                    &format!("Error occurred in event handler '{}'", entry.name),
                    &fault,
                    &[
                        ("handler", entry.name.clone()),
                        ("event", format!("{event:?}")),
                    ],
                );
            }
        }
        true
    }
}
