//! Typed publish/subscribe for weft.
//!
//! - [`Event`] - implemented by every event; [`impl_event!`] wires up the
//!   parent chain
//! - [`EventBus`] - the service handlers register on and events dispatch through
//! - [`builtin`] - events raised by the host

pub mod builtin;
mod bus;
mod event;

pub use builtin::*;
pub use bus::{EventBus, EventRegistrationError, HandlerId};
pub use event::{Event, EventType, lineage, view};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{Event, EventBus, EventType, HandlerId, impl_event};
}
