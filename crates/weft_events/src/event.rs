//! The [`Event`] trait and event lineage.
//!
//! Events form single-inheritance chains: a specific event embeds its more
//! general parent and exposes it through [`Event::parent`]. A handler for a
//! general event also receives every more specific one.

use core::any::{TypeId, type_name};
use core::fmt;

use downcast_rs::{DowncastSync, impl_downcast};

/// A value published on the [`EventBus`](crate::EventBus).
///
/// Implement it with [`impl_event!`](crate::impl_event) rather than by hand.
pub trait Event: DowncastSync + fmt::Debug {
    /// The more general event this one specializes, if any.
    fn parent(&self) -> Option<&dyn Event> {
        None
    }

    /// Runtime identity of the concrete event type.
    fn event_type(&self) -> EventType {
        EventType {
            type_id: TypeId::of::<Self>(),
            type_name: type_name::<Self>(),
        }
    }
}

impl_downcast!(sync Event);

/// Identity of an event type, comparable at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventType {
    type_id: TypeId,
    type_name: &'static str,
}

impl EventType {
    /// The identity of `E`.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
        }
    }

    /// Fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Types of `event` and its ancestors, most specific first.
#[must_use]
pub fn lineage(event: &dyn Event) -> Vec<EventType> {
    let mut types = Vec::new();
    let mut current = Some(event);
    while let Some(event) = current {
        types.push(event.event_type());
        current = event.parent();
    }
    types
}

/// Views `event` as an `E`, walking up its ancestors.
///
/// Returns `None` if neither the event nor any ancestor is an `E`.
#[must_use]
pub fn view<E: Event>(event: &dyn Event) -> Option<&E> {
    let mut current = Some(event);
    while let Some(event) = current {
        if let Some(found) = event.downcast_ref::<E>() {
            return Some(found);
        }
        current = event.parent();
    }
    None
}

/// Implements [`Event`] for a type.
///
/// With `=> field`, the event specializes the event stored in `field`.
///
/// ```
/// use weft_events::{Event, impl_event, view};
///
/// #[derive(Debug)]
/// struct Weather { temperature: i32 }
/// #[derive(Debug)]
/// struct Storm { weather: Weather, lightning: bool }
///
/// impl_event!(Weather);
/// impl_event!(Storm => weather);
///
/// let storm = Storm { weather: Weather { temperature: 12 }, lightning: true };
/// assert_eq!(view::<Weather>(&storm).map(|w| w.temperature), Some(12));
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty) => {
        impl $crate::Event for $ty {}
    };
    ($ty:ty => $parent:ident) => {
        impl $crate::Event for $ty {
            fn parent(&self) -> ::core::option::Option<&dyn $crate::Event> {
                ::core::option::Option::Some(&self.$parent)
            }
        }
    };
}
