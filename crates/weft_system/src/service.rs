//! Singleton services.
//!
//! A service is a type with exactly one instance per [`Services`] container.
//! The instance is constructed lazily on the first [`Services::get`] and every
//! later call hands back the same [`Arc`]. Registries, the event bus, the
//! test harness and the data-store manager are all services.
//!
//! Slots are keyed by [`TypeId`], so every concrete type owns its own slot.
//! A type that extends another by wrapping it gets a slot distinct from the
//! one it wraps:
//!
//! ```
//! use std::sync::Arc;
//! use weft_system::service::{Service, Services};
//!
//! #[derive(Default)]
//! struct Counter(parking_lot::Mutex<u32>);
//!
//! impl Service for Counter {
//!     fn create(_: &Services) -> Self {
//!         Self::default()
//!     }
//! }
//!
//! #[derive(Default)]
//! struct LoudCounter(Counter);
//!
//! impl Service for LoudCounter {
//!     fn create(_: &Services) -> Self {
//!         Self::default()
//!     }
//! }
//!
//! let services = Services::new();
//! assert!(Arc::ptr_eq(&services.get::<Counter>(), &services.get::<Counter>()));
//! *services.get::<LoudCounter>().0.0.lock() += 1;
//! assert_eq!(*services.get::<Counter>().0.lock(), 0);
//! ```
//!
//! # Process-wide Container
//!
//! [`Service::get`] resolves through [`Services::global`], the container the
//! host process shares with every mod. Servers created with
//! [`Server::new`](crate::server::Server::new) use a private container so
//! independent servers (and tests) do not observe each other.

use core::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Service Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A lazily-constructed singleton.
///
/// Services use interior mutability for their state, since every consumer
/// holds the same shared instance.
pub trait Service: Sized + Send + Sync + 'static {
    /// Constructs the instance. Called at most once per container.
    ///
    /// The container is passed so a service can resolve the services it
    /// depends on.
    fn create(services: &Services) -> Self;

    /// Returns the process-wide instance, constructing it on first use.
    #[must_use]
    fn get() -> Arc<Self> {
        Services::global().get::<Self>()
    }
}

/// Unique identifier for a service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceId {
    /// Creates the `ServiceId` for the given service type.
    #[must_use]
    pub fn of<S: Service>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: core::any::type_name::<S>(),
        }
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Errors from service container operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service was already constructed, so it can no longer be seeded.
    #[error("service already initialized: {0}")]
    AlreadyInitialized(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Services Container
// ─────────────────────────────────────────────────────────────────────────────

type SharedInstance = Arc<dyn Any + Send + Sync>;

struct ServiceSlot {
    cell: OnceLock<SharedInstance>,
}

/// Container holding one slot per service type.
///
/// Cloning a `Services` yields a handle to the same slots.
#[derive(Clone, Default)]
pub struct Services {
    slots: Arc<RwLock<HashMap<ServiceId, Arc<ServiceSlot>>>>,
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let slots = self.slots.read();
        f.debug_list()
            .entries(slots.keys().map(ServiceId::type_name))
            .finish()
    }
}

impl Services {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide container.
    #[must_use]
    pub fn global() -> &'static Services {
        static GLOBAL: OnceLock<Services> = OnceLock::new();
        GLOBAL.get_or_init(Services::new)
    }

    /// Returns the instance of `S`, constructing it on first use.
    ///
    /// Construction runs without holding the container lock, so
    /// [`Service::create`] may itself resolve other services.
    #[must_use]
    pub fn get<S: Service>(&self) -> Arc<S> {
        let slot = self.slot::<S>();
        let instance = slot
            .cell
            .get_or_init(|| Arc::new(S::create(self)) as SharedInstance);
        downcast::<S>(instance)
    }

    /// Returns the instance of `S` if it has already been constructed.
    #[must_use]
    pub fn try_get<S: Service>(&self) -> Option<Arc<S>> {
        let slots = self.slots.read();
        let instance = slots.get(&ServiceId::of::<S>())?.cell.get()?;
        Some(downcast::<S>(instance))
    }

    /// Returns true if `S` has been constructed or seeded.
    #[must_use]
    pub fn contains<S: Service>(&self) -> bool {
        self.try_get::<S>().is_some()
    }

    /// Seeds the slot for `S` with an explicit instance.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::AlreadyInitialized`] if `S` was already
    /// constructed; the existing instance is kept.
    pub fn insert<S: Service>(&self, service: S) -> Result<Arc<S>, ServiceError> {
        let slot = self.slot::<S>();
        let instance: SharedInstance = Arc::new(service);
        slot.cell
            .set(Arc::clone(&instance))
            .map_err(|_| ServiceError::AlreadyInitialized(core::any::type_name::<S>()))?;
        Ok(downcast::<S>(&instance))
    }

    /// Releases every service instance held by this container.
    ///
    /// Outstanding `Arc`s stay valid; the next `get` constructs afresh.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Returns the number of constructed services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.cell.get().is_some())
            .count()
    }

    /// Returns true if no service has been constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot<S: Service>(&self) -> Arc<ServiceSlot> {
        let id = ServiceId::of::<S>();
        if let Some(slot) = self.slots.read().get(&id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(id).or_insert_with(|| {
            Arc::new(ServiceSlot {
                cell: OnceLock::new(),
            })
        }))
    }
}

fn downcast<S: Service>(instance: &SharedInstance) -> Arc<S> {
    match Arc::clone(instance).downcast::<S>() {
        Ok(service) => service,
        Err(_) => unreachable!("service slot is keyed by the TypeId of its instance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ops::Deref;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Inventory {
        items: Mutex<Vec<&'static str>>,
    }

    impl Service for Inventory {
        fn create(_: &Services) -> Self {
            Self::default()
        }
    }

    /// Extends `Inventory`; owns a separate slot.
    #[derive(Default)]
    struct SharedInventory(Inventory);

    impl Deref for SharedInventory {
        type Target = Inventory;

        fn deref(&self) -> &Inventory {
            &self.0
        }
    }

    impl Service for SharedInventory {
        fn create(_: &Services) -> Self {
            Self::default()
        }
    }

    struct Depends {
        inventory: Arc<Inventory>,
    }

    impl Service for Depends {
        fn create(services: &Services) -> Self {
            Self {
                inventory: services.get::<Inventory>(),
            }
        }
    }

    #[test]
    fn get_returns_same_instance() {
        let services = Services::new();
        let a = services.get::<Inventory>();
        let b = services.get::<Inventory>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn extended_type_has_distinct_slot() {
        let services = Services::new();
        let parent = services.get::<Inventory>();
        let child = services.get::<SharedInventory>();

        parent.items.lock().push("candle");

        assert_eq!(services.get::<Inventory>().items.lock().len(), 1);
        assert!(child.items.lock().is_empty());
    }

    #[test]
    fn create_can_resolve_dependencies() {
        let services = Services::new();
        let depends = services.get::<Depends>();
        assert!(Arc::ptr_eq(&depends.inventory, &services.get::<Inventory>()));
    }

    #[test]
    fn insert_seeds_slot_once() {
        let services = Services::new();
        let seeded = Inventory::default();
        seeded.items.lock().push("lamp");
        services.insert(seeded).expect("slot is empty");

        assert_eq!(services.get::<Inventory>().items.lock().as_slice(), ["lamp"]);
        assert_eq!(
            services.insert(Inventory::default()).err(),
            Some(ServiceError::AlreadyInitialized(
                core::any::type_name::<Inventory>()
            ))
        );
    }

    #[test]
    fn try_get_does_not_construct() {
        let services = Services::new();
        assert!(services.try_get::<Inventory>().is_none());
        assert!(!services.contains::<Inventory>());
        let _ = services.get::<Inventory>();
        assert!(services.contains::<Inventory>());
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn clear_releases_instances() {
        let services = Services::new();
        let before = services.get::<Inventory>();
        services.clear();
        assert!(services.is_empty());
        assert!(!Arc::ptr_eq(&before, &services.get::<Inventory>()));
    }

    #[test]
    fn clones_share_slots() {
        let services = Services::new();
        let handle = services.clone();
        assert!(Arc::ptr_eq(
            &services.get::<Inventory>(),
            &handle.get::<Inventory>()
        ));
    }

    #[test]
    fn global_accessor_is_stable() {
        struct GlobalOnly;
        impl Service for GlobalOnly {
            fn create(_: &Services) -> Self {
                Self
            }
        }

        assert!(Arc::ptr_eq(&GlobalOnly::get(), &GlobalOnly::get()));
        assert!(Services::global().contains::<GlobalOnly>());
    }
}
