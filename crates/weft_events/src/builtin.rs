//! Events raised by the host.
//!
//! Every type here is declared on a fresh [`EventBus`](crate::EventBus), so
//! mods can subscribe to them without declaring anything. General events
//! (such as [`SimEvent`]) are embedded in the specific ones (such as
//! [`SimDied`]); subscribing to the general event receives them all.

use core::fmt;

use crate::event::EventType;
use crate::impl_event;

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

host_id!(
    /// Host identifier of a sim.
    SimId
);
host_id!(
    /// Host identifier of a game object.
    ObjectId
);
host_id!(
    /// Host identifier of a zone (lot).
    ZoneId
);
host_id!(
    /// Host identifier of a household.
    HouseholdId
);
host_id!(
    /// Host identifier of a running interaction.
    InteractionId
);

/// The host finished starting; deferred injections are replayed on this.
#[derive(Debug, Clone, Default)]
pub struct HostReady;
impl_event!(HostReady);

// ─────────────────────────────────────────────────────────────────────────────
// Zone
// ─────────────────────────────────────────────────────────────────────────────

/// Something happened to the active zone.
#[derive(Debug, Clone)]
pub struct ZoneEvent {
    /// The zone.
    pub zone_id: ZoneId,
    /// Household living in the zone, if any.
    pub household_id: Option<HouseholdId>,
}
impl_event!(ZoneEvent);

/// Zone loading started; sims and objects are not yet available.
#[derive(Debug, Clone)]
pub struct ZoneEarlyLoad {
    /// The general event this specializes.
    pub zone: ZoneEvent,
}
impl_event!(ZoneEarlyLoad => zone);

/// Zone objects are loaded; sims are not yet spun up.
#[derive(Debug, Clone)]
pub struct ZoneLateLoad {
    /// The general event this specializes.
    pub zone: ZoneEvent,
}
impl_event!(ZoneLateLoad => zone);

/// The zone is fully loaded and playable.
#[derive(Debug, Clone)]
pub struct ZonePostLoad {
    /// The general event this specializes.
    pub zone: ZoneEvent,
    /// True the first time a zone loads after the game starts.
    pub first_load: bool,
}
impl_event!(ZonePostLoad => zone);

/// The zone is being unloaded.
#[derive(Debug, Clone)]
pub struct ZoneTeardown {
    /// The general event this specializes.
    pub zone: ZoneEvent,
}
impl_event!(ZoneTeardown => zone);

/// One simulation tick of the zone.
#[derive(Debug, Clone)]
pub struct ZoneUpdate {
    /// The general event this specializes.
    pub zone: ZoneEvent,
    /// Simulated milliseconds since the previous update.
    pub elapsed_ms: u64,
}
impl_event!(ZoneUpdate => zone);

// ─────────────────────────────────────────────────────────────────────────────
// Save
// ─────────────────────────────────────────────────────────────────────────────

/// Something happened to a save game.
#[derive(Debug, Clone)]
pub struct SaveEvent {
    /// Host save slot.
    pub slot_id: u32,
}
impl_event!(SaveEvent);

/// A save game finished loading.
#[derive(Debug, Clone)]
pub struct GameLoaded {
    /// The general event this specializes.
    pub save: SaveEvent,
}
impl_event!(GameLoaded => save);

/// The game was saved.
#[derive(Debug, Clone)]
pub struct GameSaved {
    /// The general event this specializes.
    pub save: SaveEvent,
    /// Player-visible name of the save.
    pub slot_name: String,
}
impl_event!(GameSaved => save);

// ─────────────────────────────────────────────────────────────────────────────
// Objects
// ─────────────────────────────────────────────────────────────────────────────

/// Something happened to a game object.
#[derive(Debug, Clone)]
pub struct ObjectEvent {
    /// The object.
    pub object_id: ObjectId,
}
impl_event!(ObjectEvent);

/// An object finished initializing.
#[derive(Debug, Clone)]
pub struct ObjectInitialized {
    /// The general event this specializes.
    pub object: ObjectEvent,
}
impl_event!(ObjectInitialized => object);

/// An object entered an inventory.
#[derive(Debug, Clone)]
pub struct ObjectAddedToInventory {
    /// The general event this specializes.
    pub object: ObjectEvent,
    /// Owner of the inventory.
    pub inventory_owner: ObjectId,
}
impl_event!(ObjectAddedToInventory => object);

// ─────────────────────────────────────────────────────────────────────────────
// Sims
// ─────────────────────────────────────────────────────────────────────────────

/// Something happened to a sim.
#[derive(Debug, Clone)]
pub struct SimEvent {
    /// The sim.
    pub sim_id: SimId,
}
impl_event!(SimEvent);

/// A sim was spawned into the zone.
#[derive(Debug, Clone)]
pub struct SimSpawned {
    /// The general event this specializes.
    pub sim: SimEvent,
}
impl_event!(SimSpawned => sim);

/// A sim was loaded from the save.
#[derive(Debug, Clone)]
pub struct SimLoaded {
    /// The general event this specializes.
    pub sim: SimEvent,
}
impl_event!(SimLoaded => sim);

/// A sim died.
#[derive(Debug, Clone)]
pub struct SimDied {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Host death type.
    pub death_type: u32,
}
impl_event!(SimDied => sim);

/// A dead sim was brought back.
#[derive(Debug, Clone)]
pub struct SimRevived {
    /// The general event this specializes.
    pub sim: SimEvent,
}
impl_event!(SimRevived => sim);

/// A sim changed life stage. Values are the host's raw age flags.
#[derive(Debug, Clone)]
pub struct SimAgeChanged {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Previous value.
    pub old_age: u32,
    /// Current value.
    pub new_age: u32,
}
impl_event!(SimAgeChanged => sim);

/// A sim changed gender. Values are the host's raw gender flags.
#[derive(Debug, Clone)]
pub struct SimGenderChanged {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Previous value.
    pub old_gender: u32,
    /// Current value.
    pub new_gender: u32,
}
impl_event!(SimGenderChanged => sim);

/// A sim changed species. Values are the host's raw species flags.
#[derive(Debug, Clone)]
pub struct SimSpeciesChanged {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Previous value.
    pub old_species: u32,
    /// Current value.
    pub new_species: u32,
}
impl_event!(SimSpeciesChanged => sim);

/// A sim switched outfit.
#[derive(Debug, Clone)]
pub struct OutfitChanged {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Host outfit category.
    pub category: u32,
    /// Outfit index within the category.
    pub index: u32,
}
impl_event!(OutfitChanged => sim);

/// A trait was added to a sim.
#[derive(Debug, Clone)]
pub struct TraitAdded {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Tuning instance of the trait.
    pub trait_id: u64,
}
impl_event!(TraitAdded => sim);

/// A buff was added to a sim.
#[derive(Debug, Clone)]
pub struct BuffAdded {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Tuning instance of the buff.
    pub buff_id: u64,
}
impl_event!(BuffAdded => sim);

/// A sim gained a skill level.
#[derive(Debug, Clone)]
pub struct SkillLeveledUp {
    /// The general event this specializes.
    pub sim: SimEvent,
    /// Tuning instance of the skill.
    pub skill_id: u64,
    /// Previous value.
    pub old_level: u32,
    /// Current value.
    pub new_level: u32,
}
impl_event!(SkillLeveledUp => sim);

// ─────────────────────────────────────────────────────────────────────────────
// Interactions
// ─────────────────────────────────────────────────────────────────────────────

/// Something happened to an interaction.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    /// The interaction.
    pub interaction_id: InteractionId,
    /// Sim performing it.
    pub sim_id: SimId,
    /// Target object, if any.
    pub target: Option<ObjectId>,
}
impl_event!(InteractionEvent);

/// An interaction was pushed onto a sim's queue.
#[derive(Debug, Clone)]
pub struct InteractionQueued {
    /// The general event this specializes.
    pub interaction: InteractionEvent,
}
impl_event!(InteractionQueued => interaction);

/// An interaction began running.
#[derive(Debug, Clone)]
pub struct InteractionStarted {
    /// The general event this specializes.
    pub interaction: InteractionEvent,
}
impl_event!(InteractionStarted => interaction);

/// An interaction's outcome was decided.
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    /// The general event this specializes.
    pub interaction: InteractionEvent,
    /// Whether the outcome counts as a success.
    pub success: bool,
}
impl_event!(InteractionOutcome => interaction);

/// Every host event type.
#[must_use]
pub fn host_event_types() -> Vec<EventType> {
    vec![
        EventType::of::<HostReady>(),
        EventType::of::<ZoneEvent>(),
        EventType::of::<ZoneEarlyLoad>(),
        EventType::of::<ZoneLateLoad>(),
        EventType::of::<ZonePostLoad>(),
        EventType::of::<ZoneTeardown>(),
        EventType::of::<ZoneUpdate>(),
        EventType::of::<SaveEvent>(),
        EventType::of::<GameLoaded>(),
        EventType::of::<GameSaved>(),
        EventType::of::<ObjectEvent>(),
        EventType::of::<ObjectInitialized>(),
        EventType::of::<ObjectAddedToInventory>(),
        EventType::of::<SimEvent>(),
        EventType::of::<SimSpawned>(),
        EventType::of::<SimLoaded>(),
        EventType::of::<SimDied>(),
        EventType::of::<SimRevived>(),
        EventType::of::<SimAgeChanged>(),
        EventType::of::<SimGenderChanged>(),
        EventType::of::<SimSpeciesChanged>(),
        EventType::of::<OutfitChanged>(),
        EventType::of::<TraitAdded>(),
        EventType::of::<BuffAdded>(),
        EventType::of::<SkillLeveledUp>(),
        EventType::of::<InteractionEvent>(),
        EventType::of::<InteractionQueued>(),
        EventType::of::<InteractionStarted>(),
        EventType::of::<InteractionOutcome>(),
    ]
}
