//! # Weft Internal Library
//!
//! Re-exports the weft crates for convenience.

/// Mod identities, services and plugin orchestration.
pub use weft_system;

/// Log channels, fault capture and isolation.
pub use weft_log;

/// Event types and the event bus.
pub use weft_events;

/// Host classes and method injection.
pub use weft_inject;

/// In-host test classes and runner.
pub use weft_testing;

/// Data stores, console commands, resource keys and the default plugins.
pub use weft_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use weft_core_plugins::prelude::*;
    pub use weft_events::prelude::*;
    pub use weft_inject::prelude::*;
    pub use weft_log::prelude::*;
    pub use weft_system::prelude::*;
    pub use weft_testing::prelude::*;
}
