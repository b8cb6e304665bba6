//! The foundational layer of weft.
//!
//! `weft_system` provides the primitives every other weft crate builds on:
//!
//! - [`identity`] - Mod attribution ([`ModIdentity`](identity::ModIdentity)) and the mod registry
//! - [`service`] - Lazily-constructed, per-type singleton services
//! - [`plugin`] - Plugin trait; every mod is delivered as a plugin
//! - [`server`] - Plugin orchestration standing in for the host's mod loader
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use weft_system::identity::{ModIdentity, ModRegistry};
//! use weft_system::plugin::Plugin;
//! use weft_system::server::Server;
//!
//! struct BetterBuffs;
//!
//! impl Plugin for BetterBuffs {
//!     fn build(&self, server: &mut Server) {
//!         let identity = ModIdentity::builder("BetterBuffs")
//!             .author("someone")
//!             .namespace("better_buffs")
//!             .file_path("Mods/BetterBuffs")
//!             .version("1.0.0")
//!             .build()
//!             .expect("identity fields are present");
//!         server
//!             .service::<ModRegistry>()
//!             .register(identity)
//!             .expect("name is unique");
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(BetterBuffs);
//! server.finish();
//!
//! let registry: Arc<ModRegistry> = server.service::<ModRegistry>();
//! assert!(registry.get("BetterBuffs").is_some());
//! ```

/// Mod attribution and the process-wide mod registry.
pub mod identity;

/// Plugin trait for extensible functionality.
pub mod plugin;

/// Server runtime for plugin orchestration.
pub mod server;

/// Singleton service base.
pub mod service;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::identity::*;
    pub use crate::plugin::*;
    pub use crate::server::*;
    pub use crate::service::*;
}
