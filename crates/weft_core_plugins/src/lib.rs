//! Supporting plugins for weft mods.
//!
//! - [`persistence`] - versioned data stores and `#[derive(DataStore)]`
//! - [`commands`] - console command registration and the built-in `weft.*` commands
//! - [`resource_key`] - the host's `type:group:instance` resource handles
//! - [`util`] - small collection helpers and the [`weft_enum!`] adapter
//! - [`DefaultPlugins`] - the plugin bundle most hosts start from
//!
//! # Example
//!
//! ```
//! use weft_system::plugin::PluginGroup;
//! use weft_system::server::Server;
//! use weft_core_plugins::DefaultPlugins;
//! use weft_core_plugins::commands::{BufferedOutput, CommandRegistry};
//!
//! let mut server = Server::new();
//! server.add_plugins(DefaultPlugins.build());
//! server.finish();
//!
//! let mut out = BufferedOutput::default();
//! server
//!     .service::<CommandRegistry>()
//!     .execute("weft.help", &mut out)
//!     .unwrap();
//! assert!(out.lines().iter().any(|line| line.starts_with("weft.tests.run")));
//! ```

extern crate self as weft_core_plugins;

pub mod commands;
pub mod persistence;
pub mod resource_key;
pub mod util;

pub use commands::{CommandError, CommandRegistry, CommandsPlugin};
pub use persistence::{DataStore, DataStoreError, DataStores, PersistencePlugin, StoreHandle};
pub use resource_key::{ResourceKey, ResourceKeyError};

use weft_inject::InjectPlugin;
use weft_log::LogPlugin;
use weft_system::plugin::{PluginGroup, PluginGroupBuilder};

/// Default plugins for a weft host.
///
/// Includes:
/// - [`LogPlugin`] - log files and the `tracing` subscriber
/// - [`InjectPlugin`] - installs deferred injections once the host is ready
/// - [`PersistencePlugin`] - data store location
/// - [`CommandsPlugin`] - built-in console commands
///
/// Replace or drop members with the builder:
///
/// ```
/// use weft_system::plugin::PluginGroup;
/// use weft_core_plugins::{DefaultPlugins, PersistencePlugin};
///
/// let plugins = DefaultPlugins
///     .build()
///     .set(PersistencePlugin::default().with_root("/srv/host/data"));
/// assert_eq!(plugins.len(), 4);
/// ```
pub struct DefaultPlugins;

impl PluginGroup for DefaultPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(LogPlugin::default())
            .add(InjectPlugin::default())
            .add(PersistencePlugin::default())
            .add(CommandsPlugin)
    }
}

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::commands::{ArgKind, ArgSpec, CommandArgs, CommandOutput};
    pub use crate::util::{combinations, has_intersection};
    pub use crate::{
        CommandRegistry, CommandsPlugin, DataStore, DataStores, DefaultPlugins,
        PersistencePlugin, ResourceKey, StoreHandle, weft_enum,
    };
}
