//! Mod loading.
//!
//! The [`Server`] stands in for the host's mod loader. It owns a
//! [`Services`] container and drives every added [`Plugin`] through
//! its lifecycle.
//!
//! ```ignore
//! Server::hosted()
//!     .add_plugins(DefaultPlugins.build())
//!     .add_plugins(MyMod)
//!     .finish();
//! ```
//!
//! # Lifecycle
//!
//! 1. **Ordering** - plugins are sorted so each comes after the plugins it
//!    depends on. Unrelated plugins keep the order they were added in, so
//!    registration order (and with it injection chain order) is stable.
//! 2. **Build** - `build()` runs for each plugin in that order; this is the
//!    mod's import time.
//! 3. **Ready** - `ready()` runs in the same order once everything is built.
//! 4. **Cleanup** - `cleanup()` runs last-built first, then services drop.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::plugin::{Plugin, PluginId, Plugins};
use crate::service::{Service, Services};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BuildState {
    #[default]
    NotStarted,
    Building,
    Ready,
    Finished,
}

/// Plugin orchestrator owning a service container.
pub struct Server {
    services: Services,
    pending_plugins: Vec<PluginEntry>,
    built_plugins: Vec<PluginEntry>,
    failed_plugins: Vec<String>,
    plugin_ids: HashSet<PluginId>,
    build_state: BuildState,
}

struct PluginEntry {
    id: PluginId,
    plugin: Box<dyn Plugin>,
    name: String,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Creates a server with its own private service container.
    #[must_use]
    pub fn new() -> Self {
        Self::with_services(Services::new())
    }

    /// Creates a server bound to the process-wide container, so
    /// [`Service::get`] and [`Server::service`] resolve the same instances.
    #[must_use]
    pub fn hosted() -> Self {
        Self::with_services(Services::global().clone())
    }

    /// Creates a server bound to the given container.
    #[must_use]
    pub fn with_services(services: Services) -> Self {
        Self {
            services,
            pending_plugins: Vec::new(),
            built_plugins: Vec::new(),
            failed_plugins: Vec::new(),
            plugin_ids: HashSet::new(),
            build_state: BuildState::NotStarted,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugin Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds plugins to the server.
    ///
    /// Plugins added from inside another plugin's `build()` are built
    /// immediately. A second instance of a unique plugin is reported and
    /// ignored.
    pub fn add_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_server(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();

        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            tracing::error!(
                plugin = %name,
                "unique plugin was already added; ignoring the second instance"
            );
            return;
        }
        self.plugin_ids.insert(id);

        let entry = PluginEntry { id, plugin, name };
        if self.build_state == BuildState::Building {
            self.build_entry(entry);
        } else {
            self.pending_plugins.push(entry);
        }
    }

    /// Returns true if a plugin of type `P` has been added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    /// Names of the built plugins in build order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.built_plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Names of plugins that were skipped: their `build()` panicked, a
    /// dependency was missing or skipped, or they sit in a dependency cycle.
    #[must_use]
    pub fn failed_plugins(&self) -> Vec<&str> {
        self.failed_plugins.iter().map(String::as_str).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Service Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the instance of service `S`, constructing it on first use.
    #[must_use]
    pub fn service<S: Service>(&self) -> Arc<S> {
        self.services.get::<S>()
    }

    /// Seeds service `S` with an explicit instance.
    ///
    /// Returns `false` (and keeps the existing instance) if `S` was
    /// already constructed.
    pub fn insert_service<S: Service>(&mut self, service: S) -> bool {
        self.services.insert(service).is_ok()
    }

    /// Returns true if service `S` has been constructed.
    #[must_use]
    pub fn contains_service<S: Service>(&self) -> bool {
        self.services.contains::<S>()
    }

    /// The server's service container.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Returns true once [`finish`](Self::finish) completed.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.build_state == BuildState::Finished
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Builds and readies every added plugin.
    ///
    /// One mod failing never stops the others: a plugin whose `build()`
    /// panics, whose dependency is missing or was skipped, or that sits in a
    /// dependency cycle is reported through `tracing` and left out. A panic
    /// in `ready()` is reported and the plugin stays built.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn finish(&mut self) {
        if self.build_state != BuildState::NotStarted {
            panic!("Server::finish() was already called; mods are only built once");
        }

        let sorted_plugins = self.sort_plugins_by_dependencies();

        self.build_state = BuildState::Building;
        for entry in sorted_plugins {
            self.build_entry(entry);
        }

        // Plugins added during ready() are queued, not built.
        self.build_state = BuildState::Ready;
        let plugins = core::mem::take(&mut self.built_plugins);
        for entry in &plugins {
            guarded(&entry.name, "ready", || entry.plugin.ready(self));
        }
        self.built_plugins = plugins;

        self.build_state = BuildState::Finished;
    }

    /// Calls `cleanup()` on every built plugin in reverse order, then
    /// releases the services. A panicking `cleanup()` is reported and the
    /// remaining plugins still clean up.
    pub fn cleanup(&mut self) {
        let plugins = core::mem::take(&mut self.built_plugins);
        for entry in plugins.iter().rev() {
            guarded(&entry.name, "cleanup", || entry.plugin.cleanup(self));
        }
        self.built_plugins = plugins;
        self.services.clear();
    }

    fn build_entry(&mut self, entry: PluginEntry) {
        for dependency in entry.plugin.dependencies() {
            if self.built_plugins.iter().any(|p| p.id == dependency) {
                continue;
            }
            let reason = if self.plugin_ids.contains(&dependency) {
                "dependency was skipped"
            } else {
                "dependency was never added"
            };
            tracing::error!(
                plugin = %entry.name,
                dependency = dependency.type_name(),
                reason,
                "skipping plugin"
            );
            self.failed_plugins.push(entry.name);
            return;
        }

        if guarded(&entry.name, "build", || entry.plugin.build(self)) {
            self.built_plugins.push(entry);
        } else {
            self.failed_plugins.push(entry.name);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal: Dependency Resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn sort_plugins_by_dependencies(&mut self) -> Vec<PluginEntry> {
        if self.pending_plugins.is_empty() {
            return Vec::new();
        }

        let mut position: HashMap<PluginId, usize> = HashMap::new();
        for (index, entry) in self.pending_plugins.iter().enumerate() {
            position.entry(entry.id).or_insert(index);
        }

        let count = self.pending_plugins.len();
        let mut waiting_on = vec![0usize; count];
        let mut unblocks: Vec<Vec<usize>> = vec![Vec::new(); count];

        // Missing dependencies are reported when the plugin is built.
        for (index, entry) in self.pending_plugins.iter().enumerate() {
            for dependency in entry.plugin.dependencies() {
                if let Some(&dependency_index) = position.get(&dependency) {
                    unblocks[dependency_index].push(index);
                    waiting_on[index] += 1;
                }
            }
        }

        // Kahn's algorithm, always taking the earliest-added ready plugin.
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| waiting_on[i] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &next in &unblocks[index] {
                waiting_on[next] -= 1;
                if waiting_on[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() != count {
            let stuck: Vec<String> = waiting_on
                .iter()
                .enumerate()
                .filter(|(_, waiting)| **waiting > 0)
                .map(|(index, _)| self.pending_plugins[index].name.clone())
                .collect();
            tracing::error!(
                plugins = ?stuck,
                "circular dependency between plugins; skipping them"
            );
            self.failed_plugins.extend(stuck);
        }

        let mut entries: Vec<Option<PluginEntry>> = core::mem::take(&mut self.pending_plugins)
            .into_iter()
            .map(Some)
            .collect();
        order
            .into_iter()
            .filter_map(|index| entries[index].take())
            .collect()
    }
}

/// Runs one lifecycle phase of a plugin, reporting a panic instead of
/// letting it unwind into the host. Returns false if the phase panicked.
fn guarded(plugin: &str, phase: &'static str, run: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&'static str>()
                .map(|text| (*text).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(plugin, phase, %message, "plugin panicked");
            false
        }
    }
}
