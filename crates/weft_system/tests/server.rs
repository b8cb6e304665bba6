//! Tests for the weft server, plugin lifecycle and service access.

use std::sync::Arc;

use parking_lot::Mutex;
use weft_system::plugin::{Plugin, PluginGroup, PluginGroupBuilder};
use weft_system::prelude::*;

// ─────────────────────────────────────────────────────────────────────────
// Test Services
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Trace(Mutex<Vec<String>>);

impl Service for Trace {
    fn create(_: &Services) -> Self {
        Self::default()
    }
}

impl Trace {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

fn mod_identity(name: &str) -> ModIdentity {
    ModIdentity::builder(name)
        .author("tests")
        .namespace(name.to_lowercase())
        .file_path(format!("Mods/{name}"))
        .version("1.0")
        .build()
        .expect("complete identity")
}

// ─────────────────────────────────────────────────────────────────────────
// Test Plugins
// ─────────────────────────────────────────────────────────────────────────

struct CoreMod;
impl Plugin for CoreMod {
    fn build(&self, server: &mut Server) {
        server.service::<Trace>().push("core:build");
        server
            .service::<ModRegistry>()
            .register(mod_identity("Core"))
            .expect("unique mod");
    }

    fn ready(&self, server: &mut Server) {
        server.service::<Trace>().push("core:ready");
    }

    fn cleanup(&self, server: &mut Server) {
        server.service::<Trace>().push("core:cleanup");
    }
}

struct AddonMod;
impl Plugin for AddonMod {
    fn build(&self, server: &mut Server) {
        let core_loaded = server.service::<ModRegistry>().get("Core").is_some();
        server
            .service::<Trace>()
            .push(format!("addon:build core_loaded={core_loaded}"));
    }

    fn ready(&self, server: &mut Server) {
        server.service::<Trace>().push("addon:ready");
    }

    fn cleanup(&self, server: &mut Server) {
        server.service::<Trace>().push("addon:cleanup");
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<CoreMod>()]
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn plugins_build_in_dependency_order() {
    let mut server = Server::new();
    // Added in reverse on purpose.
    server.add_plugins(AddonMod).add_plugins(CoreMod);
    server.finish();

    let trace = server.service::<Trace>().entries();
    assert_eq!(
        trace,
        [
            "core:build",
            "addon:build core_loaded=true",
            "core:ready",
            "addon:ready"
        ]
    );
    assert!(server.is_built());
}

#[test]
fn cleanup_in_reverse_order() {
    let mut server = Server::new();
    server.add_plugins(CoreMod).add_plugins(AddonMod);
    server.finish();
    let trace = server.service::<Trace>();
    server.cleanup();

    let entries = trace.entries();
    assert_eq!(&entries[entries.len() - 2..], ["addon:cleanup", "core:cleanup"]);
}

#[test]
fn has_plugin_returns_true_for_added() {
    let mut server = Server::new();
    server.add_plugins(CoreMod);
    assert!(server.has_plugin::<CoreMod>());
    assert!(!server.has_plugin::<AddonMod>());
}

#[test]
fn duplicate_unique_plugin_is_ignored() {
    let mut server = Server::new();
    server.add_plugins(CoreMod).add_plugins(CoreMod);
    server.finish();

    assert_eq!(server.plugin_names().len(), 1);
    assert_eq!(server.service::<ModRegistry>().len(), 1);
}

#[test]
fn missing_dependency_skips_plugin() {
    let mut server = Server::new();
    server.add_plugins(AddonMod);
    server.finish();

    assert!(server.plugin_names().is_empty());
    assert_eq!(server.failed_plugins().len(), 1);
    assert!(server.failed_plugins()[0].ends_with("AddonMod"));
    assert!(server.service::<Trace>().entries().is_empty());
}

#[test]
fn circular_dependency_skips_cycle_members() {
    struct Left;
    impl Plugin for Left {
        fn build(&self, _server: &mut Server) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Right>()]
        }
    }

    struct Right;
    impl Plugin for Right {
        fn build(&self, _server: &mut Server) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Left>()]
        }
    }

    let mut server = Server::new();
    server.add_plugins(Left).add_plugins(Right).add_plugins(CoreMod);
    server.finish();

    assert_eq!(server.plugin_names().len(), 1);
    assert!(server.plugin_names()[0].ends_with("CoreMod"));
    assert_eq!(server.failed_plugins().len(), 2);
}

struct BadMod;
impl Plugin for BadMod {
    fn build(&self, server: &mut Server) {
        server.service::<Trace>().push("bad:build");
        panic!("bad mod blew up during build");
    }
}

struct GoodMod;
impl Plugin for GoodMod {
    fn build(&self, server: &mut Server) {
        server.service::<Trace>().push("good:build");
    }

    fn ready(&self, server: &mut Server) {
        server.service::<Trace>().push("good:ready");
    }
}

#[test]
fn panicking_build_does_not_stop_later_plugins() {
    let mut server = Server::new();
    server.add_plugins(BadMod).add_plugins(GoodMod);
    server.finish();

    assert_eq!(
        server.service::<Trace>().entries(),
        ["bad:build", "good:build", "good:ready"]
    );
    assert_eq!(server.plugin_names().len(), 1);
    assert!(server.plugin_names()[0].ends_with("GoodMod"));
    assert_eq!(server.failed_plugins().len(), 1);
    assert!(server.failed_plugins()[0].ends_with("BadMod"));
}

#[test]
fn dependents_of_a_failed_plugin_are_skipped() {
    struct NeedsBad;
    impl Plugin for NeedsBad {
        fn build(&self, server: &mut Server) {
            server.service::<Trace>().push("needs_bad:build");
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<BadMod>()]
        }
    }

    let mut server = Server::new();
    server.add_plugins(NeedsBad).add_plugins(BadMod).add_plugins(GoodMod);
    server.finish();

    let entries = server.service::<Trace>().entries();
    assert!(!entries.iter().any(|entry| entry == "needs_bad:build"));
    assert!(entries.iter().any(|entry| entry == "good:build"));
    assert_eq!(server.failed_plugins().len(), 2);
}

#[test]
fn panicking_ready_and_cleanup_are_contained() {
    struct Flaky;
    impl Plugin for Flaky {
        fn build(&self, _server: &mut Server) {}
        fn ready(&self, _server: &mut Server) {
            panic!("ready failed");
        }
        fn cleanup(&self, _server: &mut Server) {
            panic!("cleanup failed");
        }
    }

    let mut server = Server::new();
    server.add_plugins(GoodMod).add_plugins(Flaky).add_plugins(CoreMod);
    server.finish();
    server.cleanup();

    assert_eq!(server.plugin_names().len(), 3);
    assert!(server.failed_plugins().is_empty());
}

#[test]
#[should_panic(expected = "already called")]
fn double_finish_panics() {
    let mut server = Server::new();
    server.finish();
    server.finish();
}

#[test]
fn sub_plugin_added_during_build() {
    struct Loader;
    impl Plugin for Loader {
        fn build(&self, server: &mut Server) {
            server.add_plugins(CoreMod);
        }
    }

    let mut server = Server::new();
    server.add_plugins(Loader);
    server.finish();

    assert!(server.has_plugin::<CoreMod>());
    assert_eq!(server.service::<ModRegistry>().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────
// Groups
// ─────────────────────────────────────────────────────────────────────────

struct BothMods;

impl PluginGroup for BothMods {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new().add(CoreMod).add(AddonMod)
    }
}

#[test]
fn plugin_group_adds_all_plugins() {
    let mut server = Server::new();
    server.add_plugins(BothMods.build());
    server.finish();

    assert!(server.has_plugin::<CoreMod>());
    assert!(server.has_plugin::<AddonMod>());
}

#[test]
fn disabled_group_member_is_skipped() {
    let mut server = Server::new();
    server.add_plugins(BothMods.build().disable::<AddonMod>());
    server.finish();

    assert!(!server.has_plugin::<AddonMod>());
}

// ─────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn insert_service_seeds_before_first_use() {
    let mut server = Server::new();
    let seeded = Trace::default();
    seeded.push("seeded");
    assert!(server.insert_service(seeded));
    assert!(!server.insert_service(Trace::default()));
    assert_eq!(server.service::<Trace>().entries(), ["seeded"]);
}

#[test]
fn hosted_server_shares_the_global_container() {
    #[derive(Default)]
    struct HostOnly;
    impl Service for HostOnly {
        fn create(_: &Services) -> Self {
            Self
        }
    }

    let server = Server::hosted();
    assert!(Arc::ptr_eq(&server.service::<HostOnly>(), &HostOnly::get()));
}
