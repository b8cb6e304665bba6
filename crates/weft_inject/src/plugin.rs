//! Injection plugin.
//!
//! # Lifecycle
//!
//! - **`build()`** subscribes to [`HostReady`] so deferred injections are
//!   installed once the host has published its classes.
//! - **`cleanup()`** removes the subscription.

use parking_lot::Mutex;
use weft_events::{EventBus, HandlerId, HostReady};
use weft_system::identity::ModIdentity;
use weft_system::plugin::Plugin;
use weft_system::server::Server;

use crate::injector::Injector;

/// Replays deferred injections when the host is ready.
///
/// | Service | Effect |
/// |---------|--------|
/// | [`Injector`] | pending injections installed on [`HostReady`] |
#[derive(Default)]
pub struct InjectPlugin {
    handler: Mutex<Option<HandlerId>>,
}

impl Plugin for InjectPlugin {
    fn build(&self, server: &mut Server) {
        let injector = server.service::<Injector>();
        let bus = server.service::<EventBus>();
        let registered = bus.register(
            &ModIdentity::framework(),
            "weft.install_pending_injections",
            move |_: &HostReady| {
                let installed = injector.install_pending();
                tracing::info!(installed, "deferred injections installed");
                Ok(())
            },
        );
        match registered {
            Ok(id) => *self.handler.lock() = Some(id),
            Err(error) => tracing::error!(%error, "InjectPlugin could not subscribe to HostReady"),
        }
    }

    fn cleanup(&self, server: &mut Server) {
        if let Some(id) = self.handler.lock().take() {
            server.service::<EventBus>().unregister(id);
        }
    }
}
