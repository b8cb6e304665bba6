//! Method injection for weft.
//!
//! - [`HostClass`] / [`ClassRegistry`] - the host's classes and their typed members
//! - [`Injector`] - wraps members with mod code, optionally catching its failures
//! - [`Original`] - the wrapped implementation handed to injected code
//! - [`InjectPlugin`] - installs deferred injections on host ready

mod class;
mod error;
mod injector;
mod plugin;

pub use class::{Callable, ClassRegistry, HostClass, InjectionRecord};
pub use error::{InjectionError, MemberError, MemberKind};
pub use injector::{InjectOptions, InjectionStatus, Injector, Original};
pub use plugin::InjectPlugin;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        ClassRegistry, HostClass, InjectOptions, InjectPlugin, InjectionStatus, Injector,
        MemberKind, Original,
    };
}
