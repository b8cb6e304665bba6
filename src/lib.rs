//! A runtime-extension substrate for mods embedded in a host application.
//!

pub use weft_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use weft_internal::prelude::*;
}
