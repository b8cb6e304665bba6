//! Shared utilities for weft procedural macro crates.
//!
//! Generated code must name weft items by a path that resolves in the
//! consuming mod, whether it depends on an individual crate, renamed it, or
//! only depends on the `weft` umbrella crate.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// A weft crate that macro-generated code may reference.
pub enum WeftCrate {
    /// `weft_core_plugins`
    CorePlugins,
}

impl WeftCrate {
    fn as_str(&self) -> &'static str {
        match self {
            Self::CorePlugins => "weft_core_plugins",
        }
    }
}

/// Returns a path to `krate` usable from the crate being expanded.
///
/// Tries, in order: a direct (possibly renamed) dependency, the crate
/// itself, `weft::<name>` through the umbrella crate, and finally the bare
/// name so the compiler reports the missing dependency.
pub fn resolve_crate_path(krate: WeftCrate) -> TokenStream {
    let name = krate.as_str();

    match crate_name(name) {
        // The crate aliases itself with `extern crate self`.
        Ok(FoundCrate::Itself) => {
            let ident = format_ident!("{}", name);
            quote!(#ident)
        }
        Ok(FoundCrate::Name(found)) => {
            let ident = format_ident!("{}", found);
            quote!(#ident)
        }
        Err(_) => match crate_name("weft") {
            Ok(FoundCrate::Name(found)) => {
                let weft = format_ident!("{}", found);
                let ident = format_ident!("{}", name);
                quote!(#weft::#ident)
            }
            _ => {
                let ident = format_ident!("{}", name);
                quote!(#ident)
            }
        },
    }
}
