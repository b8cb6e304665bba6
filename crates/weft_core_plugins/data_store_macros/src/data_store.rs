//! Derive macro for the `DataStore` trait.

use darling::FromDeriveInput;
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(data_store))]
struct DataStoreArgs {
    ident: syn::Ident,
    generics: syn::Generics,

    /// Store identifier.
    id: String,

    #[darling(default = "default_version")]
    version: u32,
}

fn default_version() -> u32 {
    1
}

pub(crate) fn derive_data_store(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match DataStoreArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    if args.id.trim().is_empty() {
        return syn::Error::new_spanned(&args.ident, "data store `id` must not be empty")
            .to_compile_error()
            .into();
    }

    let name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();
    let id = &args.id;
    let version = args.version;

    let pc_crate =
        weft_macro_utils::resolve_crate_path(weft_macro_utils::WeftCrate::CorePlugins);

    let expanded = quote! {
        impl #impl_generics #pc_crate::persistence::DataStore for #name #ty_generics #where_clause {
            fn identifier() -> &'static str {
                #id
            }

            fn version() -> u32 {
                #version
            }

            fn default_payload() -> Self {
                <Self as ::core::default::Default>::default()
            }
        }
    };

    expanded.into()
}
