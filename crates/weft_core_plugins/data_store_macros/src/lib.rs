//! Procedural macros for data stores in `weft_core_plugins`.

mod data_store;

use proc_macro::TokenStream;

/// Derive macro for the `DataStore` trait.
///
/// The default payload is the type's `Default` value.
///
/// # Attributes
///
/// - `id` (required): identifier of the store; also its file name.
/// - `version` (optional): schema version. Defaults to `1`.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
/// use weft_core_plugins::persistence::DataStore;
///
/// #[derive(Default, Serialize, Deserialize, DataStore)]
/// #[data_store(id = "household_budget", version = 2)]
/// struct HouseholdBudget {
///     simoleons: u64,
/// }
/// ```
#[proc_macro_derive(DataStore, attributes(data_store))]
pub fn derive_data_store(input: TokenStream) -> TokenStream {
    data_store::derive_data_store(input)
}
