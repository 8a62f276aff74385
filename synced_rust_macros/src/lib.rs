mod resource;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Resource)] derive macro
// ============================================================================

/// Derive macro for the `Resource` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Resource)]
/// #[resource(type_name = "messages")]
/// struct Message {
///     #[resource(key)]
///     pub channel: String,
///     #[resource(key)]
///     pub index: u64,
///     pub body: String,
/// }
/// ```
///
/// - `#[resource(type_name = "...")]` sets the resource type name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[resource(key)]` marks a field as part of the identity. Repeatable
///   for compound identities. If omitted, defaults to a field named `id`.
#[proc_macro_derive(Resource, attributes(resource))]
pub fn derive_resource(input: TokenStream) -> TokenStream {
    resource::derive_resource(input)
}
