mod view;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(View)] derive macro
// ============================================================================

/// Derive macro for the `View` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(View)]
/// #[view(table = "order_views")]
/// struct OrderView {
///     #[view(document)]
///     doc: Document<OrderPayload>,
///     #[view(index)]
///     customer_id: String,
///     #[view(index = "state")]
///     status: OrderStatus,
///     cached_total: Option<u64>,
/// }
/// ```
///
/// - `#[view(table = "...")]` sets the table name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[view(document)]` marks the `Document<Payload>` field.
///   If omitted, defaults to a field named `document`.
/// - `#[view(index)]` stores the field as an index column named after the
///   field; `#[view(index = "column")]` picks the column name. Index values
///   go through serde, so the field type must implement `Serialize`,
///   `DeserializeOwned` and `Default`.
/// - Every other field is rebuilt with `Default::default()` when a view is
///   read back from storage.
#[proc_macro_derive(View, attributes(view))]
pub fn derive_view(input: TokenStream) -> TokenStream {
    view::derive_view(input)
}
