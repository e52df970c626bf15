mod document;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Document)]
// ============================================================================

/// Derive macro for the `Document` trait.
///
/// Implements `couch_rust::Document` for a struct with an id field and a
/// revision field.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Document)]
/// #[document(database = "rebels")]
/// struct Rebel {
///     #[serde(rename = "_id", default)]
///     pub id: String,
///     #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
///     pub rev: Option<String>,
///     pub name: String,
/// }
/// ```
///
/// Attributes:
/// - `#[document(database = "...")]` on the struct sets the database name.
///   Defaults to the snake_case struct name + "s".
/// - `#[document(id)]` marks the id field (a `String`). Defaults to a field
///   named `id`.
/// - `#[document(rev)]` marks the revision field (an `Option<String>`).
///   Defaults to a field named `rev`.
///
/// A struct without an id or revision field fails to compile.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    document::derive_document(input)
}
