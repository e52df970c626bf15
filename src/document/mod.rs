//! Documents - typed, versioned records stored one database per type.
//!
//! ## Example
//!
//! ```ignore
//! use couch_rust::Document;
//!
//! #[derive(Clone, Serialize, Deserialize, Document)]
//! #[document(database = "rebels")]
//! struct Rebel {
//!     #[serde(rename = "_id", default)]
//!     pub id: String,
//!     #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
//!     pub rev: Option<String>,
//!     pub name: String,
//! }
//! ```

mod save;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::CouchError;

pub use save::{SaveOutcome, SaveResult};

/// Trait for types that can be stored as documents.
///
/// The id and revision accessors are the whole capability set the stores
/// need; everything else is payload.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The default database name for this document type.
    const DATABASE: &'static str;

    /// Returns the document id. Empty until assigned by caller or server.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Returns the last revision returned by the server, if any.
    fn rev(&self) -> Option<&str>;

    fn set_rev(&mut self, rev: Option<String>);
}

/// Serialize a document into the JSON body sent to the server.
///
/// `_id` and `_rev` always mirror the accessors: present when set, absent
/// otherwise, whatever the struct's own serde attributes produce.
pub(crate) fn to_wire<T: Document>(doc: &T) -> Result<Value, CouchError> {
    let mut value = serde_json::to_value(doc)?;
    let object = value.as_object_mut().ok_or_else(|| {
        CouchError::Serde(format!(
            "document of type {} must serialize to a JSON object",
            std::any::type_name::<T>()
        ))
    })?;

    if doc.id().is_empty() {
        object.remove("_id");
    } else {
        object.insert("_id".into(), Value::String(doc.id().to_string()));
    }

    match doc.rev() {
        Some(rev) if !rev.is_empty() => {
            object.insert("_rev".into(), Value::String(rev.to_string()));
        }
        _ => {
            object.remove("_rev");
        }
    }

    Ok(value)
}

pub(crate) fn from_wire<T: Document>(value: Value) -> Result<T, CouchError> {
    Ok(serde_json::from_value(value)?)
}
