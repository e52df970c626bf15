//! Typed CouchDB client: declarative databases and indexes, revision-gated
//! CRUD, and bulk writes over Plain Old Rust Structs.
//!
//! ## Example
//!
//! ```ignore
//! use couch_rust::{ContextBuilder, CouchOptions, Document, HttpBackend};
//!
//! #[derive(Clone, Serialize, Deserialize, Document)]
//! #[document(database = "rebels")]
//! struct Rebel {
//!     #[serde(rename = "_id", default)]
//!     pub id: String,
//!     #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
//!     pub rev: Option<String>,
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! let options = CouchOptions::from_env().check_database_exists(true);
//! let backend = HttpBackend::new(&options)?;
//! let context = ContextBuilder::new(backend, options)
//!     .collection::<Rebel>(|rebels| rebels.has_index("by_age", |i| i.index_by("age")))
//!     .build()?
//!     .initialize()
//!     .await?;
//!
//! let rebels = context.database::<Rebel>()?;
//! let mut luke = Rebel { id: "luke".into(), rev: None, name: "Luke".into(), age: 19 };
//! rebels.create(&mut luke).await?;
//! ```
//!
//! A type without an id field cannot be registered:
//!
//! ```compile_fail
//! use couch_rust::Document;
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize, Document)]
//! struct Nameless {
//!     rev: Option<String>,
//!     name: String,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couch_rust;

mod backend;
mod context;
mod database;
mod document;
mod error;
mod index;
mod options;
mod query;

pub use backend::{CouchBackend, DatabaseInfo, DatabaseSizes, InMemoryBackend};
#[cfg(feature = "http")]
pub use backend::HttpBackend;
pub use context::{
    CollectionBinding, CollectionBuilder, ContextBuilder, CouchContext, PendingContext,
    ReconcileReport,
};
pub use database::{CouchDatabase, DatabaseHandle};
pub use document::{Document, SaveOutcome, SaveResult};
pub use error::{ContextError, CouchError};
pub use index::{IndexBuilder, IndexDefinition, IndexDirection, IndexInfo, IndexOptions};
pub use options::CouchOptions;
pub use query::QueryEngine;

// Re-export the derive macro
pub use couch_rust_macros::Document;
