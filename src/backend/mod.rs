//! CouchBackend - the wire boundary to the remote document store.
//!
//! One method per remote operation. Bodies cross the boundary as JSON
//! values; typed (de)serialization happens in `CouchDatabase`.
//!
//! Implementations:
//! - `HttpBackend` (feature `http`) talks to a CouchDB server with reqwest.
//! - `InMemoryBackend` keeps everything in a HashMap with the same
//!   revision and index semantics, for tests and development.

#[cfg(feature = "http")]
mod http;
mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::SaveResult;
use crate::error::CouchError;
use crate::index::{IndexDefinition, IndexInfo};

#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use in_memory::InMemoryBackend;

/// Remote operations the client layer needs.
///
/// Errors follow one mapping for every implementation: missing document
/// → `NotFound`, missing database → `DatabaseMissing`, revision or id
/// collision → `Conflict`, anything else → `Transport`.
#[async_trait]
pub trait CouchBackend: Send + Sync + 'static {
    /// `HEAD /{db}`
    async fn database_exists(&self, database: &str) -> Result<bool, CouchError>;

    /// `PUT /{db}`. Returns `false` if the database already existed.
    async fn create_database(&self, database: &str) -> Result<bool, CouchError>;

    /// `GET /{db}`
    async fn database_info(&self, database: &str) -> Result<DatabaseInfo, CouchError>;

    /// `POST /{db}/_compact`
    async fn compact(&self, database: &str) -> Result<(), CouchError>;

    /// `GET /{db}/doc/{id}`
    async fn get_document(&self, database: &str, id: &str) -> Result<Value, CouchError>;

    /// `POST /{db}`
    async fn post_document(&self, database: &str, body: Value) -> Result<SaveResult, CouchError>;

    /// `PUT /{db}/doc/{id}`
    async fn put_document(
        &self,
        database: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, CouchError>;

    /// `DELETE /{db}/doc/{id}?rev={rev}`
    async fn delete_document(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> Result<SaveResult, CouchError>;

    /// `POST /{db}/_bulk_docs`. One result per submitted body, in order.
    async fn bulk_docs(&self, database: &str, docs: Vec<Value>)
        -> Result<Vec<SaveResult>, CouchError>;

    /// `GET /{db}/_all_docs?include_docs=true`, design documents excluded.
    async fn all_documents(&self, database: &str) -> Result<Vec<Value>, CouchError>;

    /// `GET /{db}/_index`
    async fn get_indexes(&self, database: &str) -> Result<Vec<IndexInfo>, CouchError>;

    /// `POST /{db}/_index`
    async fn create_index(
        &self,
        database: &str,
        definition: &IndexDefinition,
    ) -> Result<(), CouchError>;

    /// `DELETE /{db}/_index/_design/{ddoc}/json/{name}`
    async fn delete_index(
        &self,
        database: &str,
        design_document: &str,
        name: &str,
    ) -> Result<(), CouchError>;
}

/// Database metadata from `GET /{db}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(default)]
    pub doc_del_count: u64,
    /// Opaque sequence token; a string on clustered servers.
    #[serde(default)]
    pub update_seq: Value,
    #[serde(default)]
    pub sizes: DatabaseSizes,
    #[serde(default)]
    pub compact_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSizes {
    #[serde(default)]
    pub active: u64,
    #[serde(default)]
    pub external: u64,
    #[serde(default)]
    pub file: u64,
}
