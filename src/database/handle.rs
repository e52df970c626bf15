//! DatabaseHandle - untyped handle to one remote database.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::{CouchBackend, DatabaseInfo};
use crate::document::Document;
use crate::error::CouchError;
use crate::index::{IndexDefinition, IndexInfo};

use super::CouchDatabase;

/// A database name bound to a backend.
///
/// Carries everything that does not depend on the document type:
/// maintenance and index operations. `typed()` turns it into a
/// `CouchDatabase<T, B>` for document CRUD.
pub struct DatabaseHandle<B> {
    backend: Arc<B>,
    name: String,
}

impl<B> Clone for DatabaseHandle<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            name: self.name.clone(),
        }
    }
}

impl<B> std::fmt::Debug for DatabaseHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle").field("name", &self.name).finish()
    }
}

impl<B: CouchBackend> DatabaseHandle<B> {
    /// Bind a database name without contacting the server.
    pub fn new(backend: Arc<B>, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// View this database as a store of `T` documents.
    pub fn typed<T: Document>(&self) -> CouchDatabase<T, B> {
        CouchDatabase {
            handle: self.clone(),
            _marker: PhantomData,
        }
    }

    pub async fn info(&self) -> Result<DatabaseInfo, CouchError> {
        self.backend.database_info(&self.name).await
    }

    pub async fn compact(&self) -> Result<(), CouchError> {
        self.backend.compact(&self.name).await
    }

    /// List the live indexes, including the built-in `_all_docs` one.
    pub async fn indexes(&self) -> Result<Vec<IndexInfo>, CouchError> {
        self.backend.get_indexes(&self.name).await
    }

    pub async fn create_index(&self, definition: &IndexDefinition) -> Result<(), CouchError> {
        tracing::info!(
            database = %self.name,
            index = %definition.name,
            design_document = ?definition.design_document,
            "creating index"
        );
        self.backend.create_index(&self.name, definition).await
    }

    /// Delete a live index by its design document and name.
    pub async fn delete_index(&self, index: &IndexInfo) -> Result<(), CouchError> {
        let design_document = index.design_document.as_deref().ok_or_else(|| {
            CouchError::Configuration(format!(
                "index `{}` on {} has no design document and cannot be deleted",
                index.name, self.name
            ))
        })?;
        tracing::info!(
            database = %self.name,
            index = %index.name,
            design_document,
            "deleting index"
        );
        self.backend
            .delete_index(&self.name, design_document, &index.name)
            .await
    }
}
