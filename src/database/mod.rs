//! CouchDatabase - typed document CRUD against one remote database.
//!
//! ## Example
//!
//! ```ignore
//! let rebels: CouchDatabase<Rebel, _> = context.database::<Rebel>()?;
//!
//! let mut luke = Rebel::new("luke", "Luke");
//! rebels.create(&mut luke).await?;          // luke.rev is now Some("1-...")
//! luke.age = 19;
//! rebels.create_or_update(&mut luke).await?; // luke.rev is now Some("2-...")
//! rebels.delete(&mut luke).await?;
//! ```

mod handle;

use std::marker::PhantomData;

use crate::backend::{CouchBackend, DatabaseInfo};
use crate::document::{from_wire, to_wire, Document, SaveOutcome, SaveResult};
use crate::error::CouchError;
use crate::index::{IndexDefinition, IndexInfo};
use crate::query::QueryEngine;

pub use handle::DatabaseHandle;

/// Typed store for the `T` documents of one database.
///
/// Clone-friendly; clones share the backend. Safe to use from several
/// tasks at once, but a single document value must not be written by two
/// calls concurrently.
///
/// Every successful write updates the passed document's revision (and id,
/// for creates) in place. Nothing is changed locally unless the server
/// confirmed the write.
pub struct CouchDatabase<T, B> {
    handle: DatabaseHandle<B>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, B> Clone for CouchDatabase<T, B> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document, B: CouchBackend> CouchDatabase<T, B> {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &DatabaseHandle<B> {
        &self.handle
    }

    fn backend(&self) -> &B {
        self.handle.backend()
    }

    fn invalid(&self, message: impl Into<String>) -> CouchError {
        CouchError::InvalidDocument {
            database: self.name().to_string(),
            message: message.into(),
        }
    }

    fn saved(&self, doc: &mut T, result: SaveResult) -> Result<(), CouchError> {
        match result.outcome() {
            SaveOutcome::Ok => {
                result.apply_to(doc);
                Ok(())
            }
            SaveOutcome::Conflict => Err(CouchError::Conflict {
                database: self.name().to_string(),
                id: result.id,
                rev: doc.rev().map(str::to_string),
                reason: result.reason.unwrap_or_default(),
            }),
            SaveOutcome::Failed(error) => {
                let id = if result.id.is_empty() {
                    doc.id()
                } else {
                    result.id.as_str()
                };
                Err(CouchError::Transport {
                    database: self.name().to_string(),
                    status: None,
                    message: format!(
                        "write of `{}` (rev {}) failed: {}: {}",
                        id,
                        doc.rev().unwrap_or("none"),
                        error,
                        result.reason.as_deref().unwrap_or_default()
                    ),
                })
            }
        }
    }

    /// Get a document by id. Fails with `NotFound` if absent.
    pub async fn find(&self, id: &str) -> Result<T, CouchError> {
        let body = self.backend().get_document(self.name(), id).await?;
        from_wire(body)
    }

    /// Get a document by id. Returns `None` if absent.
    pub async fn get(&self, id: &str) -> Result<Option<T>, CouchError> {
        match self.find(id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(CouchError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create a new document.
    ///
    /// The document must not carry a revision. An empty id lets the server
    /// assign one. Fails with `Conflict` if the id is already taken.
    pub async fn create(&self, doc: &mut T) -> Result<(), CouchError> {
        if let Some(rev) = doc.rev() {
            return Err(self.invalid(format!(
                "cannot create document `{}` that already has revision {}",
                doc.id(),
                rev
            )));
        }
        let body = to_wire(&*doc)?;
        tracing::debug!(database = %self.name(), id = %doc.id(), "creating document");
        let result = self.backend().post_document(self.name(), body).await?;
        self.saved(doc, result)
    }

    /// Create the document if it has no revision, otherwise update it if its
    /// revision is still current.
    ///
    /// The id must be set; an empty id is rejected without a request.
    pub async fn create_or_update(&self, doc: &mut T) -> Result<(), CouchError> {
        if doc.id().is_empty() {
            return Err(self.invalid("cannot add or update a document without an id"));
        }
        let body = to_wire(&*doc)?;
        tracing::debug!(database = %self.name(), id = %doc.id(), rev = ?doc.rev(), "saving document");
        let result = self.backend().put_document(self.name(), doc.id(), body).await?;
        self.saved(doc, result)
    }

    /// Delete the document at its last known revision.
    ///
    /// On success the document's revision becomes the deletion revision.
    pub async fn delete(&self, doc: &mut T) -> Result<(), CouchError> {
        if doc.id().is_empty() {
            return Err(self.invalid("cannot delete a document without an id"));
        }
        let rev = doc
            .rev()
            .filter(|rev| !rev.is_empty())
            .map(str::to_string)
            .ok_or_else(|| self.invalid(format!("cannot delete document `{}` without a revision", doc.id())))?;
        tracing::debug!(database = %self.name(), id = %doc.id(), %rev, "deleting document");
        let result = self
            .backend()
            .delete_document(self.name(), doc.id(), &rev)
            .await?;
        self.saved(doc, result)
    }

    /// Write many documents in one request.
    ///
    /// Returns one result per document, in submission order. Documents
    /// whose result is a success get their id and revision updated; the
    /// others are left as they were. A failed item is not an error of the
    /// call. Results are matched to documents by position only.
    pub async fn create_or_update_range(&self, docs: &mut [T]) -> Result<Vec<SaveResult>, CouchError> {
        let bodies = docs.iter().map(to_wire).collect::<Result<Vec<_>, _>>()?;
        let results = self.backend().bulk_docs(self.name(), bodies).await?;

        if results.len() != docs.len() {
            tracing::warn!(
                database = %self.name(),
                submitted = docs.len(),
                returned = results.len(),
                "bulk response length differs from submission"
            );
        }

        for (doc, result) in docs.iter_mut().zip(&results) {
            if !result.apply_to(doc) {
                tracing::warn!(
                    database = %self.name(),
                    id = %result.id,
                    error = ?result.error,
                    reason = ?result.reason,
                    "bulk item not saved"
                );
            }
        }

        Ok(results)
    }

    /// All documents in the database, design documents excluded.
    pub async fn all(&self) -> Result<Vec<T>, CouchError> {
        self.backend()
            .all_documents(self.name())
            .await?
            .into_iter()
            .map(from_wire)
            .collect()
    }

    /// Run a query through an external query engine.
    pub async fn query<E: QueryEngine<T>>(
        &self,
        engine: &E,
        query: &E::Query,
    ) -> Result<Vec<T>, CouchError> {
        engine.execute(self, query).await
    }

    pub async fn compact(&self) -> Result<(), CouchError> {
        self.handle.compact().await
    }

    pub async fn info(&self) -> Result<DatabaseInfo, CouchError> {
        self.handle.info().await
    }

    pub async fn indexes(&self) -> Result<Vec<IndexInfo>, CouchError> {
        self.handle.indexes().await
    }

    pub async fn create_index(&self, definition: &IndexDefinition) -> Result<(), CouchError> {
        self.handle.create_index(definition).await
    }

    pub async fn delete_index(&self, index: &IndexInfo) -> Result<(), CouchError> {
        self.handle.delete_index(index).await
    }
}
