//! QueryEngine - boundary to an external query translator.
//!
//! This crate does not compile predicates. A query engine receives a typed
//! database handle plus its own query description and returns the matching
//! documents; `CouchDatabase::query` only dispatches to it.

use async_trait::async_trait;

use crate::backend::CouchBackend;
use crate::database::CouchDatabase;
use crate::document::Document;
use crate::error::CouchError;

/// An external engine that evaluates queries over `T` documents.
#[async_trait]
pub trait QueryEngine<T: Document>: Send + Sync {
    /// Predicate, projection, sort and pagination description.
    type Query: Send + Sync;

    async fn execute<B: CouchBackend>(
        &self,
        database: &CouchDatabase<T, B>,
        query: &Self::Query,
    ) -> Result<Vec<T>, CouchError>;
}
