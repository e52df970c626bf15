//! CouchContext - declared collections, provisioned and reconciled.
//!
//! Two phases:
//!
//! 1. `ContextBuilder::build()` validates the declarations and returns a
//!    `PendingContext`. No request is made.
//! 2. `PendingContext::initialize().await` provisions every database and
//!    reconciles its indexes, one collection after another in declaration
//!    order, and returns the ready `CouchContext`.
//!
//! Any failure in either phase means there is no context.

mod binding;
mod builder;
mod provision;
mod reconcile;

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::CouchBackend;
use crate::database::{CouchDatabase, DatabaseHandle};
use crate::document::Document;
use crate::error::{ContextError, CouchError};
use crate::options::CouchOptions;

pub use binding::CollectionBinding;
pub use builder::{CollectionBuilder, ContextBuilder};
pub use reconcile::ReconcileReport;

/// A validated context that has not touched the server yet.
pub struct PendingContext<B> {
    backend: Arc<B>,
    options: CouchOptions,
    bindings: Vec<CollectionBinding>,
}

impl<B: CouchBackend> PendingContext<B> {
    fn new(backend: Arc<B>, options: CouchOptions, bindings: Vec<CollectionBinding>) -> Self {
        Self {
            backend,
            options,
            bindings,
        }
    }

    /// Declared collections, in declaration order.
    pub fn bindings(&self) -> &[CollectionBinding] {
        &self.bindings
    }

    /// Provision databases and reconcile indexes for every binding.
    pub async fn initialize(self) -> Result<CouchContext<B>, ContextError> {
        let mut handles = HashMap::with_capacity(self.bindings.len());
        let mut reports = HashMap::new();

        for binding in &self.bindings {
            let handle =
                provision::ensure(&self.backend, binding, self.options.check_database_exists)
                    .await
                    .map_err(|source| ContextError::Provisioning {
                        database: binding.database().to_string(),
                        source,
                    })?;

            if !binding.indexes().is_empty() {
                let report = reconcile::reconcile(
                    &handle,
                    binding.indexes(),
                    self.options.override_existing_indexes,
                )
                .await?;
                tracing::debug!(
                    database = binding.database(),
                    created = report.created.len(),
                    replaced = report.replaced.len(),
                    unchanged = report.unchanged.len(),
                    "indexes reconciled"
                );
                reports.insert(binding.database().to_string(), report);
            }

            handles.insert(binding.type_id(), handle);
        }

        tracing::info!(collections = self.bindings.len(), "context initialized");

        Ok(CouchContext {
            backend: self.backend,
            options: self.options,
            bindings: self.bindings,
            handles,
            reports,
        })
    }
}

/// A ready context: every declared database exists (or was trusted to)
/// and its indexes have been reconciled.
pub struct CouchContext<B> {
    backend: Arc<B>,
    options: CouchOptions,
    bindings: Vec<CollectionBinding>,
    handles: HashMap<TypeId, DatabaseHandle<B>>,
    reports: HashMap<String, ReconcileReport>,
}

impl<B: CouchBackend> CouchContext<B> {
    /// Typed store for a registered document type.
    pub fn database<T: Document>(&self) -> Result<CouchDatabase<T, B>, CouchError> {
        self.handles
            .get(&TypeId::of::<T>())
            .map(|handle| handle.typed::<T>())
            .ok_or_else(|| {
                CouchError::Configuration(format!(
                    "document type {} is not registered on this context",
                    type_name::<T>()
                ))
            })
    }

    pub fn bindings(&self) -> &[CollectionBinding] {
        &self.bindings
    }

    /// What index reconciliation did for a database during `initialize()`.
    /// `None` if the collection declared no indexes.
    pub fn reconcile_report(&self, database: &str) -> Option<&ReconcileReport> {
        self.reports.get(database)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn options(&self) -> &CouchOptions {
        &self.options
    }
}
