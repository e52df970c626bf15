//! ContextBuilder - explicit, typed registration of collections.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::CouchBackend;
use crate::document::Document;
use crate::error::ContextError;
use crate::index::{design_name, IndexBuilder, IndexDefinition, IndexOptions};
use crate::options::CouchOptions;

use super::{CollectionBinding, PendingContext};

/// Index declarations for one document type.
pub struct CollectionBuilder<T> {
    indexes: Vec<IndexDefinition>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> CollectionBuilder<T> {
    fn new() -> Self {
        Self {
            indexes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declare an index; the server picks its design document.
    ///
    /// ```ignore
    /// rebels.has_index("by_surname", |i| i.index_by("surname").then_by("name"))
    /// ```
    pub fn has_index(
        self,
        name: &str,
        build: impl FnOnce(IndexBuilder) -> IndexBuilder,
    ) -> Self {
        self.index(IndexDefinition::new(name, build))
    }

    /// Declare an index with a design document or partitioning.
    pub fn has_index_with_options(
        self,
        name: &str,
        build: impl FnOnce(IndexBuilder) -> IndexBuilder,
        options: IndexOptions,
    ) -> Self {
        self.index(IndexDefinition::with_options(name, build, options))
    }

    /// Declare a prebuilt index definition.
    pub fn index(mut self, definition: IndexDefinition) -> Self {
        self.indexes.push(definition);
        self
    }
}

/// Builder for a `CouchContext`.
///
/// Register each document type with `collection` (or `collection_named`),
/// then call `build()` to validate the declarations. Registration order is
/// the order databases are provisioned in.
///
/// ```ignore
/// let pending = ContextBuilder::new(InMemoryBackend::new(), options)
///     .collection::<Rebel>(|c| c.has_index("by_age", |i| i.index_by("age")))
///     .collection::<Vehicle>(|c| c)
///     .build()?;
/// let context = pending.initialize().await?;
/// ```
pub struct ContextBuilder<B> {
    backend: Arc<B>,
    options: CouchOptions,
    bindings: Vec<CollectionBinding>,
}

impl<B: CouchBackend> ContextBuilder<B> {
    pub fn new(backend: B, options: CouchOptions) -> Self {
        Self::with_shared_backend(Arc::new(backend), options)
    }

    pub fn with_shared_backend(backend: Arc<B>, options: CouchOptions) -> Self {
        Self {
            backend,
            options,
            bindings: Vec::new(),
        }
    }

    /// Register `T` under its `Document::DATABASE` name.
    pub fn collection<T: Document>(
        self,
        configure: impl FnOnce(CollectionBuilder<T>) -> CollectionBuilder<T>,
    ) -> Self {
        self.collection_named::<T>(T::DATABASE, configure)
    }

    /// Register `T` under an explicit database name.
    pub fn collection_named<T: Document>(
        mut self,
        database: &str,
        configure: impl FnOnce(CollectionBuilder<T>) -> CollectionBuilder<T>,
    ) -> Self {
        let collection = configure(CollectionBuilder::new());
        self.bindings
            .push(CollectionBinding::new::<T>(database.to_string(), collection.indexes));
        self
    }

    /// Validate the declarations. Makes no request.
    pub fn build(self) -> Result<PendingContext<B>, ContextError> {
        let mut types = HashSet::new();
        let mut databases = HashSet::new();

        for binding in &self.bindings {
            let fail = |message: String| ContextError::Configuration {
                collection: binding.database().to_string(),
                message,
            };

            validate_database_name(binding.database()).map_err(fail)?;

            if !types.insert(binding.type_id()) {
                return Err(fail(format!(
                    "document type {} is registered more than once",
                    binding.document_type()
                )));
            }
            if !databases.insert(binding.database().to_string()) {
                return Err(fail("database is registered more than once".to_string()));
            }

            validate_indexes(binding.indexes()).map_err(fail)?;
        }

        tracing::debug!(collections = self.bindings.len(), "context declarations validated");

        Ok(PendingContext::new(self.backend, self.options, self.bindings))
    }
}

/// CouchDB database names: a lowercase letter followed by lowercase
/// letters, digits, or any of `_$()+-/`.
pub(crate) fn validate_database_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("database name is empty".to_string()),
        Some(first) if !first.is_ascii_lowercase() => {
            return Err(format!(
                "database name `{name}` must start with a lowercase letter"
            ))
        }
        _ => {}
    }
    if let Some(bad) = chars.find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(*c))
    }) {
        return Err(format!(
            "database name `{name}` contains invalid character `{bad}`"
        ));
    }
    if name.len() > 238 {
        return Err(format!("database name `{name}` is longer than 238 characters"));
    }
    Ok(())
}

fn validate_indexes(indexes: &[IndexDefinition]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for index in indexes {
        if index.name.is_empty() {
            return Err("index name is empty".to_string());
        }
        if index.fields.is_empty() {
            return Err(format!("index `{}` declares no fields", index.name));
        }
        let key = (
            index.name.as_str(),
            index.design_document.as_deref().map(design_name),
        );
        if !seen.insert(key) {
            return Err(format!("index `{}` is declared more than once", index.name));
        }
    }

    // Without a design document a declaration matches the name in any
    // design document, so it would claim its siblings' indexes.
    for index in indexes.iter().filter(|i| i.design_document.is_none()) {
        let shared = indexes.iter().filter(|other| other.name == index.name).count();
        if shared > 1 {
            return Err(format!(
                "index `{}` is declared without a design document alongside another \
                 declaration of the same name",
                index.name
            ));
        }
    }
    Ok(())
}
