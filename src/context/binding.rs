use std::any::{type_name, TypeId};

use crate::document::Document;
use crate::index::IndexDefinition;

/// One declared collection: a document type bound to a database name and
/// the indexes that should exist on it.
///
/// Created by `ContextBuilder` and never changed afterwards.
#[derive(Debug, Clone)]
pub struct CollectionBinding {
    database: String,
    document_type: &'static str,
    type_id: TypeId,
    indexes: Vec<IndexDefinition>,
}

impl CollectionBinding {
    pub(crate) fn new<T: Document>(database: String, indexes: Vec<IndexDefinition>) -> Self {
        Self {
            database,
            document_type: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            indexes,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Rust type name of the bound document type.
    pub fn document_type(&self) -> &'static str {
        self.document_type
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Declared indexes, in declaration order.
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }
}
