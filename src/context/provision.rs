//! Database provisioning: bind, or create-if-missing.

use std::sync::Arc;

use crate::backend::CouchBackend;
use crate::database::DatabaseHandle;
use crate::error::CouchError;

use super::CollectionBinding;

/// Materialize the database behind a binding.
///
/// Without `check_exists` the handle is bound by name and no request is
/// made. With it, a missing database is created; a database that appears
/// between the check and the create counts as success.
pub(crate) async fn ensure<B: CouchBackend>(
    backend: &Arc<B>,
    binding: &CollectionBinding,
    check_exists: bool,
) -> Result<DatabaseHandle<B>, CouchError> {
    let database = binding.database();
    let handle = DatabaseHandle::new(Arc::clone(backend), database);

    if !check_exists {
        tracing::debug!(database, "binding database without existence check");
        return Ok(handle);
    }

    if backend.database_exists(database).await? {
        tracing::debug!(database, "database exists");
        return Ok(handle);
    }

    if backend.create_database(database).await? {
        tracing::info!(database, document_type = binding.document_type(), "created database");
    } else {
        tracing::debug!(database, "database created concurrently");
    }

    Ok(handle)
}
