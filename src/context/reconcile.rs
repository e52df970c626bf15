//! Index reconciliation: converge declared index definitions with the
//! live index set of one database.

use crate::backend::CouchBackend;
use crate::database::DatabaseHandle;
use crate::error::{ContextError, CouchError};
use crate::index::{IndexDefinition, IndexDirection, IndexInfo};

/// What one reconciliation pass did, by index name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    /// Deleted and recreated because the fields differed.
    pub replaced: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    /// True when nothing was created or replaced.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.replaced.is_empty()
    }
}

/// Converge `declared` against the live indexes of `handle`.
///
/// The live set is fetched once and reused for every declaration.
/// Declarations are applied one at a time, in order. The first failure
/// stops the pass; whatever already ran is not undone.
pub(crate) async fn reconcile<B: CouchBackend>(
    handle: &DatabaseHandle<B>,
    declared: &[IndexDefinition],
    override_existing: bool,
) -> Result<ReconcileReport, ContextError> {
    let current = handle
        .indexes()
        .await
        .map_err(|source| ContextError::IndexListing {
            database: handle.name().to_string(),
            source,
        })?;

    let mut report = ReconcileReport::default();
    for definition in declared {
        apply(handle, &current, definition, override_existing, &mut report)
            .await
            .map_err(|source| ContextError::Reconciliation {
                database: handle.name().to_string(),
                index: definition.name.clone(),
                source,
            })?;
    }

    Ok(report)
}

async fn apply<B: CouchBackend>(
    handle: &DatabaseHandle<B>,
    current: &[IndexInfo],
    definition: &IndexDefinition,
    override_existing: bool,
    report: &mut ReconcileReport,
) -> Result<(), CouchError> {
    let existing = find_index(
        handle.name(),
        current,
        &definition.name,
        definition.design_document.as_deref(),
    )?;

    let Some(existing) = existing else {
        handle.create_index(definition).await?;
        report.created.push(definition.name.clone());
        return Ok(());
    };

    if !override_existing || fields_equal(&existing.fields, &definition.fields) {
        tracing::debug!(
            database = handle.name(),
            index = %definition.name,
            "index already present"
        );
        report.unchanged.push(definition.name.clone());
        return Ok(());
    }

    tracing::info!(
        database = handle.name(),
        index = %definition.name,
        "index fields differ, replacing"
    );
    handle.delete_index(existing).await?;
    handle.create_index(definition).await?;
    report.replaced.push(definition.name.clone());
    Ok(())
}

/// Find the live index a declaration refers to.
///
/// Only `json` indexes are candidates. Names must match exactly. The
/// design document only narrows the search when the declaration names
/// one; otherwise any design document matches.
pub(crate) fn find_index<'a>(
    database: &str,
    current: &'a [IndexInfo],
    name: &str,
    design_document: Option<&str>,
) -> Result<Option<&'a IndexInfo>, CouchError> {
    let mut matches = current.iter().filter(|index| {
        index.is_json()
            && index.name == name
            && design_document.map_or(true, |ddoc| index.in_design_document(ddoc))
    });

    let found = matches.next();
    if matches.next().is_some() {
        return Err(CouchError::AmbiguousIndex {
            database: database.to_string(),
            name: name.to_string(),
        });
    }
    Ok(found)
}

/// Positional comparison: same length, and the same field with the same
/// direction at every position.
pub(crate) fn fields_equal(
    current: &[(String, IndexDirection)],
    requested: &[(String, IndexDirection)],
) -> bool {
    current.len() == requested.len()
        && current
            .iter()
            .zip(requested)
            .all(|((cf, cd), (rf, rd))| cf == rf && cd == rd)
}
