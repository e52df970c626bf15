use thiserror::Error;

/// Error type for a single backend or document operation.
#[derive(Debug, Error)]
pub enum CouchError {
    /// Point lookup miss.
    #[error("document not found: {database}/{id}")]
    NotFound { database: String, id: String },

    /// The database itself does not exist on the server.
    #[error("database not found: {0}")]
    DatabaseMissing(String),

    /// Revision mismatch on update/delete, or id collision on create.
    #[error("conflict on {database}/{id} (rev {}): {reason}", .rev.as_deref().unwrap_or("none"))]
    Conflict {
        database: String,
        id: String,
        rev: Option<String>,
        reason: String,
    },

    /// Local precondition failed before any request was sent.
    #[error("invalid document for {database}: {message}")]
    InvalidDocument { database: String, message: String },

    /// More than one live index matched a declared definition.
    #[error("index `{name}` on {database} matches more than one design document")]
    AmbiguousIndex { database: String, name: String },

    /// Type or database was not declared on the context.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or server-level failure.
    #[error("transport error on {database}{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        database: String,
        status: Option<u16>,
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for CouchError {
    fn from(err: serde_json::Error) -> Self {
        CouchError::Serde(err.to_string())
    }
}

impl CouchError {
    pub(crate) fn transport(database: &str, message: impl Into<String>) -> Self {
        CouchError::Transport {
            database: database.to_string(),
            status: None,
            message: message.into(),
        }
    }

    /// Whether this error is a revision/id conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CouchError::Conflict { .. })
    }

    /// Whether this error is a missing document or database.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CouchError::NotFound { .. } | CouchError::DatabaseMissing(_)
        )
    }
}

/// Error raised while building or initializing a context.
///
/// Any of these leaves no usable context behind.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Malformed declared schema. Raised by `build()` before any request.
    #[error("invalid declaration for collection `{collection}`: {message}")]
    Configuration { collection: String, message: String },

    /// Database existence check or creation failed.
    #[error("failed to provision database `{database}`: {source}")]
    Provisioning {
        database: String,
        #[source]
        source: CouchError,
    },

    /// The live index set could not be listed.
    #[error("failed to list indexes of `{database}`: {source}")]
    IndexListing {
        database: String,
        #[source]
        source: CouchError,
    },

    /// An index could not be created or replaced.
    #[error("failed to reconcile index `{index}` on `{database}`: {source}")]
    Reconciliation {
        database: String,
        index: String,
        #[source]
        source: CouchError,
    },
}
