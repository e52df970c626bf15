//! InMemoryBackend - HashMap-backed document store for testing and development.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{CouchBackend, DatabaseInfo, DatabaseSizes};
use crate::document::SaveResult;
use crate::error::CouchError;
use crate::index::{design_id, IndexDefinition, IndexInfo};

const CONFLICT_REASON: &str = "Document update conflict.";

/// Internal stored representation of a document revision.
struct StoredDocument {
    rev: String,
    generation: u64,
    /// Body without `_id`/`_rev`. Empty for tombstones.
    body: Map<String, Value>,
    deleted: bool,
}

#[derive(Default)]
struct StoredDatabase {
    docs: BTreeMap<String, StoredDocument>,
    indexes: Vec<IndexInfo>,
    update_seq: u64,
}

/// In-memory backend with CouchDB write semantics.
///
/// Every write assigns a new `{generation}-{hex}` revision; writes to a
/// live document must carry its current revision. Indexes created without
/// a design document land in one derived from their field list, so
/// redefining an index under the same name yields a second index, as on a
/// real server.
///
/// Each call is recorded as `"METHOD /path"` in a request log.
/// Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    databases: Arc<RwLock<HashMap<String, StoredDatabase>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl InMemoryBackend {
    /// Create a new backend with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    fn record(&self, request: String) {
        tracing::trace!(%request, "in-memory request");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn read<R>(
        &self,
        database: &str,
        f: impl FnOnce(&StoredDatabase) -> Result<R, CouchError>,
    ) -> Result<R, CouchError> {
        let databases = self
            .databases
            .read()
            .map_err(|_| CouchError::transport(database, "in-memory backend lock poisoned"))?;
        let db = databases
            .get(database)
            .ok_or_else(|| CouchError::DatabaseMissing(database.to_string()))?;
        f(db)
    }

    fn write<R>(
        &self,
        database: &str,
        f: impl FnOnce(&mut StoredDatabase) -> Result<R, CouchError>,
    ) -> Result<R, CouchError> {
        let mut databases = self
            .databases
            .write()
            .map_err(|_| CouchError::transport(database, "in-memory backend lock poisoned"))?;
        let db = databases
            .get_mut(database)
            .ok_or_else(|| CouchError::DatabaseMissing(database.to_string()))?;
        f(db)
    }
}

fn body_id(body: &Value) -> Option<String> {
    body.get("_id").and_then(Value::as_str).map(str::to_string)
}

/// Apply one document write with revision gating.
fn save(
    db: &mut StoredDatabase,
    database: &str,
    path_id: Option<&str>,
    body: Value,
) -> Result<SaveResult, CouchError> {
    let Value::Object(mut body) = body else {
        return Err(CouchError::Transport {
            database: database.to_string(),
            status: Some(400),
            message: "Document must be a JSON object".to_string(),
        });
    };

    let body_id = body.remove("_id").and_then(|v| v.as_str().map(str::to_string));
    let id = path_id
        .map(str::to_string)
        .or(body_id)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let rev = body.remove("_rev").and_then(|v| v.as_str().map(str::to_string));
    let deleted = matches!(body.remove("_deleted"), Some(Value::Bool(true)));

    let current = db.docs.get(&id);
    let live = current.filter(|doc| !doc.deleted);

    let conflict = |rev: Option<String>| CouchError::Conflict {
        database: database.to_string(),
        id: id.clone(),
        rev,
        reason: CONFLICT_REASON.to_string(),
    };

    match (live, current) {
        (Some(doc), _) if rev.as_deref() != Some(doc.rev.as_str()) => return Err(conflict(rev)),
        (None, Some(tombstone)) if rev.is_some() && rev.as_deref() != Some(tombstone.rev.as_str()) => {
            return Err(conflict(rev))
        }
        (None, None) if rev.is_some() => return Err(conflict(rev)),
        _ => {}
    }

    if deleted && live.is_none() {
        return Err(CouchError::NotFound {
            database: database.to_string(),
            id,
        });
    }

    let generation = current.map(|doc| doc.generation).unwrap_or(0) + 1;
    let new_rev = format!("{}-{}", generation, Uuid::new_v4().simple());

    db.docs.insert(
        id.clone(),
        StoredDocument {
            rev: new_rev.clone(),
            generation,
            body: if deleted { Map::new() } else { body },
            deleted,
        },
    );
    db.update_seq += 1;

    Ok(SaveResult::ok(id, new_rev))
}

/// Design document the server would derive for an index declared without one.
fn derived_design_document(definition: &IndexDefinition) -> String {
    let mut hasher = DefaultHasher::new();
    definition.fields.hash(&mut hasher);
    format!("_design/{:016x}", hasher.finish())
}

#[async_trait]
impl CouchBackend for InMemoryBackend {
    async fn database_exists(&self, database: &str) -> Result<bool, CouchError> {
        self.record(format!("HEAD /{database}"));
        let databases = self
            .databases
            .read()
            .map_err(|_| CouchError::transport(database, "in-memory backend lock poisoned"))?;
        Ok(databases.contains_key(database))
    }

    async fn create_database(&self, database: &str) -> Result<bool, CouchError> {
        self.record(format!("PUT /{database}"));
        let mut databases = self
            .databases
            .write()
            .map_err(|_| CouchError::transport(database, "in-memory backend lock poisoned"))?;
        if databases.contains_key(database) {
            return Ok(false);
        }
        databases.insert(database.to_string(), StoredDatabase::default());
        Ok(true)
    }

    async fn database_info(&self, database: &str) -> Result<DatabaseInfo, CouchError> {
        self.record(format!("GET /{database}"));
        self.read(database, |db| {
            let live: Vec<&StoredDocument> = db.docs.values().filter(|d| !d.deleted).collect();
            let external: u64 = live
                .iter()
                .map(|doc| Value::Object(doc.body.clone()).to_string().len() as u64)
                .sum();
            Ok(DatabaseInfo {
                db_name: database.to_string(),
                doc_count: live.len() as u64,
                doc_del_count: (db.docs.len() - live.len()) as u64,
                update_seq: Value::from(db.update_seq),
                sizes: DatabaseSizes {
                    active: external,
                    external,
                    file: external,
                },
                compact_running: false,
            })
        })
    }

    async fn compact(&self, database: &str) -> Result<(), CouchError> {
        self.record(format!("POST /{database}/_compact"));
        self.read(database, |_| Ok(()))
    }

    async fn get_document(&self, database: &str, id: &str) -> Result<Value, CouchError> {
        self.record(format!("GET /{database}/doc/{id}"));
        self.read(database, |db| match db.docs.get(id) {
            Some(doc) if !doc.deleted => {
                let mut body = doc.body.clone();
                body.insert("_id".into(), Value::String(id.to_string()));
                body.insert("_rev".into(), Value::String(doc.rev.clone()));
                Ok(Value::Object(body))
            }
            _ => Err(CouchError::NotFound {
                database: database.to_string(),
                id: id.to_string(),
            }),
        })
    }

    async fn post_document(&self, database: &str, body: Value) -> Result<SaveResult, CouchError> {
        self.record(format!("POST /{database}"));
        self.write(database, |db| save(db, database, None, body))
    }

    async fn put_document(
        &self,
        database: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, CouchError> {
        self.record(format!("PUT /{database}/doc/{id}"));
        self.write(database, |db| save(db, database, Some(id), body))
    }

    async fn delete_document(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> Result<SaveResult, CouchError> {
        self.record(format!("DELETE /{database}/doc/{id}?rev={rev}"));
        self.write(database, |db| {
            let mut tombstone = Map::new();
            tombstone.insert("_rev".into(), Value::String(rev.to_string()));
            tombstone.insert("_deleted".into(), Value::Bool(true));
            save(db, database, Some(id), Value::Object(tombstone))
        })
    }

    async fn bulk_docs(
        &self,
        database: &str,
        docs: Vec<Value>,
    ) -> Result<Vec<SaveResult>, CouchError> {
        self.record(format!("POST /{database}/_bulk_docs"));
        self.write(database, |db| {
            Ok(docs
                .into_iter()
                .map(|body| {
                    let id = body_id(&body).unwrap_or_default();
                    match save(db, database, None, body) {
                        Ok(result) => result,
                        Err(CouchError::Conflict { reason, .. }) => {
                            SaveResult::failed(id, "conflict", reason)
                        }
                        Err(CouchError::NotFound { .. }) => {
                            SaveResult::failed(id, "not_found", "missing")
                        }
                        Err(err) => SaveResult::failed(id, "bad_request", err.to_string()),
                    }
                })
                .collect())
        })
    }

    async fn all_documents(&self, database: &str) -> Result<Vec<Value>, CouchError> {
        self.record(format!("GET /{database}/_all_docs"));
        self.read(database, |db| {
            Ok(db
                .docs
                .iter()
                .filter(|(id, doc)| !doc.deleted && !id.starts_with("_design/"))
                .map(|(id, doc)| {
                    let mut body = doc.body.clone();
                    body.insert("_id".into(), Value::String(id.clone()));
                    body.insert("_rev".into(), Value::String(doc.rev.clone()));
                    Value::Object(body)
                })
                .collect())
        })
    }

    async fn get_indexes(&self, database: &str) -> Result<Vec<IndexInfo>, CouchError> {
        self.record(format!("GET /{database}/_index"));
        self.read(database, |db| {
            let mut indexes = vec![IndexInfo {
                design_document: None,
                name: "_all_docs".to_string(),
                index_type: "special".to_string(),
                fields: vec![("_id".to_string(), crate::index::IndexDirection::Asc)],
            }];
            indexes.extend(db.indexes.iter().cloned());
            Ok(indexes)
        })
    }

    async fn create_index(
        &self,
        database: &str,
        definition: &IndexDefinition,
    ) -> Result<(), CouchError> {
        self.record(format!("POST /{database}/_index"));
        let design_document = match &definition.design_document {
            Some(ddoc) => design_id(ddoc),
            None => derived_design_document(definition),
        };
        self.write(database, |db| {
            let info = IndexInfo {
                design_document: Some(design_document.clone()),
                name: definition.name.clone(),
                index_type: "json".to_string(),
                fields: definition.fields.clone(),
            };
            match db
                .indexes
                .iter_mut()
                .find(|i| i.name == definition.name && i.in_design_document(&design_document))
            {
                Some(existing) => *existing = info,
                None => db.indexes.push(info),
            }
            Ok(())
        })
    }

    async fn delete_index(
        &self,
        database: &str,
        design_document: &str,
        name: &str,
    ) -> Result<(), CouchError> {
        self.record(format!(
            "DELETE /{database}/_index/{}/json/{name}",
            design_id(design_document)
        ));
        self.write(database, |db| {
            let position = db
                .indexes
                .iter()
                .position(|i| i.name == name && i.in_design_document(design_document))
                .ok_or_else(|| CouchError::NotFound {
                    database: database.to_string(),
                    id: format!("{}/{}", design_id(design_document), name),
                })?;
            db.indexes.remove(position);
            Ok(())
        })
    }
}
