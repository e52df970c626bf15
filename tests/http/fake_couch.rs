//! A fake CouchDB server: axum routes over an `InMemoryBackend`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use couch_rust::{CouchBackend, CouchError, IndexDefinition, IndexDirection, InMemoryBackend};
use serde::Deserialize;
use serde_json::{json, Value};

/// `CouchError` rendered as a CouchDB error body.
struct FakeError(CouchError);

impl From<CouchError> for FakeError {
    fn from(err: CouchError) -> Self {
        FakeError(err)
    }
}

impl IntoResponse for FakeError {
    fn into_response(self) -> Response {
        let (status, error, reason) = match &self.0 {
            CouchError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", "missing".to_string()),
            CouchError::DatabaseMissing(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Database does not exist.".to_string(),
            ),
            CouchError::Conflict { reason, .. } => (StatusCode::CONFLICT, "conflict", reason.clone()),
            CouchError::Transport {
                status: Some(status),
                message,
                ..
            } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "bad_request",
                message.clone(),
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unknown_error",
                other.to_string(),
            ),
        };
        (status, Json(json!({ "error": error, "reason": reason }))).into_response()
    }
}

type FakeResult = Result<Response, FakeError>;

pub fn router(backend: InMemoryBackend) -> Router {
    Router::new()
        .route(
            "/:db",
            get(db_info).head(db_head).put(db_create).post(doc_post),
        )
        .route("/:db/_compact", post(db_compact))
        .route("/:db/_bulk_docs", post(bulk_docs))
        .route("/:db/_all_docs", get(all_docs))
        .route("/:db/_index", get(list_indexes).post(create_index))
        .route("/:db/_index/_design/:ddoc/json/:name", delete(delete_index))
        .route("/:db/doc/:id", get(doc_get).put(doc_put).delete(doc_delete))
        .with_state(backend)
}

/// Bind to port 0 and return the base url.
pub async fn start(backend: InMemoryBackend) -> String {
    serve(router(backend)).await
}

/// Serve any router on port 0 and return the base url.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/")
}

fn saved(status: StatusCode, result: couch_rust::SaveResult) -> Response {
    (
        status,
        Json(json!({ "ok": true, "id": result.id, "rev": result.rev })),
    )
        .into_response()
}

async fn db_info(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    let info = backend.database_info(&db).await?;
    Ok(Json(info).into_response())
}

async fn db_head(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    if backend.database_exists(&db).await? {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

async fn db_create(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    if backend.create_database(&db).await? {
        Ok((StatusCode::CREATED, Json(json!({ "ok": true }))).into_response())
    } else {
        Ok((
            StatusCode::PRECONDITION_FAILED,
            Json(json!({
                "error": "file_exists",
                "reason": "The database could not be created, the file already exists."
            })),
        )
            .into_response())
    }
}

async fn db_compact(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    backend.compact(&db).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "ok": true }))).into_response())
}

async fn doc_post(
    State(backend): State<InMemoryBackend>,
    Path(db): Path<String>,
    Json(body): Json<Value>,
) -> FakeResult {
    let result = backend.post_document(&db, body).await?;
    Ok(saved(StatusCode::CREATED, result))
}

async fn doc_get(
    State(backend): State<InMemoryBackend>,
    Path((db, id)): Path<(String, String)>,
) -> FakeResult {
    Ok(Json(backend.get_document(&db, &id).await?).into_response())
}

async fn doc_put(
    State(backend): State<InMemoryBackend>,
    Path((db, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> FakeResult {
    let result = backend.put_document(&db, &id, body).await?;
    Ok(saved(StatusCode::CREATED, result))
}

#[derive(Deserialize)]
struct RevQuery {
    rev: String,
}

async fn doc_delete(
    State(backend): State<InMemoryBackend>,
    Path((db, id)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
) -> FakeResult {
    let result = backend.delete_document(&db, &id, &query.rev).await?;
    Ok(saved(StatusCode::OK, result))
}

#[derive(Deserialize)]
struct BulkBody {
    docs: Vec<Value>,
}

async fn bulk_docs(
    State(backend): State<InMemoryBackend>,
    Path(db): Path<String>,
    Json(body): Json<BulkBody>,
) -> FakeResult {
    let results = backend.bulk_docs(&db, body.docs).await?;
    Ok((StatusCode::CREATED, Json(results)).into_response())
}

async fn all_docs(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    let docs = backend.all_documents(&db).await?;
    let rows: Vec<Value> = docs
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc["_id"],
                "key": doc["_id"],
                "value": { "rev": doc["_rev"] },
                "doc": doc,
            })
        })
        .collect();
    Ok(Json(json!({ "total_rows": rows.len(), "offset": 0, "rows": rows })).into_response())
}

async fn list_indexes(State(backend): State<InMemoryBackend>, Path(db): Path<String>) -> FakeResult {
    let indexes: Vec<Value> = backend
        .get_indexes(&db)
        .await?
        .into_iter()
        .map(|index| {
            let fields: Vec<Value> = index
                .fields
                .iter()
                .map(|(field, direction)| json!({ field.as_str(): direction }))
                .collect();
            json!({
                "ddoc": index.design_document,
                "name": index.name,
                "type": index.index_type,
                "def": { "fields": fields },
            })
        })
        .collect();
    Ok(Json(json!({ "total_rows": indexes.len(), "indexes": indexes })).into_response())
}

#[derive(Deserialize)]
struct IndexFields {
    fields: Vec<Value>,
}

#[derive(Deserialize)]
struct CreateIndexBody {
    index: IndexFields,
    name: String,
    #[serde(rename = "type")]
    index_type: String,
    ddoc: Option<String>,
    partitioned: Option<bool>,
}

async fn create_index(
    State(backend): State<InMemoryBackend>,
    Path(db): Path<String>,
    Json(body): Json<CreateIndexBody>,
) -> FakeResult {
    if body.index_type != "json" {
        return Err(FakeError(CouchError::Transport {
            database: db,
            status: Some(400),
            message: "only json indexes are supported".into(),
        }));
    }

    let mut fields = Vec::new();
    for entry in &body.index.fields {
        let object = entry.as_object().filter(|o| o.len() == 1).ok_or_else(|| {
            FakeError(CouchError::Transport {
                database: db.clone(),
                status: Some(400),
                message: "invalid field entry".into(),
            })
        })?;
        for (field, direction) in object {
            let direction = if direction == "desc" {
                IndexDirection::Desc
            } else {
                IndexDirection::Asc
            };
            fields.push((field.clone(), direction));
        }
    }

    let definition = IndexDefinition {
        name: body.name.clone(),
        design_document: body.ddoc,
        fields,
        partitioned: body.partitioned,
    };
    backend.create_index(&db, &definition).await?;
    Ok(Json(json!({ "result": "created", "name": body.name })).into_response())
}

async fn delete_index(
    State(backend): State<InMemoryBackend>,
    Path((db, ddoc, name)): Path<(String, String, String)>,
) -> FakeResult {
    backend
        .delete_index(&db, &format!("_design/{ddoc}"), &name)
        .await?;
    Ok(Json(json!({ "ok": true })).into_response())
}
