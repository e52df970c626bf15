//! HTTP backend for a CouchDB server.
//!
//! Requires the `http` feature. Uses reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CouchBackend, DatabaseInfo};
use crate::document::SaveResult;
use crate::error::CouchError;
use crate::index::{design_name, IndexDefinition, IndexInfo, IndexList};
use crate::options::CouchOptions;

/// `{ "error", "reason" }` body CouchDB sends with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
    #[serde(default)]
    doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    #[serde(default)]
    rows: Vec<AllDocsRow>,
}

/// Backend that talks to CouchDB over HTTP.
///
/// Cheap to clone; the underlying reqwest client pools connections.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    credentials: Option<(String, Option<String>)>,
}

impl HttpBackend {
    pub fn new(options: &CouchOptions) -> Result<Self, CouchError> {
        let mut builder = Client::builder();
        if let Some(secs) = options.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| CouchError::Configuration(format!("failed to build http client: {e}")))?;
        Self::with_client(client, options)
    }

    /// Use an existing reqwest client (shared pool, custom TLS, ...).
    pub fn with_client(client: Client, options: &CouchOptions) -> Result<Self, CouchError> {
        let endpoint = Url::parse(&options.endpoint).map_err(|e| {
            CouchError::Configuration(format!("invalid endpoint `{}`: {e}", options.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(CouchError::Configuration(format!(
                "endpoint `{}` cannot be used as a base url",
                options.endpoint
            )));
        }
        let credentials = options
            .username
            .clone()
            .map(|username| (username, options.password.clone()));

        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    /// Build `{endpoint}/{segments...}`, percent-encoding each segment.
    fn url(&self, database: &str, segments: &[&str]) -> Result<Url, CouchError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CouchError::transport(database, "endpoint cannot be a base url"))?
            .pop_if_empty()
            .push(database)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, password.as_ref()),
            None => request,
        }
    }

    /// Send a request and map non-success statuses onto `CouchError`.
    ///
    /// `id` names the document (or index) the request is about, for the
    /// error message.
    async fn send(
        &self,
        database: &str,
        id: Option<&str>,
        rev: Option<&str>,
        request: RequestBuilder,
    ) -> Result<Response, CouchError> {
        let response = request
            .send()
            .await
            .map_err(|e| CouchError::transport(database, e.to_string()))?;

        let status = response.status();
        tracing::debug!(database, status = status.as_u16(), url = %response.url(), "couchdb response");
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(map_status(database, id, rev, status, body))
    }

    async fn json<T: for<'de> Deserialize<'de>>(
        database: &str,
        response: Response,
    ) -> Result<T, CouchError> {
        response
            .json()
            .await
            .map_err(|e| CouchError::Serde(format!("invalid response from {database}: {e}")))
    }
}

fn map_status(
    database: &str,
    id: Option<&str>,
    rev: Option<&str>,
    status: StatusCode,
    body: ErrorBody,
) -> CouchError {
    match (status, id) {
        (StatusCode::NOT_FOUND, _) if body.reason == "Database does not exist." => {
            CouchError::DatabaseMissing(database.to_string())
        }
        (StatusCode::NOT_FOUND, Some(id)) => CouchError::NotFound {
            database: database.to_string(),
            id: id.to_string(),
        },
        (StatusCode::NOT_FOUND, None) => CouchError::DatabaseMissing(database.to_string()),
        (StatusCode::CONFLICT, _) => CouchError::Conflict {
            database: database.to_string(),
            id: id.unwrap_or_default().to_string(),
            rev: rev.map(str::to_string),
            reason: body.reason,
        },
        _ => CouchError::Transport {
            database: database.to_string(),
            status: Some(status.as_u16()),
            message: if body.reason.is_empty() {
                body.error
            } else {
                format!("{}: {}", body.error, body.reason)
            },
        },
    }
}

fn body_rev(body: &Value) -> Option<&str> {
    body.get("_rev").and_then(Value::as_str)
}

#[async_trait]
impl CouchBackend for HttpBackend {
    async fn database_exists(&self, database: &str) -> Result<bool, CouchError> {
        let url = self.url(database, &[])?;
        let response = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(|e| CouchError::transport(database, e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(CouchError::Transport {
                database: database.to_string(),
                status: Some(status.as_u16()),
                message: "unexpected status checking database".to_string(),
            }),
        }
    }

    async fn create_database(&self, database: &str) -> Result<bool, CouchError> {
        let url = self.url(database, &[])?;
        let response = self
            .request(Method::PUT, url)
            .send()
            .await
            .map_err(|e| CouchError::transport(database, e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            // file_exists: someone else created it first
            StatusCode::PRECONDITION_FAILED => Ok(false),
            status => {
                let body: ErrorBody = response.json().await.unwrap_or_default();
                Err(map_status(database, None, None, status, body))
            }
        }
    }

    async fn database_info(&self, database: &str) -> Result<DatabaseInfo, CouchError> {
        let url = self.url(database, &[])?;
        let response = self.send(database, None, None, self.request(Method::GET, url)).await?;
        Self::json(database, response).await
    }

    async fn compact(&self, database: &str) -> Result<(), CouchError> {
        let url = self.url(database, &["_compact"])?;
        let request = self.request(Method::POST, url).json(&json!({}));
        self.send(database, None, None, request).await?;
        Ok(())
    }

    async fn get_document(&self, database: &str, id: &str) -> Result<Value, CouchError> {
        let url = self.url(database, &["doc", id])?;
        let response = self
            .send(database, Some(id), None, self.request(Method::GET, url))
            .await?;
        Self::json(database, response).await
    }

    async fn post_document(&self, database: &str, body: Value) -> Result<SaveResult, CouchError> {
        let url = self.url(database, &[])?;
        let id = body.get("_id").and_then(Value::as_str).map(str::to_string);
        let rev = body_rev(&body).map(str::to_string);
        let request = self.request(Method::POST, url).json(&body);
        let response = self
            .send(database, id.as_deref(), rev.as_deref(), request)
            .await?;
        Self::json(database, response).await
    }

    async fn put_document(
        &self,
        database: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, CouchError> {
        let url = self.url(database, &["doc", id])?;
        let rev = body_rev(&body).map(str::to_string);
        let request = self.request(Method::PUT, url).json(&body);
        let response = self
            .send(database, Some(id), rev.as_deref(), request)
            .await?;
        Self::json(database, response).await
    }

    async fn delete_document(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> Result<SaveResult, CouchError> {
        let url = self.url(database, &["doc", id])?;
        let request = self.request(Method::DELETE, url).query(&[("rev", rev)]);
        let response = self.send(database, Some(id), Some(rev), request).await?;
        Self::json(database, response).await
    }

    async fn bulk_docs(
        &self,
        database: &str,
        docs: Vec<Value>,
    ) -> Result<Vec<SaveResult>, CouchError> {
        let url = self.url(database, &["_bulk_docs"])?;
        let request = self.request(Method::POST, url).json(&json!({ "docs": docs }));
        let response = self.send(database, None, None, request).await?;
        Self::json(database, response).await
    }

    async fn all_documents(&self, database: &str) -> Result<Vec<Value>, CouchError> {
        let url = self.url(database, &["_all_docs"])?;
        let request = self
            .request(Method::GET, url)
            .query(&[("include_docs", "true")]);
        let response = self.send(database, None, None, request).await?;
        let all: AllDocsResponse = Self::json(database, response).await?;
        Ok(all
            .rows
            .into_iter()
            .filter(|row| !row.id.starts_with("_design/"))
            .filter_map(|row| row.doc)
            .collect())
    }

    async fn get_indexes(&self, database: &str) -> Result<Vec<IndexInfo>, CouchError> {
        let url = self.url(database, &["_index"])?;
        let response = self.send(database, None, None, self.request(Method::GET, url)).await?;
        let list: IndexList = Self::json(database, response).await?;
        Ok(list.indexes)
    }

    async fn create_index(
        &self,
        database: &str,
        definition: &IndexDefinition,
    ) -> Result<(), CouchError> {
        let url = self.url(database, &["_index"])?;
        let request = self.request(Method::POST, url).json(&definition.to_request());
        self.send(database, Some(&definition.name), None, request)
            .await?;
        Ok(())
    }

    async fn delete_index(
        &self,
        database: &str,
        design_document: &str,
        name: &str,
    ) -> Result<(), CouchError> {
        let url = self.url(
            database,
            &["_index", "_design", design_name(design_document), "json", name],
        )?;
        self.send(database, Some(name), None, self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }
}
