//! CouchOptions - connection and initialization settings.

use std::env;

use serde::Deserialize;

/// Settings consumed when a context is built and initialized.
///
/// `check_database_exists` and `override_existing_indexes` drive
/// provisioning and index reconciliation; the rest configure the
/// HTTP backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CouchOptions {
    /// Server root, e.g. `http://localhost:5984/`.
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout. `None` leaves the client default.
    pub request_timeout_secs: Option<u64>,
    /// Create each declared database if it is missing. When false the
    /// databases are assumed to exist and no request is made.
    pub check_database_exists: bool,
    /// Replace live indexes whose fields differ from the declared ones.
    pub override_existing_indexes: bool,
}

impl Default for CouchOptions {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5984/".to_string(),
            username: None,
            password: None,
            request_timeout_secs: None,
            check_database_exists: false,
            override_existing_indexes: false,
        }
    }
}

impl CouchOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load options from `COUCHDB_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// - `COUCHDB_URL`
    /// - `COUCHDB_USER` / `COUCHDB_PASSWORD`
    /// - `COUCHDB_TIMEOUT_SECS`
    /// - `COUCHDB_CHECK_DATABASE_EXISTS`
    /// - `COUCHDB_OVERRIDE_EXISTING_INDEXES`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("COUCHDB_URL").unwrap_or(defaults.endpoint),
            username: env::var("COUCHDB_USER").ok(),
            password: env::var("COUCHDB_PASSWORD").ok(),
            request_timeout_secs: env::var("COUCHDB_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            check_database_exists: env_flag("COUCHDB_CHECK_DATABASE_EXISTS")
                .unwrap_or(defaults.check_database_exists),
            override_existing_indexes: env_flag("COUCHDB_OVERRIDE_EXISTING_INDEXES")
                .unwrap_or(defaults.override_existing_indexes),
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn check_database_exists(mut self, check: bool) -> Self {
        self.check_database_exists = check;
        self
    }

    pub fn override_existing_indexes(mut self, override_existing: bool) -> Self {
        self.override_existing_indexes = override_existing;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
