use serde::{Deserialize, Serialize};

use super::Document;

/// Per-document result of a write, as returned by the server.
///
/// Single writes answer `{ "ok": true, "id", "rev" }`; bulk writes answer
/// one of these per submitted document, either `{ "id", "rev" }` or
/// `{ "id", "error", "reason" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Classified outcome of a `SaveResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Ok,
    Conflict,
    Failed(String),
}

impl SaveResult {
    pub fn ok(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: Some(rev.into()),
            error: None,
            reason: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            error: Some(error.into()),
            reason: Some(reason.into()),
        }
    }

    pub fn outcome(&self) -> SaveOutcome {
        match (&self.error, &self.rev) {
            (None, Some(_)) => SaveOutcome::Ok,
            (Some(error), _) if error == "conflict" => SaveOutcome::Conflict,
            (Some(error), _) => SaveOutcome::Failed(error.clone()),
            (None, None) => SaveOutcome::Failed("missing revision".to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome() == SaveOutcome::Ok
    }

    /// Copy the server-assigned id and revision onto the document.
    ///
    /// Does nothing unless the result is a success.
    pub(crate) fn apply_to<T: Document>(&self, doc: &mut T) -> bool {
        if !self.is_ok() {
            return false;
        }
        if !self.id.is_empty() && doc.id() != self.id {
            doc.set_id(self.id.clone());
        }
        doc.set_rev(self.rev.clone());
        true
    }
}
