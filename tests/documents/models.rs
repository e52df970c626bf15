//! Test documents for CRUD operations.

use couch_rust::Document;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Document)]
#[document(database = "rebels")]
pub struct Rebel {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
    pub age: u32,
}

impl Rebel {
    pub fn new(id: &str, name: &str, age: u32) -> Self {
        Self {
            id: id.to_string(),
            rev: None,
            name: name.to_string(),
            age,
        }
    }
}
