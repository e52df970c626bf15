//! Index definitions (declared) and index descriptors (live).

mod builder;

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use builder::IndexBuilder;

const DESIGN_PREFIX: &str = "_design/";
const JSON_INDEX: &str = "json";
const SPECIAL_INDEX: &str = "special";

/// Sort direction of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDirection {
    Asc,
    Desc,
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDirection::Asc => write!(f, "asc"),
            IndexDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Options applied when an index is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Design document to group the index under. When `None` the server
    /// picks one.
    pub design_document: Option<String>,
    pub partitioned: Option<bool>,
}

impl IndexOptions {
    pub fn design_document(mut self, ddoc: impl Into<String>) -> Self {
        self.design_document = Some(ddoc.into());
        self
    }

    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = Some(partitioned);
        self
    }
}

/// A declared index: what the caller wants to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub design_document: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, IndexDirection)>,
    pub partitioned: Option<bool>,
}

impl IndexDefinition {
    /// Build a definition from a name and a builder closure.
    ///
    /// ```ignore
    /// let by_age = IndexDefinition::new("by_age", |i| i.index_by("age").then_by("name"));
    /// ```
    pub fn new(name: impl Into<String>, build: impl FnOnce(IndexBuilder) -> IndexBuilder) -> Self {
        Self::with_options(name, build, IndexOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        build: impl FnOnce(IndexBuilder) -> IndexBuilder,
        options: IndexOptions,
    ) -> Self {
        Self {
            name: name.into(),
            design_document: options.design_document,
            fields: build(IndexBuilder::new()).build(),
            partitioned: options.partitioned,
        }
    }

    /// The `POST /{db}/_index` request body.
    pub(crate) fn to_request(&self) -> Value {
        let mut body = json!({
            "index": { "fields": fields_to_json(&self.fields) },
            "name": self.name,
            "type": JSON_INDEX,
        });
        if let Some(object) = body.as_object_mut() {
            if let Some(ddoc) = &self.design_document {
                object.insert("ddoc".into(), Value::String(design_name(ddoc).to_string()));
            }
            if let Some(partitioned) = self.partitioned {
                object.insert("partitioned".into(), Value::Bool(partitioned));
            }
        }
        body
    }
}

/// A live index as reported by `GET /{db}/_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Full design document id (`_design/...`). `None` for the built-in
    /// `_all_docs` index.
    pub design_document: Option<String>,
    pub name: String,
    pub index_type: String,
    /// Fields in the order the server reports them.
    pub fields: Vec<(String, IndexDirection)>,
}

impl IndexInfo {
    /// Whether this index lives under the given design document. Accepts
    /// the name with or without the `_design/` prefix.
    pub fn in_design_document(&self, ddoc: &str) -> bool {
        self.design_document
            .as_deref()
            .map(design_name)
            .is_some_and(|current| current == design_name(ddoc))
    }

    /// Whether this is a Mango `json` index, the only kind declarations
    /// are reconciled against.
    pub fn is_json(&self) -> bool {
        self.index_type == JSON_INDEX
    }
}

impl<'de> Deserialize<'de> for IndexInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawDef {
            #[serde(default)]
            fields: Vec<Value>,
        }

        #[derive(Deserialize)]
        struct RawIndex {
            ddoc: Option<String>,
            name: String,
            #[serde(rename = "type", default)]
            index_type: String,
            def: RawDef,
        }

        let raw = RawIndex::deserialize(deserializer)?;
        // Text and other index types describe fields by value type, not
        // sort direction. Keep the index, drop what does not parse.
        let fields = match raw.index_type.as_str() {
            JSON_INDEX | SPECIAL_INDEX => raw
                .def
                .fields
                .iter()
                .map(parse_field)
                .collect::<Result<Vec<_>, String>>()
                .map_err(de::Error::custom)?,
            _ => raw.def.fields.iter().filter_map(|f| parse_field(f).ok()).collect(),
        };

        Ok(IndexInfo {
            design_document: raw.ddoc,
            name: raw.name,
            index_type: raw.index_type,
            fields,
        })
    }
}

/// Response of `GET /{db}/_index`.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IndexList {
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
}

/// Strip the `_design/` prefix from a design document id.
pub(crate) fn design_name(ddoc: &str) -> &str {
    ddoc.strip_prefix(DESIGN_PREFIX).unwrap_or(ddoc)
}

/// Prefix a design document name with `_design/` when it is missing.
pub(crate) fn design_id(ddoc: &str) -> String {
    format!("{}{}", DESIGN_PREFIX, design_name(ddoc))
}

fn fields_to_json(fields: &[(String, IndexDirection)]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|(field, direction)| {
                let mut entry = Map::new();
                entry.insert(field.clone(), Value::String(direction.to_string()));
                Value::Object(entry)
            })
            .collect(),
    )
}

/// Parse one entry of a `fields` array: `{"age": "asc"}` or a bare `"age"`.
fn parse_field(value: &Value) -> Result<(String, IndexDirection), String> {
    match value {
        Value::String(field) => Ok((field.clone(), IndexDirection::Asc)),
        Value::Object(entry) if entry.len() == 1 => {
            let (field, direction) = entry.iter().next().ok_or("empty field entry")?;
            let direction = match direction.as_str() {
                Some("asc") => IndexDirection::Asc,
                Some("desc") => IndexDirection::Desc,
                _ => return Err(format!("invalid sort direction for field `{field}`")),
            };
            Ok((field.clone(), direction))
        }
        other => Err(format!("invalid index field entry: {other}")),
    }
}
