use super::IndexDirection;

/// Fluent builder for the ordered field list of an index.
///
/// ```ignore
/// IndexBuilder::new().index_by("surname").then_by("name")
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    fields: Vec<(String, IndexDirection)>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the field list with an ascending field.
    pub fn index_by(self, field: impl Into<String>) -> Self {
        self.push(field, IndexDirection::Asc)
    }

    /// Start the field list with a descending field.
    pub fn index_by_descending(self, field: impl Into<String>) -> Self {
        self.push(field, IndexDirection::Desc)
    }

    pub fn then_by(self, field: impl Into<String>) -> Self {
        self.push(field, IndexDirection::Asc)
    }

    pub fn then_by_descending(self, field: impl Into<String>) -> Self {
        self.push(field, IndexDirection::Desc)
    }

    fn push(mut self, field: impl Into<String>, direction: IndexDirection) -> Self {
        self.fields.push((field.into(), direction));
        self
    }

    pub fn build(self) -> Vec<(String, IndexDirection)> {
        self.fields
    }
}
