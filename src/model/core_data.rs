use std::collections::BTreeMap;
use std::fmt;

use crate::schema::FieldSchema;

/// The persisted, diffable projection of an issue: `key` plus one text value
/// per schema field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreData {
    pub key: String,
    pub fields: BTreeMap<String, String>,
}

impl CoreData {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        if field == "key" {
            return Some(&self.key);
        }
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn title(&self) -> &str {
        self.get("title").unwrap_or_default()
    }

    /// Exact string equality over `key` and the schema's fields. Fields the
    /// schema does not name are ignored.
    pub fn same_fields(&self, other: &CoreData, schema: &FieldSchema) -> bool {
        self.key == other.key && schema.keys().all(|field| self.get(field) == other.get(field))
    }
}

impl fmt::Display for CoreData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.key, self.title())
    }
}
