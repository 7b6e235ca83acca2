//! Store module - the document store the agents write event data to
//!
//! Documents are addressed by collection name and an equality filter. Updates
//! are expressed as atomic push / increment / set operations so concurrent
//! runs targeting the same event never read-modify-write shared fields.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::Result;

/// A stored document
pub type Document = Map<String, Value>;

/// Collection holding one food document per event
pub const FOOD_COLLECTION: &str = "event_food";
/// Collection holding one license document per event
pub const LICENSE_COLLECTION: &str = "event_licenses";

/// Equality filter over (possibly dotted) field paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Match documents whose `field` equals `value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    /// Add another equality condition
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| get_path(document, path) == Some(expected))
    }
}

/// An atomic update applied to a single document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Values appended to array fields (`$push` with `$each`)
    pub push: Vec<(String, Vec<Value>)>,
    /// Integer increments
    pub inc: Vec<(String, i64)>,
    /// Field assignments
    pub set: Vec<(String, Value)>,
    /// Field assignments applied only when the update inserts a new document
    pub set_on_insert: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_each(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.push.push((field.into(), values));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.push((field.into(), by));
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_empty()
            && self.inc.is_empty()
            && self.set.is_empty()
            && self.set_on_insert.is_empty()
    }
}

/// Outcome of an update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    /// Id of the document created by an upsert
    pub upserted_id: Option<String>,
}

/// Document store collaborator
///
/// No transactions span calls; each `update_one` must apply atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return the first document matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Insert a document; returns its id
    async fn insert_one(&self, collection: &str, document: Document) -> Result<String>;

    /// Apply `update` to the first matching document, inserting one when
    /// nothing matches and `upsert` is set
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult>;
}

/// Resolve a dotted path inside a document
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = document.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matches_dotted_paths() {
        let d = doc(json!({"event_id": "e1", "summary": {"status": "Planning"}}));
        assert!(Filter::eq("event_id", "e1").matches(&d));
        assert!(Filter::eq("event_id", "e1")
            .and("summary.status", "Planning")
            .matches(&d));
        assert!(!Filter::eq("event_id", "e2").matches(&d));
        assert!(!Filter::eq("missing.path", 1).matches(&d));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::default().matches(&Document::new()));
    }

    #[test]
    fn test_update_builder() {
        let update = Update::new()
            .push_each("menu_items", vec![json!({"name": "Soup"})])
            .inc("summary.menu_item_count", 1);
        assert!(!update.is_empty());
        assert_eq!(update.inc[0].1, 1);
        assert!(Update::new().is_empty());
    }
}
