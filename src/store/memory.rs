//! In-memory document store
//!
//! Every operation runs under one lock, so each update is applied to a
//! document as a unit: either all of its push/inc/set operations land or
//! none do.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{EventflowError, Result};
use crate::store::{Document, DocumentStore, Filter, Update, UpdateResult};

/// Document store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn poisoned() -> EventflowError {
        EventflowError::store("memory store lock poisoned")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<String> {
        let id = match document.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                document.insert("_id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs
            .iter()
            .any(|d| d.get("_id").and_then(Value::as_str) == Some(id.as_str()))
        {
            return Err(EventflowError::store(format!("duplicate _id '{}'", id)));
        }
        docs.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = docs.iter_mut().find(|d| filter.matches(d)) {
            // apply to a copy so a failing operation leaves the document untouched
            let mut updated = existing.clone();
            apply_update(&mut updated, update, false)?;
            let modified = updated != *existing;
            *existing = updated;
            return Ok(UpdateResult {
                matched: 1,
                modified: u64::from(modified),
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(UpdateResult::default());
        }

        let mut document = Document::new();
        for (path, value) in filter.conditions() {
            set_path(&mut document, path, value.clone())?;
        }
        apply_update(&mut document, update, true)?;

        let id = uuid::Uuid::new_v4().to_string();
        document.insert("_id".to_string(), Value::String(id.clone()));
        docs.push(document);

        Ok(UpdateResult {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }
}

fn apply_update(document: &mut Document, update: &Update, inserting: bool) -> Result<()> {
    if inserting {
        for (path, value) in &update.set_on_insert {
            set_path(document, path, value.clone())?;
        }
    }

    for (path, value) in &update.set {
        set_path(document, path, value.clone())?;
    }

    for (path, by) in &update.inc {
        let slot = slot_mut(document, path)?;
        let current = match slot {
            Value::Null => 0,
            Value::Number(n) => n.as_i64().ok_or_else(|| {
                EventflowError::store(format!("cannot increment non-integer field '{}'", path))
            })?,
            _ => {
                return Err(EventflowError::store(format!(
                    "cannot increment non-numeric field '{}'",
                    path
                )))
            }
        };
        *slot = Value::from(current + by);
    }

    for (path, values) in &update.push {
        let slot = slot_mut(document, path)?;
        match slot {
            Value::Null => *slot = Value::Array(values.clone()),
            Value::Array(items) => items.extend(values.iter().cloned()),
            _ => {
                return Err(EventflowError::store(format!(
                    "cannot push to non-array field '{}'",
                    path
                )))
            }
        }
    }

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Value) -> Result<()> {
    *slot_mut(document, path)? = value;
    Ok(())
}

/// Walk a dotted path, creating intermediate objects; missing leaves start as null
fn slot_mut<'a>(document: &'a mut Document, path: &str) -> Result<&'a mut Value> {
    let mut parts = path.split('.');
    let first = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| EventflowError::store("empty field path"))?;

    let mut current = document.entry(first.to_string()).or_insert(Value::Null);
    for part in parts {
        if current.is_null() {
            *current = Value::Object(Document::new());
        }
        current = match current {
            Value::Object(map) => map.entry(part.to_string()).or_insert(Value::Null),
            _ => {
                return Err(EventflowError::store(format!(
                    "field path '{}' crosses a non-object value",
                    path
                )))
            }
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::get_path;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_creates_document_from_filter() {
        let store = MemoryStore::new();
        let result = store
            .update_one(
                "event_food",
                &Filter::eq("event_id", "e1"),
                &Update::new()
                    .push_each("menu_items", vec![json!({"name": "Soup"})])
                    .inc("summary.menu_item_count", 1)
                    .set_on_insert("user_id", "u1"),
                true,
            )
            .await
            .unwrap();
        assert!(result.upserted_id.is_some());

        let doc = store
            .find_one("event_food", &Filter::eq("event_id", "e1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["menu_items"], json!([{"name": "Soup"}]));
        assert_eq!(get_path(&doc, "summary.menu_item_count"), Some(&json!(1)));
        assert_eq!(doc["user_id"], "u1");
    }

    #[tokio::test]
    async fn test_set_on_insert_ignored_for_existing() {
        let store = MemoryStore::new();
        let filter = Filter::eq("event_id", "e1");
        let update = Update::new().set_on_insert("user_id", "first").inc("n", 1);
        store.update_one("c", &filter, &update, true).await.unwrap();

        let update = Update::new().set_on_insert("user_id", "second").inc("n", 1);
        let result = store.update_one("c", &filter, &update, true).await.unwrap();
        assert_eq!(result.matched, 1);

        let doc = store.find_one("c", &filter).await.unwrap().unwrap();
        assert_eq!(doc["user_id"], "first");
        assert_eq!(doc["n"], 2);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document_untouched() {
        let store = MemoryStore::new();
        let filter = Filter::eq("event_id", "e1");
        store
            .update_one("c", &filter, &Update::new().set("menu_items", "oops"), true)
            .await
            .unwrap();

        let bad = Update::new()
            .inc("count", 1)
            .push_each("menu_items", vec![json!(1)]);
        assert!(store.update_one("c", &filter, &bad, false).await.is_err());

        let doc = store.find_one("c", &filter).await.unwrap().unwrap();
        assert!(doc.get("count").is_none());
    }

    #[tokio::test]
    async fn test_no_upsert_without_match() {
        let store = MemoryStore::new();
        let result = store
            .update_one("c", &Filter::eq("k", 1), &Update::new().inc("n", 1), false)
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::default());
        assert_eq!(store.count("c"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_pushes_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_one(
                        "event_food",
                        &Filter::eq("event_id", "shared"),
                        &Update::new()
                            .push_each("menu_items", vec![json!({"name": format!("dish {}", i)})])
                            .inc("summary.menu_item_count", 1),
                        true,
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count("event_food"), 1);
        let doc = store
            .find_one("event_food", &Filter::eq("event_id", "shared"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["menu_items"].as_array().unwrap().len(), 16);
        assert_eq!(get_path(&doc, "summary.menu_item_count"), Some(&json!(16)));
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryStore::new();
        let id = store.insert_one("licenses", Document::new()).await.unwrap();
        assert!(!id.is_empty());

        let mut doc = Document::new();
        doc.insert("_id".into(), json!(id.clone()));
        assert!(store.insert_one("licenses", doc).await.is_err());
    }
}
