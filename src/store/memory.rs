// Copyright 2025 Cowboy AI, LLC.

//! In-process document store
//!
//! Collections are `BTreeMap`s keyed by id, so unordered queries iterate in
//! a deterministic order and repeated reads return identical content. The
//! conditional overwrite performs its version check under the collection
//! write lock, making it a real compare-and-swap.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DocumentStore, Page, StoreError};
use crate::query::{Predicate, SortSpec};

/// In-memory [`DocumentStore`] implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn stored_version(doc: &Value) -> u64 {
        doc.get("entity_version").and_then(Value::as_u64).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, mut doc: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        match doc.as_object_mut() {
            Some(map) => {
                map.insert("id".to_string(), Value::String(id.clone()));
            }
            None => {
                return Err(StoreError::Serialization(
                    "document must serialize to a JSON object".to_string(),
                ))
            }
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);
        debug!("Created document {} in collection {}", id, collection);
        Ok(id)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        let existing = docs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;

        if let Some(expected) = expected_version {
            let actual = Self::stored_version(existing);
            if actual != expected {
                warn!(
                    "Conditional write lost the race on {}/{}: expected version {}, found {}",
                    collection, id, expected, actual
                );
                return Err(StoreError::VersionConflict { expected, actual });
            }
        }

        docs.insert(id.to_string(), doc);
        debug!("Replaced document {} in collection {}", id, collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        order: &SortSpec,
        page: Option<Page>,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut matched: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| predicate.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !order.is_empty() {
            matched.sort_by(|a, b| order.compare(a, b));
        }

        if let Some(page) = page {
            matched = matched
                .into_iter()
                .skip(page.skip)
                .take(page.take)
                .collect();
        }

        Ok(matched)
    }

    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().filter(|doc| predicate.matches(doc)).count())
            .unwrap_or(0))
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_an_id_and_writes_it_into_the_document() {
        let store = MemoryStore::new();
        let id = store
            .create("widget", json!({"name": "gear", "entity_version": 0}))
            .await
            .unwrap();

        let doc = store.find_by_id("widget", &id).await.unwrap().unwrap();
        assert_eq!(doc["id"], json!(id));
        assert_eq!(doc["name"], json!("gear"));
    }

    #[tokio::test]
    async fn conditional_replace_detects_version_races() {
        let store = MemoryStore::new();
        let id = store
            .create("widget", json!({"entity_version": 3}))
            .await
            .unwrap();

        let err = store
            .replace("widget", &id, json!({"entity_version": 4}), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 2,
                actual: 3
            }
        ));

        store
            .replace("widget", &id, json!({"entity_version": 4}), Some(3))
            .await
            .unwrap();
        let doc = store.find_by_id("widget", &id).await.unwrap().unwrap();
        assert_eq!(doc["entity_version"], json!(4));
    }

    #[tokio::test]
    async fn replace_of_a_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .replace("widget", "nope", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn counters_start_at_one_and_are_independent() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("widget:xid").await.unwrap(), 1);
        assert_eq!(store.increment("widget:xid").await.unwrap(), 2);
        assert_eq!(store.increment("gadget:xid").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_increments_never_skip_or_repeat() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment("widget:xid").await.unwrap()
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn query_pages_after_filtering_and_ordering() {
        let store = MemoryStore::new();
        for age in [30, 10, 20, 40, 50] {
            store
                .create("person", json!({"age": age, "entity_version": 0}))
                .await
                .unwrap();
        }

        let adults = Predicate::new(|doc| doc["age"].as_i64().unwrap_or(0) >= 20);
        let by_age = SortSpec::by("age", crate::query::SortDirection::Ascending);
        let page = store
            .query("person", &adults, &by_age, Some(Page { skip: 1, take: 2 }))
            .await
            .unwrap();

        let ages: Vec<i64> = page.iter().map(|d| d["age"].as_i64().unwrap()).collect();
        assert_eq!(ages, vec![30, 40]);
        assert_eq!(store.count("person", &adults).await.unwrap(), 4);
    }
}
