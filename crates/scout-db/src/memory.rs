//! In-process [`DocumentStore`] used by the CLI and by tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{compare, contains, require_object, Collection, DocumentStore, FindOptions, SortDirection};
use crate::DbError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, collection: Collection, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut guard = self
            .collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(guard.entry(collection).or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), DbError> {
        require_object(&doc, "document")?;
        self.with(collection, |docs| docs.push(doc));
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
        options: FindOptions,
    ) -> Result<Vec<Value>, DbError> {
        require_object(filter, "filter")?;
        let mut found: Vec<Value> = self.with(collection, |docs| {
            docs.iter().filter(|d| contains(d, filter)).cloned().collect()
        });

        if let Some((field, direction)) = &options.sort {
            found.sort_by(|a, b| {
                let ord = compare(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = options.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Value,
        set: &Value,
    ) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        let Value::Object(set) = set else {
            return Err(DbError::InvalidFilter("set must be a JSON object".to_string()));
        };
        Ok(self.with(collection, |docs| {
            let mut updated = 0u64;
            for doc in docs.iter_mut().filter(|d| contains(d, filter)) {
                if let Value::Object(map) = doc {
                    for (k, v) in set {
                        map.insert(k.clone(), v.clone());
                    }
                    updated += 1;
                }
            }
            updated
        }))
    }

    async fn delete_many(&self, collection: Collection, filter: &Value) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        Ok(self.with(collection, |docs| {
            let before = docs.len();
            docs.retain(|d| !contains(d, filter));
            (before - docs.len()) as u64
        }))
    }

    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        Ok(self.with(collection, |docs| {
            docs.iter().filter(|d| contains(d, filter)).count() as u64
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, score, active) in [("A", 40, true), ("B", 90, true), ("C", 70, false)] {
            store
                .insert(
                    Collection::CandidateProducts,
                    json!({ "name": name, "overall_score": score, "is_active": active }),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn find_filters_sorts_and_limits() {
        let store = seeded().await;
        let found = store
            .find(
                Collection::CandidateProducts,
                &json!({ "is_active": true }),
                FindOptions::sorted("overall_score", SortDirection::Desc).limit(5),
            )
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn update_many_merges_top_level_keys() {
        let store = seeded().await;
        let n = store
            .update_many(
                Collection::CandidateProducts,
                &json!({ "is_active": true }),
                &json!({ "is_active": false, "archived": true }),
            )
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            store
                .count(Collection::CandidateProducts, &json!({ "archived": true }))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count(Collection::CandidateProducts, &json!({ "is_active": true }))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn delete_many_and_collections_are_isolated() {
        let store = seeded().await;
        store
            .insert(Collection::ScanRecords, json!({ "name": "A" }))
            .await
            .unwrap();
        let deleted = store
            .delete_many(Collection::CandidateProducts, &json!({ "name": "A" }))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count(Collection::ScanRecords, &json!({})).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_one_and_non_object_filter() {
        let store = seeded().await;
        let one = store
            .find_one(Collection::CandidateProducts, &json!({ "name": "C" }))
            .await
            .unwrap();
        assert_eq!(one.unwrap()["overall_score"], 70);
        assert!(matches!(
            store.count(Collection::CandidateProducts, &json!([1])).await,
            Err(DbError::InvalidFilter(_))
        ));
    }
}
