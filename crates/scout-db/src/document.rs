//! The persistence collaborator: schemaless documents grouped into logical
//! collections, addressed by containment filters.
//!
//! A filter is a JSON object; a document matches when it *contains* the
//! filter, with Postgres `@>` semantics (objects match key-by-key, arrays
//! match when every filter element is contained in some document element,
//! scalars match by equality). Updates merge the top-level keys of a `set`
//! object into each matching document.

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    CandidateProducts,
    ScanRecords,
    StorefrontSnapshots,
    ChangeAlerts,
    Accounts,
}

impl Collection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CandidateProducts => "candidate_products",
            Self::ScanRecords => "scan_records",
            Self::StorefrontSnapshots => "storefront_snapshots",
            Self::ChangeAlerts => "change_alerts",
            Self::Accounts => "accounts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Top-level field to order by.
    pub sort: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl FindOptions {
    #[must_use]
    pub fn sorted(field: &str, direction: SortDirection) -> Self {
        Self {
            sort: Some((field.to_string(), direction)),
            limit: None,
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend rejects the write.
    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), DbError>;

    /// # Errors
    ///
    /// Returns [`DbError::InvalidFilter`] for a non-object filter, or the
    /// backend error.
    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
        options: FindOptions,
    ) -> Result<Vec<Value>, DbError>;

    /// Merge `set` into every matching document. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidFilter`] if `filter` or `set` is not an
    /// object, or the backend error.
    async fn update_many(
        &self,
        collection: Collection,
        filter: &Value,
        set: &Value,
    ) -> Result<u64, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError::InvalidFilter`] for a non-object filter, or the
    /// backend error.
    async fn delete_many(&self, collection: Collection, filter: &Value) -> Result<u64, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError::InvalidFilter`] for a non-object filter, or the
    /// backend error.
    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, DbError>;

    /// # Errors
    ///
    /// Same as [`DocumentStore::find`].
    async fn find_one(&self, collection: Collection, filter: &Value) -> Result<Option<Value>, DbError> {
        let mut found = self
            .find(collection, filter, FindOptions::default().limit(1))
            .await?;
        Ok(found.pop())
    }
}

pub(crate) fn require_object(value: &Value, what: &str) -> Result<(), DbError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(DbError::InvalidFilter(format!("{what} must be a JSON object")))
    }
}

/// JSON containment with Postgres `@>` semantics.
pub(crate) fn contains(doc: &Value, filter: &Value) -> bool {
    match (doc, filter) {
        (Value::Object(d), Value::Object(f)) => f
            .iter()
            .all(|(k, fv)| d.get(k).is_some_and(|dv| contains(dv, fv))),
        (Value::Array(d), Value::Array(f)) => {
            f.iter().all(|fv| d.iter().any(|dv| contains(dv, fv)))
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

/// Total order over JSON values, close to `jsonb` ordering: null < bool <
/// number < string < array < object, numbers compared numerically.
pub(crate) fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn containment_matches_nested_objects_and_arrays() {
        let doc = json!({ "a": 1, "b": { "c": "x", "d": 2 }, "tags": ["p", "q"] });
        assert!(contains(&doc, &json!({})));
        assert!(contains(&doc, &json!({ "a": 1.0 })));
        assert!(contains(&doc, &json!({ "b": { "c": "x" } })));
        assert!(contains(&doc, &json!({ "tags": ["q"] })));
        assert!(!contains(&doc, &json!({ "tags": ["z"] })));
        assert!(!contains(&doc, &json!({ "missing": null })));
    }

    #[test]
    fn compare_orders_numbers_numerically() {
        assert_eq!(compare(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare(&json!("9"), &json!("10")), Ordering::Greater);
        assert_eq!(compare(&Value::Null, &json!(0)), Ordering::Less);
    }
}
