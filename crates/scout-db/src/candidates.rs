//! Dated candidate rows: one document per persisted `CandidateProduct`,
//! tied to an account and scan date.

use chrono::{DateTime, NaiveDate, Utc};
use scout_core::CandidateProduct;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::document::{Collection, DocumentStore, FindOptions, SortDirection};
use crate::DbError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCandidate {
    pub id: Uuid,
    pub account_id: String,
    pub scan_date: NaiveDate,
    pub is_active: bool,
    pub discovered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub product: CandidateProduct,
}

/// Persist `products` as active rows for `(account_id, scan_date)`.
///
/// # Errors
///
/// Returns [`DbError`] on the first failed insert.
pub async fn insert_candidates(
    store: &dyn DocumentStore,
    account_id: &str,
    scan_date: NaiveDate,
    products: &[CandidateProduct],
) -> Result<usize, DbError> {
    let now = Utc::now();
    for product in products {
        let row = StoredCandidate {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            scan_date,
            is_active: true,
            discovered_at: now,
            archived_at: None,
            product: product.clone(),
        };
        store
            .insert(Collection::CandidateProducts, serde_json::to_value(&row)?)
            .await?;
    }
    Ok(products.len())
}

/// Active rows for an account and date, highest overall score first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_active(
    store: &dyn DocumentStore,
    account_id: &str,
    scan_date: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<StoredCandidate>, DbError> {
    let filter = json!({ "account_id": account_id, "scan_date": scan_date, "is_active": true });
    let mut options = FindOptions::sorted("overall_score", SortDirection::Desc);
    options.limit = limit;
    decode(store.find(Collection::CandidateProducts, &filter, options).await?)
}

/// Every row for an account and date, active or archived.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_for_date(
    store: &dyn DocumentStore,
    account_id: &str,
    scan_date: NaiveDate,
) -> Result<Vec<StoredCandidate>, DbError> {
    let filter = json!({ "account_id": account_id, "scan_date": scan_date });
    decode(
        store
            .find(
                Collection::CandidateProducts,
                &filter,
                FindOptions::sorted("overall_score", SortDirection::Desc),
            )
            .await?,
    )
}

/// Mark every active row dated `scan_date` inactive, across all accounts.
/// Rows are never deleted.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub async fn archive_scan_date(
    store: &dyn DocumentStore,
    scan_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<u64, DbError> {
    store
        .update_many(
            Collection::CandidateProducts,
            &json!({ "scan_date": scan_date, "is_active": true }),
            &json!({ "is_active": false, "archived_at": now }),
        )
        .await
}

fn decode(docs: Vec<serde_json::Value>) -> Result<Vec<StoredCandidate>, DbError> {
    docs.into_iter()
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use scout_core::SourceTag;

    use super::*;
    use crate::MemoryStore;

    fn product(name: &str, score: u8) -> CandidateProduct {
        CandidateProduct {
            overall_score: score,
            ..CandidateProduct::new(name, SourceTag::Amazon)
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn active_rows_sorted_and_scoped_to_account() {
        let store = MemoryStore::new();
        let d = date("2026-10-19");
        insert_candidates(&store, "acct-1", d, &[product("Lamp", 40), product("Fan", 85)])
            .await
            .unwrap();
        insert_candidates(&store, "acct-2", d, &[product("Other", 99)])
            .await
            .unwrap();

        let rows = list_active(&store, "acct-1", d, None).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.product.name.as_str()).collect();
        assert_eq!(names, vec!["Fan", "Lamp"]);
        assert!(rows.iter().all(|r| r.is_active && r.scan_date == d));
    }

    #[tokio::test]
    async fn archive_marks_inactive_without_deleting() {
        let store = MemoryStore::new();
        let yesterday = date("2026-10-18");
        let today = date("2026-10-19");
        insert_candidates(&store, "a", yesterday, &[product("Old", 50)]).await.unwrap();
        insert_candidates(&store, "a", today, &[product("New", 60)]).await.unwrap();

        let archived = archive_scan_date(&store, yesterday, Utc::now()).await.unwrap();
        assert_eq!(archived, 1);

        assert!(list_active(&store, "a", yesterday, None).await.unwrap().is_empty());
        let kept = list_for_date(&store, "a", yesterday).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert!(!kept[0].is_active);
        assert!(kept[0].archived_at.is_some());
        assert_eq!(list_active(&store, "a", today, None).await.unwrap().len(), 1);
    }
}
