//! Monitored storefront snapshots and the change alerts derived from them.

use scout_core::{ChangeAlert, StorefrontSnapshot};
use serde_json::json;
use uuid::Uuid;

use crate::document::{Collection, DocumentStore, FindOptions, SortDirection};
use crate::DbError;

/// The live snapshot of `store_id` for an account, if monitored.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row does not decode.
pub async fn find_snapshot(
    store: &dyn DocumentStore,
    account_id: &str,
    store_id: &str,
) -> Result<Option<StorefrontSnapshot>, DbError> {
    let filter = json!({ "account_id": account_id, "store_id": store_id, "is_active": true });
    store
        .find_one(Collection::StorefrontSnapshots, &filter)
        .await?
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .transpose()
}

/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_active_snapshots(
    store: &dyn DocumentStore,
    account_id: &str,
) -> Result<Vec<StorefrontSnapshot>, DbError> {
    store
        .find(
            Collection::StorefrontSnapshots,
            &json!({ "account_id": account_id, "is_active": true }),
            FindOptions::sorted("created_at", SortDirection::Asc),
        )
        .await?
        .into_iter()
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .collect()
}

/// # Errors
///
/// Returns [`DbError`] if the count fails.
pub async fn count_active_snapshots(store: &dyn DocumentStore, account_id: &str) -> Result<u64, DbError> {
    store
        .count(
            Collection::StorefrontSnapshots,
            &json!({ "account_id": account_id, "is_active": true }),
        )
        .await
}

/// Overwrite the snapshot with the same `id`, inserting it if absent. Used
/// when a store is first added.
///
/// # Errors
///
/// Returns [`DbError`] if the write fails.
pub async fn save_snapshot(store: &dyn DocumentStore, snapshot: &StorefrontSnapshot) -> Result<(), DbError> {
    let doc = serde_json::to_value(snapshot)?;
    let filter = json!({ "id": snapshot.id });
    if store
        .update_many(Collection::StorefrontSnapshots, &filter, &doc)
        .await?
        == 0
    {
        store.insert(Collection::StorefrontSnapshots, doc).await?;
    }
    Ok(())
}

/// Write back the result of a catalog check. Only a still-active snapshot
/// is touched and `is_active` is never written. Returns `false` if the
/// store was deactivated in the meantime.
///
/// # Errors
///
/// Returns [`DbError`] if the snapshot cannot be encoded or the update fails.
pub async fn record_snapshot_check(
    store: &dyn DocumentStore,
    snapshot: &StorefrontSnapshot,
) -> Result<bool, DbError> {
    let mut set = serde_json::to_value(snapshot)?;
    if let Some(fields) = set.as_object_mut() {
        fields.remove("is_active");
        fields.remove("id");
    }
    let updated = store
        .update_many(
            Collection::StorefrontSnapshots,
            &json!({ "id": snapshot.id, "is_active": true }),
            &set,
        )
        .await?;
    Ok(updated > 0)
}

/// Soft-deactivate a monitored store. Returns `false` if it was not active.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub async fn deactivate_snapshot(
    store: &dyn DocumentStore,
    account_id: &str,
    store_id: &str,
) -> Result<bool, DbError> {
    let updated = store
        .update_many(
            Collection::StorefrontSnapshots,
            &json!({ "account_id": account_id, "store_id": store_id, "is_active": true }),
            &json!({ "is_active": false }),
        )
        .await?;
    Ok(updated > 0)
}

/// # Errors
///
/// Returns [`DbError`] if the alert cannot be encoded or written.
pub async fn insert_alert(store: &dyn DocumentStore, alert: &ChangeAlert) -> Result<(), DbError> {
    store
        .insert(Collection::ChangeAlerts, serde_json::to_value(alert)?)
        .await
}

/// # Errors
///
/// Returns [`DbError`] if the count fails.
pub async fn count_unread_alerts(store: &dyn DocumentStore, account_id: &str) -> Result<u64, DbError> {
    store
        .count(
            Collection::ChangeAlerts,
            &json!({ "account_id": account_id, "is_read": false }),
        )
        .await
}

/// Alerts for an account, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_alerts(
    store: &dyn DocumentStore,
    account_id: &str,
    unread_only: bool,
    limit: usize,
) -> Result<Vec<ChangeAlert>, DbError> {
    let filter = if unread_only {
        json!({ "account_id": account_id, "is_read": false })
    } else {
        json!({ "account_id": account_id })
    };
    store
        .find(
            Collection::ChangeAlerts,
            &filter,
            FindOptions::sorted("created_at", SortDirection::Desc).limit(limit),
        )
        .await?
        .into_iter()
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .collect()
}

/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub async fn mark_alert_read(store: &dyn DocumentStore, alert_id: Uuid) -> Result<bool, DbError> {
    let updated = store
        .update_many(
            Collection::ChangeAlerts,
            &json!({ "id": alert_id }),
            &json!({ "is_read": true }),
        )
        .await?;
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use scout_core::AlertType;

    use super::*;
    use crate::MemoryStore;

    fn snapshot(account: &str, store_id: &str) -> StorefrontSnapshot {
        StorefrontSnapshot {
            id: Uuid::new_v4(),
            account_id: account.to_string(),
            store_id: store_id.to_string(),
            store_url: format!("https://{store_id}.example.com"),
            store_name: store_id.to_string(),
            platform: "shopify".to_string(),
            product_names: vec!["Lamp".to_string()],
            product_prices: BTreeMap::from([("Lamp".to_string(), 19.5)]),
            last_scanned: None,
            new_products_count: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_overwrites_in_place() {
        let store = MemoryStore::new();
        let mut snap = snapshot("a", "abcd1234");
        save_snapshot(&store, &snap).await.unwrap();

        snap.product_names.push("Fan".to_string());
        snap.new_products_count = 1;
        save_snapshot(&store, &snap).await.unwrap();

        assert_eq!(count_active_snapshots(&store, "a").await.unwrap(), 1);
        let found = find_snapshot(&store, "a", "abcd1234").await.unwrap().unwrap();
        assert_eq!(found.product_names, vec!["Lamp", "Fan"]);
        assert_eq!(found.new_products_count, 1);
    }

    #[tokio::test]
    async fn deactivate_is_soft() {
        let store = MemoryStore::new();
        save_snapshot(&store, &snapshot("a", "s1")).await.unwrap();

        assert!(deactivate_snapshot(&store, "a", "s1").await.unwrap());
        assert!(!deactivate_snapshot(&store, "a", "s1").await.unwrap());
        assert!(find_snapshot(&store, "a", "s1").await.unwrap().is_none());
        assert!(list_active_snapshots(&store, "a").await.unwrap().is_empty());
        assert_eq!(
            store
                .count(Collection::StorefrontSnapshots, &json!({ "store_id": "s1" }))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn check_write_skips_deactivated_snapshot() {
        let store = MemoryStore::new();
        let mut snap = snapshot("a", "s2");
        save_snapshot(&store, &snap).await.unwrap();
        assert!(deactivate_snapshot(&store, "a", "s2").await.unwrap());

        snap.product_names.push("Fan".to_string());
        assert!(!record_snapshot_check(&store, &snap).await.unwrap());
        assert_eq!(count_active_snapshots(&store, "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn check_write_updates_active_snapshot() {
        let store = MemoryStore::new();
        let mut snap = snapshot("a", "s3");
        save_snapshot(&store, &snap).await.unwrap();

        snap.product_names = vec!["Fan".to_string()];
        assert!(record_snapshot_check(&store, &snap).await.unwrap());
        let found = find_snapshot(&store, "a", "s3").await.unwrap().unwrap();
        assert_eq!(found.product_names, vec!["Fan"]);
    }

    #[tokio::test]
    async fn unread_alerts_filter() {
        let store = MemoryStore::new();
        let alert = ChangeAlert {
            id: Uuid::new_v4(),
            account_id: "a".to_string(),
            competitor_id: Uuid::new_v4(),
            competitor_name: "Glow".to_string(),
            alert_type: AlertType::NewProduct,
            title: "New products at Glow".to_string(),
            message: "1 new product(s) detected".to_string(),
            product_data: json!({ "new_products": ["Fan"] }),
            is_read: false,
            created_at: Utc::now(),
        };
        insert_alert(&store, &alert).await.unwrap();
        assert_eq!(list_alerts(&store, "a", true, 10).await.unwrap().len(), 1);

        assert!(mark_alert_read(&store, alert.id).await.unwrap());
        assert!(list_alerts(&store, "a", true, 10).await.unwrap().is_empty());
        assert_eq!(list_alerts(&store, "a", false, 10).await.unwrap().len(), 1);
    }
}
