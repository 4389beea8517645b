//! Scheduler-facing account state.

use chrono::{DateTime, Utc};
use scout_core::Account;
use serde_json::json;

use crate::document::{Collection, DocumentStore, FindOptions};
use crate::DbError;

/// Insert or replace an account document.
///
/// # Errors
///
/// Returns [`DbError`] if the write fails.
pub async fn upsert_account(store: &dyn DocumentStore, account: &Account) -> Result<(), DbError> {
    let doc = serde_json::to_value(account)?;
    let filter = json!({ "id": account.id });
    if store.update_many(Collection::Accounts, &filter, &doc).await? == 0 {
        store.insert(Collection::Accounts, doc).await?;
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_accounts(store: &dyn DocumentStore) -> Result<Vec<Account>, DbError> {
    store
        .find(Collection::Accounts, &json!({}), FindOptions::default())
        .await?
        .into_iter()
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .collect()
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no account has this id.
pub async fn get_account(store: &dyn DocumentStore, account_id: &str) -> Result<Account, DbError> {
    let doc = store
        .find_one(Collection::Accounts, &json!({ "id": account_id }))
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(serde_json::from_value(doc)?)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no account has this id.
pub async fn set_last_scan_at(
    store: &dyn DocumentStore,
    account_id: &str,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let updated = store
        .update_many(
            Collection::Accounts,
            &json!({ "id": account_id }),
            &json!({ "last_scan_at": at }),
        )
        .await?;
    if updated == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
