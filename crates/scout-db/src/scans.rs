//! Append-only scan audit rows.

use chrono::NaiveDate;
use scout_core::ScanRecord;
use serde_json::json;

use crate::document::{Collection, DocumentStore, FindOptions, SortDirection};
use crate::DbError;

/// # Errors
///
/// Returns [`DbError`] if the record cannot be encoded or written.
pub async fn insert_scan_record(store: &dyn DocumentStore, record: &ScanRecord) -> Result<(), DbError> {
    store
        .insert(Collection::ScanRecords, serde_json::to_value(record)?)
        .await
}

/// Number of scans recorded for an account, optionally on one date.
///
/// # Errors
///
/// Returns [`DbError`] if the count fails.
pub async fn count_scans(
    store: &dyn DocumentStore,
    account_id: &str,
    scan_date: Option<NaiveDate>,
) -> Result<u64, DbError> {
    let filter = match scan_date {
        Some(date) => json!({ "account_id": account_id, "scan_date": date }),
        None => json!({ "account_id": account_id }),
    };
    store.count(Collection::ScanRecords, &filter).await
}

/// Most recent scans for an account, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn recent_scans(
    store: &dyn DocumentStore,
    account_id: &str,
    limit: usize,
) -> Result<Vec<ScanRecord>, DbError> {
    store
        .find(
            Collection::ScanRecords,
            &json!({ "account_id": account_id }),
            FindOptions::sorted("created_at", SortDirection::Desc).limit(limit),
        )
        .await?
        .into_iter()
        .map(|d| serde_json::from_value(d).map_err(DbError::from))
        .collect()
}
