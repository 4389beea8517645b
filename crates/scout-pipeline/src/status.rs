//! Scan and report status queries over the persistence collaborator.

use chrono::{DateTime, NaiveDate, Utc};
use scout_core::Account;
use scout_db::{candidates, competitors, scans, DocumentStore, StoredCandidate};
use serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    AiEnriched,
    Heuristic,
}

impl ScanMode {
    /// An account key overrides the global one; either enables enrichment.
    #[must_use]
    pub fn for_account(account: Option<&Account>, global_key_configured: bool) -> Self {
        let account_key = account
            .and_then(|a| a.reasoning_api_key.as_deref())
            .is_some_and(|k| !k.trim().is_empty());
        if account_key || global_key_configured {
            ScanMode::AiEnriched
        } else {
            ScanMode::Heuristic
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub account_id: String,
    pub date: NaiveDate,
    pub scan_mode: ScanMode,
    pub products_today: usize,
    pub scans_today: u64,
    pub total_scans: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub monitored_stores: u64,
    pub unread_alerts: u64,
}

/// Active candidates for `today`, highest overall score first.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the query fails.
pub async fn todays_products(
    store: &dyn DocumentStore,
    account_id: &str,
    today: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<StoredCandidate>, PipelineError> {
    Ok(candidates::list_active(store, account_id, today, limit).await?)
}

/// Every row persisted for `date`, including archived ones.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the query fails.
pub async fn archive_for_date(
    store: &dyn DocumentStore,
    account_id: &str,
    date: NaiveDate,
) -> Result<Vec<StoredCandidate>, PipelineError> {
    Ok(candidates::list_for_date(store, account_id, date).await?)
}

/// # Errors
///
/// Returns [`PipelineError::Db`] if any query fails.
pub async fn status_report(
    store: &dyn DocumentStore,
    account: &Account,
    today: NaiveDate,
    global_key_configured: bool,
) -> Result<StatusReport, PipelineError> {
    let products_today = candidates::list_active(store, &account.id, today, None).await?.len();
    let scans_today = scans::count_scans(store, &account.id, Some(today)).await?;
    let total_scans = scans::count_scans(store, &account.id, None).await?;
    let monitored_stores = competitors::count_active_snapshots(store, &account.id).await?;
    let unread_alerts = competitors::count_unread_alerts(store, &account.id).await?;

    Ok(StatusReport {
        account_id: account.id.clone(),
        date: today,
        scan_mode: ScanMode::for_account(Some(account), global_key_configured),
        products_today,
        scans_today,
        total_scans,
        last_scan_at: account.last_scan_at,
        monitored_stores,
        unread_alerts,
    })
}
