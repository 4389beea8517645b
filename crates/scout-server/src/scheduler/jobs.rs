//! Job bodies for the cadence scheduler: per-account scheduled scans and the
//! daily candidate rollover.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use scout_core::{should_scan, Account, AppConfig, ScanType, Tier};
use scout_db::{accounts, candidates, scans, DocumentStore};
use scout_pipeline::{OpenAiReasoningClient, ReasoningClient, ScoutEngine, StorefrontMonitor};
use tokio::sync::Mutex;

/// Outcome of one account's scheduled scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountScan {
    pub raw_count: usize,
    pub persisted: usize,
    pub stores_checked: usize,
    pub alerts: usize,
}

pub struct ScanJobs {
    store: Arc<dyn DocumentStore>,
    engine: ScoutEngine,
    monitor: StorefrontMonitor,
    config: Arc<AppConfig>,
    // Held for the whole of a due-check or rollover run.
    run_lock: Mutex<()>,
}

impl ScanJobs {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: ScoutEngine,
        monitor: StorefrontMonitor,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            engine,
            monitor,
            config,
            run_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scan every account whose tier interval has elapsed at `now`. Returns
    /// how many accounts were scanned successfully.
    ///
    /// A tick that fires while the previous run is still going is skipped.
    /// A failing account is logged and the loop moves on to the next one.
    pub async fn run_due_check(&self, now: DateTime<Utc>) -> usize {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("scheduler: previous run still in progress, skipping due-check");
            return 0;
        };

        let accounts = match accounts::list_accounts(self.store.as_ref()).await {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "scheduler: failed to load accounts");
                return 0;
            }
        };

        let due: Vec<&Account> = accounts
            .iter()
            .filter(|a| should_scan(a.last_scan_at, a.tier, now))
            .collect();
        if due.is_empty() {
            tracing::debug!(accounts = accounts.len(), "scheduler: no account is due");
            return 0;
        }
        tracing::info!(due = due.len(), "scheduler: accounts due for a scan");

        let mut scanned = 0;
        for account in due {
            match self.scan_account(account, now).await {
                Ok(outcome) => {
                    scanned += 1;
                    tracing::info!(
                        account = %account.id,
                        tier = account.tier.as_str(),
                        raw = outcome.raw_count,
                        persisted = outcome.persisted,
                        stores = outcome.stores_checked,
                        alerts = outcome.alerts,
                        "scheduler: account scanned"
                    );
                }
                Err(e) => {
                    tracing::error!(account = %account.id, error = %format!("{e:#}"), "scheduler: account scan failed");
                }
            }
        }
        scanned
    }

    /// Run a full scan for one account, persist its top candidates, record
    /// the scan and check the account's monitored stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the reasoning client for an account key cannot be
    /// built or a persistence step fails.
    pub async fn scan_account(&self, account: &Account, now: DateTime<Utc>) -> anyhow::Result<AccountScan> {
        let engine = self.engine_for(account)?;
        let result = engine.run_full_scan(&account.filters, None).await;

        let keep = persist_limit(account.tier, self.config.daily_top_n).min(result.products.len());
        let persisted = candidates::insert_candidates(
            self.store.as_ref(),
            &account.id,
            now.date_naive(),
            &result.products[..keep],
        )
        .await
        .context("persisting scheduled candidates")?;

        scans::insert_scan_record(
            self.store.as_ref(),
            &result.to_record(Some(&account.id), ScanType::Scheduled),
        )
        .await
        .context("recording scheduled scan")?;
        accounts::set_last_scan_at(self.store.as_ref(), &account.id, now)
            .await
            .context("updating last_scan_at")?;

        let checks = self
            .monitor
            .check_account(&account.id)
            .await
            .context("checking monitored stores")?;

        Ok(AccountScan {
            raw_count: result.raw_count,
            persisted,
            stores_checked: checks.len(),
            alerts: checks.iter().map(|c| c.alerts.len()).sum(),
        })
    }

    /// Archive every candidate row still active from the day before `now`.
    /// Returns the number of rows archived.
    pub async fn run_rollover(&self, now: DateTime<Utc>) -> u64 {
        let _guard = self.run_lock.lock().await;
        let yesterday = (now - Duration::days(1)).date_naive();
        match candidates::archive_scan_date(self.store.as_ref(), yesterday, now).await {
            Ok(archived) => {
                tracing::info!(date = %yesterday, archived, "scheduler: rollover complete");
                archived
            }
            Err(e) => {
                tracing::error!(date = %yesterday, error = %e, "scheduler: rollover failed");
                0
            }
        }
    }

    /// The shared engine, or a copy scoring through the account's own key.
    fn engine_for(&self, account: &Account) -> anyhow::Result<ScoutEngine> {
        match account.reasoning_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let client = OpenAiReasoningClient::with_key(&self.config, key)
                    .context("building account reasoning client")?;
                Ok(self
                    .engine
                    .clone()
                    .with_reasoning(Some(Arc::new(client) as Arc<dyn ReasoningClient>)))
            }
            _ => Ok(self.engine.clone()),
        }
    }
}

/// Candidates a scheduled scan keeps: the tier's daily limit, capped at
/// the configured top-N.
fn persist_limit(tier: Tier, top_n: usize) -> usize {
    tier.daily_product_limit().map_or(top_n, |limit| limit.min(top_n))
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
