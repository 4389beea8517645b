//! Storefront diff engine: exact-name set difference between two pulls of a
//! competitor catalog, plus an optional price pass on the intersection.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use scout_core::{
    Account, AlertType, CatalogItem, ChangeAlert, ChangeSet, PriceChange, StorefrontSnapshot,
};
use scout_db::{competitors, DocumentStore};
use scout_scraper::{store_identity, StorefrontReader};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::PipelineError;

/// Price moves smaller than this are rounding noise.
const PRICE_EPSILON: f64 = 0.005;
const ALERT_PREVIEW_NAMES: usize = 5;

/// `added = new − old`, `removed = old − new`, joined by exact name.
///
/// `added` keeps catalog order of `new_items`; `removed` keeps the order of
/// `old_names`. Duplicate names count once.
#[must_use]
pub fn diff(old_names: &[String], new_items: &[CatalogItem]) -> ChangeSet {
    let old: HashSet<&str> = old_names.iter().map(String::as_str).collect();
    let new: HashSet<&str> = new_items.iter().map(|i| i.name.as_str()).collect();

    let mut added = Vec::new();
    let mut seen = HashSet::new();
    for item in new_items {
        if !old.contains(item.name.as_str()) && seen.insert(item.name.as_str()) {
            added.push(item.name.clone());
        }
    }
    let mut removed = Vec::new();
    let mut seen = HashSet::new();
    for name in old_names {
        if !new.contains(name.as_str()) && seen.insert(name.as_str()) {
            removed.push(name.clone());
        }
    }

    ChangeSet {
        added_count: added.len(),
        removed_count: removed.len(),
        has_changes: !added.is_empty() || !removed.is_empty(),
        added,
        removed,
    }
}

/// Products present in both pulls whose listed price moved.
#[must_use]
pub fn price_changes(old_prices: &BTreeMap<String, f64>, new_items: &[CatalogItem]) -> Vec<PriceChange> {
    let mut seen = HashSet::new();
    new_items
        .iter()
        .filter(|item| seen.insert(item.name.as_str()))
        .filter_map(|item| {
            let old_price = *old_prices.get(&item.name)?;
            let new_price = item.price?;
            ((new_price - old_price).abs() > PRICE_EPSILON).then(|| PriceChange {
                name: item.name.clone(),
                old_price,
                new_price,
            })
        })
        .collect()
}

fn price_map(items: &[CatalogItem]) -> BTreeMap<String, f64> {
    items
        .iter()
        .filter_map(|i| i.price.map(|p| (i.name.clone(), p)))
        .collect()
}

fn names(items: &[CatalogItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|i| seen.insert(i.name.as_str()))
        .map(|i| i.name.clone())
        .collect()
}

/// Outcome of checking one monitored store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreCheck {
    pub snapshot: StorefrontSnapshot,
    pub changes: ChangeSet,
    pub price_changes: Vec<PriceChange>,
    pub alerts: Vec<ChangeAlert>,
}

/// Competitor monitoring over the persistence collaborator.
pub struct StorefrontMonitor {
    reader: StorefrontReader,
    store: Arc<dyn DocumentStore>,
}

impl StorefrontMonitor {
    #[must_use]
    pub fn new(reader: StorefrontReader, store: Arc<dyn DocumentStore>) -> Self {
        Self { reader, store }
    }

    /// Pull one catalog without touching any snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Scraper`] if the first catalog page fails.
    pub async fn pull(&self, store_url: &str) -> Result<Vec<CatalogItem>, PipelineError> {
        Ok(self.reader.pull(store_url).await?)
    }

    /// Start monitoring `store_url` for `account`, recording its current
    /// catalog as the baseline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::CompetitorLimit`] if the tier allows no more stores.
    /// - [`PipelineError::AlreadyMonitored`] if the store is already active.
    /// - [`PipelineError::Scraper`] if the baseline pull fails.
    /// - [`PipelineError::Db`] on persistence failure.
    pub async fn add_store(
        &self,
        account: &Account,
        store_url: &str,
    ) -> Result<StorefrontSnapshot, PipelineError> {
        if let Some(limit) = account.tier.competitor_limit() {
            let active = competitors::count_active_snapshots(self.store.as_ref(), &account.id).await?;
            if usize::try_from(active).unwrap_or(usize::MAX) >= limit {
                return Err(PipelineError::CompetitorLimit {
                    tier: account.tier.as_str().to_string(),
                    limit,
                });
            }
        }

        let store_url = store_url.trim().trim_end_matches('/').to_string();
        let (store_id, store_name) = store_identity(&store_url);
        if competitors::find_snapshot(self.store.as_ref(), &account.id, &store_id)
            .await?
            .is_some()
        {
            return Err(PipelineError::AlreadyMonitored { store_url });
        }

        let items = self.reader.pull(&store_url).await?;
        let now = Utc::now();
        let snapshot = StorefrontSnapshot {
            id: Uuid::new_v4(),
            account_id: account.id.clone(),
            store_id,
            store_url,
            store_name,
            platform: "shopify".to_string(),
            product_names: names(&items),
            product_prices: price_map(&items),
            last_scanned: Some(now),
            new_products_count: 0,
            is_active: true,
            created_at: now,
        };
        competitors::save_snapshot(self.store.as_ref(), &snapshot).await?;
        tracing::info!(
            account = %account.id,
            store = %snapshot.store_name,
            products = snapshot.product_names.len(),
            "competitor store added"
        );
        Ok(snapshot)
    }

    /// Stop monitoring a store. The snapshot is deactivated, not deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StoreNotFound`] if no active snapshot matches.
    pub async fn remove_store(&self, account_id: &str, store_id: &str) -> Result<(), PipelineError> {
        if competitors::deactivate_snapshot(self.store.as_ref(), account_id, store_id).await? {
            Ok(())
        } else {
            Err(PipelineError::StoreNotFound {
                store_id: store_id.to_string(),
            })
        }
    }

    /// Pull a monitored store, diff it against its snapshot, overwrite the
    /// snapshot and persist any alerts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Scraper`] if the pull fails (the snapshot is
    /// left untouched), [`PipelineError::StoreNotFound`] if the store was
    /// removed before the result could be written, or [`PipelineError::Db`]
    /// on persistence failure.
    pub async fn check_store(&self, snapshot: &StorefrontSnapshot) -> Result<StoreCheck, PipelineError> {
        let items = self.reader.pull(&snapshot.store_url).await?;
        let changes = diff(&snapshot.product_names, &items);
        let moved = price_changes(&snapshot.product_prices, &items);

        let now = Utc::now();
        let mut updated = snapshot.clone();
        updated.product_names = names(&items);
        updated.product_prices = price_map(&items);
        updated.last_scanned = Some(now);
        updated.new_products_count += changes.added_count as u64;
        if !competitors::record_snapshot_check(self.store.as_ref(), &updated).await? {
            tracing::info!(store = %updated.store_name, "competitor store removed during check");
            return Err(PipelineError::StoreNotFound {
                store_id: updated.store_id.clone(),
            });
        }

        let mut alerts = Vec::new();
        if changes.added_count > 0 {
            alerts.push(new_product_alert(&updated, &changes, &items));
        }
        if !moved.is_empty() {
            alerts.push(price_change_alert(&updated, &moved));
        }
        for alert in &alerts {
            competitors::insert_alert(self.store.as_ref(), alert).await?;
        }

        tracing::info!(
            store = %updated.store_name,
            added = changes.added_count,
            removed = changes.removed_count,
            price_changes = moved.len(),
            "competitor store checked"
        );
        Ok(StoreCheck {
            snapshot: updated,
            changes,
            price_changes: moved,
            alerts,
        })
    }

    /// Check every active store of an account. A failing store is logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] only if the store list cannot be read.
    pub async fn check_account(&self, account_id: &str) -> Result<Vec<StoreCheck>, PipelineError> {
        let snapshots = competitors::list_active_snapshots(self.store.as_ref(), account_id).await?;
        let mut checks = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            match self.check_store(snapshot).await {
                Ok(check) => checks.push(check),
                Err(e) => tracing::warn!(
                    account = %account_id,
                    store = %snapshot.store_url,
                    error = %e,
                    "competitor check failed"
                ),
            }
        }
        Ok(checks)
    }
}

fn new_product_alert(
    snapshot: &StorefrontSnapshot,
    changes: &ChangeSet,
    items: &[CatalogItem],
) -> ChangeAlert {
    let n = changes.added_count;
    let preview = changes
        .added
        .iter()
        .take(ALERT_PREVIEW_NAMES)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let added: Vec<&CatalogItem> = items
        .iter()
        .filter(|i| changes.added.contains(&i.name))
        .collect();
    ChangeAlert {
        id: Uuid::new_v4(),
        account_id: snapshot.account_id.clone(),
        competitor_id: snapshot.id,
        competitor_name: snapshot.store_name.clone(),
        alert_type: AlertType::NewProduct,
        title: format!(
            "{} added {n} new product{}",
            snapshot.store_name,
            if n == 1 { "" } else { "s" }
        ),
        message: format!("New in {}: {preview}", snapshot.store_name),
        product_data: json!({ "added": added }),
        is_read: false,
        created_at: Utc::now(),
    }
}

fn price_change_alert(snapshot: &StorefrontSnapshot, moved: &[PriceChange]) -> ChangeAlert {
    let n = moved.len();
    let preview = moved
        .iter()
        .take(ALERT_PREVIEW_NAMES)
        .map(|c| format!("{} ${:.2} -> ${:.2}", c.name, c.old_price, c.new_price))
        .collect::<Vec<_>>()
        .join(", ");
    let data: Vec<_> = moved
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "old_price": c.old_price,
                "new_price": c.new_price,
                "change_percent": c.change_percent(),
            })
        })
        .collect();
    ChangeAlert {
        id: Uuid::new_v4(),
        account_id: snapshot.account_id.clone(),
        competitor_id: snapshot.id,
        competitor_name: snapshot.store_name.clone(),
        alert_type: AlertType::PriceChange,
        title: format!(
            "{} changed {n} price{}",
            snapshot.store_name,
            if n == 1 { "" } else { "s" }
        ),
        message: preview,
        product_data: json!({ "price_changes": data }),
        is_read: false,
        created_at: Utc::now(),
    }
}
