//! `store` command handlers: one-off catalog pulls and competitor monitoring.

use std::sync::Arc;

use clap::Subcommand;
use scout_db::competitors;
use scout_pipeline::StorefrontMonitor;
use scout_scraper::{store_identity, StorefrontReader};
use serde_json::json;

use crate::{print_json, Runtime};

#[derive(Debug, Subcommand)]
pub enum StoreCommands {
    /// Print a storefront's current catalog
    Pull { url: String },
    /// Diff a monitored store against its snapshot, or record a baseline
    /// when it is not monitored yet
    Diff {
        url: String,

        #[arg(long)]
        account: String,
    },
    /// Stop monitoring a store
    Remove {
        /// Store id as printed by `store list`
        store_id: String,

        #[arg(long)]
        account: String,
    },
    /// List monitored stores
    List {
        #[arg(long)]
        account: String,
    },
    /// List change alerts
    Alerts {
        #[arg(long)]
        account: String,

        /// Include alerts already marked read
        #[arg(long)]
        all: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub(crate) async fn run_store(rt: &Runtime, command: StoreCommands) -> anyhow::Result<()> {
    let monitor = StorefrontMonitor::new(
        StorefrontReader::new(Arc::clone(&rt.fetcher)),
        Arc::clone(&rt.store),
    );

    match command {
        StoreCommands::Pull { url } => {
            let items = monitor.pull(&url).await?;
            let (store_id, store_name) = store_identity(&url);
            print_json(&json!({
                "store_id": store_id,
                "store_name": store_name,
                "product_count": items.len(),
                "products": items,
            }))
        }
        StoreCommands::Diff { url, account } => {
            rt.require_persistence("store diff")?;
            let account = rt.account(&account).await?;
            let (store_id, _) = store_identity(url.trim().trim_end_matches('/'));
            match competitors::find_snapshot(rt.store.as_ref(), &account.id, &store_id).await? {
                Some(snapshot) => print_json(&monitor.check_store(&snapshot).await?),
                None => {
                    let snapshot = monitor.add_store(&account, &url).await?;
                    print_json(&json!({ "baseline": true, "snapshot": snapshot }))
                }
            }
        }
        StoreCommands::Remove { store_id, account } => {
            rt.require_persistence("store remove")?;
            monitor.remove_store(&account, &store_id).await?;
            print_json(&json!({ "removed": store_id }))
        }
        StoreCommands::List { account } => {
            let stores = competitors::list_active_snapshots(rt.store.as_ref(), &account).await?;
            print_json(&stores)
        }
        StoreCommands::Alerts {
            account,
            all,
            limit,
        } => {
            let alerts = competitors::list_alerts(rt.store.as_ref(), &account, !all, limit).await?;
            print_json(&alerts)
        }
    }
}
