//! `account` and `status` command handlers.

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use scout_core::{Account, ScanFilters, Tier};
use scout_db::{accounts, DbError};
use scout_pipeline::status;
use serde_json::json;

use crate::{print_json, Runtime};

#[derive(Debug, Subcommand)]
pub enum AccountCommands {
    /// Create an account or replace its tier, key and filters
    Upsert {
        id: String,

        /// free, sniper, elite, agency or enterprise
        #[arg(long, default_value = "free")]
        tier: String,

        /// Per-account reasoning-service key
        #[arg(long, env = "SCOUT_ACCOUNT_REASONING_KEY", hide_env_values = true)]
        reasoning_key: Option<String>,

        #[arg(long)]
        min_sell_price: Option<f64>,

        #[arg(long)]
        max_source_cost: Option<f64>,

        #[arg(long)]
        min_margin: Option<f64>,

        #[arg(long)]
        max_ads: Option<u64>,

        /// Repeatable
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Drop candidates whose name contains this term; repeatable
        #[arg(long = "exclude")]
        excluded_terms: Vec<String>,
    },
    /// List accounts
    List,
}

pub(crate) async fn run_account(rt: &Runtime, command: AccountCommands) -> anyhow::Result<()> {
    match command {
        AccountCommands::Upsert {
            id,
            tier,
            reasoning_key,
            min_sell_price,
            max_source_cost,
            min_margin,
            max_ads,
            categories,
            excluded_terms,
        } => {
            rt.require_persistence("account upsert")?;
            let last_scan_at = match accounts::get_account(rt.store.as_ref(), &id).await {
                Ok(existing) => existing.last_scan_at,
                Err(DbError::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            let account = Account {
                id,
                tier: Tier::parse_lenient(&tier),
                last_scan_at,
                filters: ScanFilters {
                    min_sell_price,
                    max_source_cost,
                    min_margin_percent: min_margin,
                    max_competing_ads: max_ads,
                    categories,
                    excluded_terms,
                },
                reasoning_api_key: reasoning_key.filter(|k| !k.trim().is_empty()),
            };
            accounts::upsert_account(rt.store.as_ref(), &account).await?;
            print_json(&json!({
                "id": account.id,
                "tier": account.tier.as_str(),
                "has_reasoning_key": account.reasoning_api_key.is_some(),
                "filters": account.filters,
            }))
        }
        AccountCommands::List => {
            let listed: Vec<_> = accounts::list_accounts(rt.store.as_ref())
                .await?
                .into_iter()
                .map(|a| {
                    json!({
                        "id": a.id,
                        "tier": a.tier.as_str(),
                        "last_scan_at": a.last_scan_at,
                        "has_reasoning_key": a.reasoning_api_key.is_some(),
                    })
                })
                .collect();
            print_json(&listed)
        }
    }
}

pub(crate) async fn run_status(
    rt: &Runtime,
    account_id: &str,
    date: Option<NaiveDate>,
    limit: usize,
) -> anyhow::Result<()> {
    let account = rt.account(account_id).await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let report = status::status_report(rt.store.as_ref(), &account, date, rt.config.reasoning_enabled()).await?;
    let products = status::todays_products(rt.store.as_ref(), &account.id, date, Some(limit)).await?;
    print_json(&json!({
        "status": report,
        "products": products,
    }))
}
