//! `scan` and `analyze` command handlers.

use std::sync::Arc;

use clap::Subcommand;
use scout_core::{ScanFilters, ScanResult, ScanType, SourceTag};
use scout_pipeline::{OpenAiReasoningClient, ProductAnalyzer, ReasoningClient, ScoutEngine};
use scout_scraper::{ad_archive, SourceEndpoints};

use crate::{print_json, Runtime};

#[derive(Debug, Subcommand)]
pub enum ScanCommands {
    /// Scan every source concurrently
    Full {
        /// Narrow collectors that support it to a category
        #[arg(long)]
        category: Option<String>,

        /// Use this account's filters and reasoning key, and record the scan
        #[arg(long)]
        account: Option<String>,
    },
    /// Scan one source
    Source {
        /// Source tag, e.g. `amazon`, `tiktok`, `meta_ads`
        #[arg(value_parser = parse_source)]
        source: SourceTag,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        account: Option<String>,
    },
}

fn parse_source(s: &str) -> Result<SourceTag, String> {
    s.parse()
}

pub(crate) async fn run_scan(rt: &Runtime, command: ScanCommands) -> anyhow::Result<()> {
    let (scan_type, source, category, account_id) = match command {
        ScanCommands::Full { category, account } => (ScanType::Full, None, category, account),
        ScanCommands::Source {
            source,
            category,
            account,
        } => (ScanType::Source, Some(source), category, account),
    };

    let account = match account_id.as_deref() {
        Some(id) => Some(rt.account(id).await?),
        None => None,
    };
    let filters = account.as_ref().map(|a| a.filters.clone()).unwrap_or_default();
    let key = account.as_ref().and_then(|a| a.reasoning_api_key.as_deref());
    let engine = engine(rt, key)?;

    let result = execute(&engine, source, &filters, category.as_deref()).await?;
    if rt.persistent {
        scout_db::scans::insert_scan_record(
            rt.store.as_ref(),
            &result.to_record(account_id.as_deref(), scan_type),
        )
        .await?;
    }
    print_json(&result)
}

async fn execute(
    engine: &ScoutEngine,
    source: Option<SourceTag>,
    filters: &ScanFilters,
    category: Option<&str>,
) -> anyhow::Result<ScanResult> {
    Ok(match source {
        Some(source) => engine.scan_source(source, filters, category).await?,
        None => engine.run_full_scan(filters, category).await,
    })
}

pub(crate) async fn run_analyze(rt: &Runtime, name: &str) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("product name must not be empty");
    }
    let analyzer = ProductAnalyzer::new(
        ad_archive(&rt.fetcher, &SourceEndpoints::default()),
        reasoning(rt, None)?,
    );
    print_json(&analyzer.analyze_product(name).await)
}

/// Engine over the default sources, scoring through the account key when
/// given and the global key otherwise.
fn engine(rt: &Runtime, account_key: Option<&str>) -> anyhow::Result<ScoutEngine> {
    let engine = ScoutEngine::from_app_config(&rt.config, &rt.fetcher, &SourceEndpoints::default())?;
    Ok(engine.with_reasoning(reasoning(rt, account_key)?))
}

fn reasoning(rt: &Runtime, account_key: Option<&str>) -> anyhow::Result<Option<Arc<dyn ReasoningClient>>> {
    let client = match account_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Some(OpenAiReasoningClient::with_key(&rt.config, key)?),
        None => OpenAiReasoningClient::from_app_config(&rt.config)?,
    };
    Ok(client.map(|c| Arc::new(c) as Arc<dyn ReasoningClient>))
}
