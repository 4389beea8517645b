mod account;
mod scan;
mod store;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use scout_core::{Account, AppConfig};
use scout_db::{DbError, DocumentStore, MemoryStore, PgDocumentStore};
use scout_scraper::{FetchConfig, HttpFetcher};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::account::AccountCommands;
use crate::scan::ScanCommands;
use crate::store::StoreCommands;

#[derive(Debug, Parser)]
#[command(name = "scout-cli")]
#[command(about = "Product scout command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a product-discovery scan
    Scan {
        #[command(subcommand)]
        command: ScanCommands,
    },
    /// Assess one product against the ad archive
    Analyze {
        /// Product name to look up
        name: String,
    },
    /// Pull and monitor competitor storefronts
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
    /// Manage scout accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Today's candidates and scan counters for an account
    Status {
        #[arg(long)]
        account: String,

        /// Report date (YYYY-MM-DD); defaults to today in UTC
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// Maximum candidates to list
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Shared handles for one CLI invocation.
pub(crate) struct Runtime {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub fetcher: Arc<HttpFetcher>,
    pub persistent: bool,
}

impl Runtime {
    async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&FetchConfig::from_app_config(&config))?);
        let (store, persistent): (Arc<dyn DocumentStore>, bool) = if config.database_url.is_some() {
            let pool = scout_db::connect_pool_from_config(&config).await?;
            scout_db::run_migrations(&pool).await?;
            (Arc::new(PgDocumentStore::new(pool)), true)
        } else {
            tracing::debug!("DATABASE_URL not set; results are not persisted");
            (Arc::new(MemoryStore::new()), false)
        };
        Ok(Self {
            config,
            store,
            fetcher,
            persistent,
        })
    }

    /// Look up an account, failing with a readable message when it is unknown.
    pub async fn account(&self, account_id: &str) -> anyhow::Result<Account> {
        match scout_db::accounts::get_account(self.store.as_ref(), account_id).await {
            Ok(account) => Ok(account),
            Err(DbError::NotFound) => {
                anyhow::bail!("account '{account_id}' not found; create it with `scout-cli account upsert`")
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn require_persistence(&self, what: &str) -> anyhow::Result<()> {
        if self.persistent {
            Ok(())
        } else {
            anyhow::bail!("{what} needs DATABASE_URL to be set")
        }
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = scout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("scout-cli ready; run `scout-cli --help` for commands");
        return Ok(());
    };

    let rt = Runtime::open(config).await?;
    match command {
        Commands::Scan { command } => scan::run_scan(&rt, command).await,
        Commands::Analyze { name } => scan::run_analyze(&rt, &name).await,
        Commands::Store { command } => store::run_store(&rt, command).await,
        Commands::Account { command } => account::run_account(&rt, command).await,
        Commands::Status {
            account,
            date,
            limit,
        } => account::run_status(&rt, &account, date, limit).await,
    }
}

#[cfg(test)]
mod tests;
