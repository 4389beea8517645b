mod scheduler;

use std::sync::Arc;

use scout_db::{DocumentStore, PgDocumentStore};
use scout_pipeline::{ScoutEngine, StorefrontMonitor};
use scout_scraper::{FetchConfig, HttpFetcher, SourceEndpoints, StorefrontReader};
use tracing_subscriber::EnvFilter;

use crate::scheduler::{CadenceScheduler, ScanJobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(scout_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = scout_db::connect_pool_from_config(&config).await?;
    let applied = scout_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");
    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

    let fetcher = Arc::new(HttpFetcher::new(&FetchConfig::from_app_config(&config))?);
    let engine = ScoutEngine::from_app_config(&config, &fetcher, &SourceEndpoints::default())?;
    let monitor = StorefrontMonitor::new(StorefrontReader::new(Arc::clone(&fetcher)), Arc::clone(&store));
    tracing::info!(
        sources = engine.sources().len(),
        reasoning = engine.reasoning_enabled(),
        "scan engine ready"
    );

    let jobs = Arc::new(ScanJobs::new(store, engine, monitor, Arc::clone(&config)));
    let mut scheduler = CadenceScheduler::new(jobs);
    scheduler.start().await?;

    shutdown_signal().await;
    scheduler.stop().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
