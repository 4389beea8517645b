//! The scan orchestrator: concurrent collector fan-out, then enrichment and
//! image resolution over the merged candidates.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use scout_core::{AppConfig, RawCandidate, ScanFilters, ScanResult, SourceTag};
use scout_scraper::{default_collectors, default_image_lookups, Collector, HttpFetcher, Seeds, SourceEndpoints};

use crate::enrich::Enricher;
use crate::error::PipelineError;
use crate::heuristic::HeuristicScorer;
use crate::images::ImageResolver;
use crate::llm::{OpenAiReasoningClient, ReasoningClient};

pub const NO_DATA_MESSAGE: &str =
    "No data available from any source. Every collector returned empty results.";
const ALL_FILTERED_MESSAGE: &str = "Every collected candidate was excluded by the scan filters.";

/// Owns one scan run end-to-end. Cheap to clone; keeps no state between runs.
#[derive(Clone)]
pub struct ScoutEngine {
    collectors: Vec<Arc<dyn Collector>>,
    enricher: Arc<Enricher>,
    resolver: Arc<ImageResolver>,
    reasoning: Option<Arc<dyn ReasoningClient>>,
}

impl ScoutEngine {
    #[must_use]
    pub fn new(
        collectors: Vec<Arc<dyn Collector>>,
        enricher: Enricher,
        resolver: ImageResolver,
    ) -> Self {
        Self {
            collectors,
            enricher: Arc::new(enricher),
            resolver: Arc::new(resolver),
            reasoning: None,
        }
    }

    /// Wire the six default collectors, the default image lookups and the
    /// globally configured reasoning client.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the reasoning HTTP client cannot be
    /// built.
    pub fn from_app_config(
        config: &AppConfig,
        fetcher: &Arc<HttpFetcher>,
        endpoints: &SourceEndpoints,
    ) -> Result<Self, PipelineError> {
        let collectors = default_collectors(fetcher, endpoints, &Seeds::from_app_config(config));
        let enricher = Enricher::new(HeuristicScorer::from_app_config(config), config.enrich_batch_size);
        let resolver = ImageResolver::new(
            default_image_lookups(fetcher, endpoints),
            config.image_concurrency,
        );
        let reasoning = OpenAiReasoningClient::from_app_config(config)?
            .map(|c| Arc::new(c) as Arc<dyn ReasoningClient>);
        Ok(Self::new(collectors, enricher, resolver).with_reasoning(reasoning))
    }

    /// Same engine, scoring through `reasoning` (or the heuristic when `None`).
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: Option<Arc<dyn ReasoningClient>>) -> Self {
        self.reasoning = reasoning;
        self
    }

    #[must_use]
    pub fn reasoning_enabled(&self) -> bool {
        self.reasoning.is_some()
    }

    #[must_use]
    pub fn sources(&self) -> Vec<SourceTag> {
        self.collectors.iter().map(|c| c.source()).collect()
    }

    /// Run every collector concurrently and score the merged candidates.
    ///
    /// Never fails: a collector that panics or yields nothing contributes
    /// zero to `source_stats`. When no collector yields anything the result
    /// has no products and `no_data` set.
    pub async fn run_full_scan(&self, filters: &ScanFilters, category: Option<&str>) -> ScanResult {
        self.run(self.collectors.clone(), filters, category).await
    }

    /// [`ScoutEngine::run_full_scan`] narrowed to one source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownSource`] if no collector is wired for
    /// `source`.
    pub async fn scan_source(
        &self,
        source: SourceTag,
        filters: &ScanFilters,
        category: Option<&str>,
    ) -> Result<ScanResult, PipelineError> {
        let selected: Vec<_> = self
            .collectors
            .iter()
            .filter(|c| c.source() == source)
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(PipelineError::UnknownSource(source.to_string()));
        }
        Ok(self.run(selected, filters, category).await)
    }

    async fn run(
        &self,
        collectors: Vec<Arc<dyn Collector>>,
        filters: &ScanFilters,
        category: Option<&str>,
    ) -> ScanResult {
        let (raw, source_stats) = gather(collectors, category).await;
        let raw_count = raw.len();
        tracing::info!(raw_count, sources = source_stats.len(), "collectors finished");

        if raw.is_empty() {
            tracing::warn!("no collector produced candidates");
            return ScanResult {
                success: true,
                products: Vec::new(),
                source_stats,
                raw_count: 0,
                product_count: 0,
                enriched: false,
                no_data: true,
                message: Some(NO_DATA_MESSAGE.to_string()),
                scanned_at: Utc::now(),
            };
        }

        let enrichment = self
            .enricher
            .enrich(&raw, filters, self.reasoning.as_deref())
            .await;
        let products = self.resolver.resolve_images(enrichment.products).await;
        let message = products.is_empty().then(|| ALL_FILTERED_MESSAGE.to_string());

        tracing::info!(
            raw_count,
            product_count = products.len(),
            enriched = enrichment.enriched,
            "scan complete"
        );
        ScanResult {
            success: true,
            product_count: products.len(),
            products,
            source_stats,
            raw_count,
            enriched: enrichment.enriched,
            no_data: false,
            message,
            scanned_at: Utc::now(),
        }
    }
}

/// Scatter/gather over collectors. Each runs in its own task so a panic is
/// isolated to its source.
async fn gather(
    collectors: Vec<Arc<dyn Collector>>,
    category: Option<&str>,
) -> (Vec<RawCandidate>, BTreeMap<SourceTag, usize>) {
    let handles: Vec<_> = collectors
        .into_iter()
        .map(|collector| {
            let source = collector.source();
            let category = category.map(str::to_owned);
            let handle =
                tokio::spawn(async move { collector.collect(category.as_deref()).await });
            (source, handle)
        })
        .collect();

    let mut raw = Vec::new();
    let mut stats = BTreeMap::new();
    for (source, handle) in handles {
        let found = match handle.await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(source = %source, error = %e, "collector task failed");
                Vec::new()
            }
        };
        *stats.entry(source).or_insert(0) += found.len();
        raw.extend(found);
    }
    (raw, stats)
}
