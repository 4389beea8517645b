//! Ordered fallback chains of retrieval strategies.
//!
//! Every source is modelled as a list of [`Strategy`] objects evaluated by a
//! single "first non-empty wins" combinator, [`FallbackChain`]. A chain is
//! itself a [`Collector`]: it never returns an error, only a possibly-empty
//! list of candidates.

use std::collections::HashSet;

use async_trait::async_trait;
use scout_core::{RawCandidate, SourceTag};

use crate::error::ScraperError;

/// One way of retrieving candidates from a source.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short identifier used in logs and in `RawMetrics::strategy`.
    fn name(&self) -> &'static str;

    /// Attempt retrieval. An empty `Ok` and an `Err` both mean "try the next one".
    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError>;
}

/// A per-source component that never fails.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> SourceTag;

    /// Collect candidates, optionally narrowed to `category`. Every failure
    /// degrades to an empty list plus a log line.
    async fn collect(&self, category: Option<&str>) -> Vec<RawCandidate>;
}

/// Runs strategies in order and returns the first non-empty result.
pub struct FallbackChain {
    source: SourceTag,
    strategies: Vec<Box<dyn Strategy>>,
    max_items: usize,
}

impl FallbackChain {
    #[must_use]
    pub fn new(source: SourceTag) -> Self {
        Self {
            source,
            strategies: Vec::new(),
            max_items: 50,
        }
    }

    #[must_use]
    pub fn then(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Cap on candidates returned from the winning strategy.
    #[must_use]
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Evaluate the chain. Candidates from the winning strategy are trimmed,
    /// de-duplicated case-insensitively by name, tagged with the strategy
    /// name and capped at `max_items`.
    pub async fn run(&self, category: Option<&str>) -> Vec<RawCandidate> {
        for strategy in &self.strategies {
            match strategy.fetch(category).await {
                Ok(found) => {
                    let cleaned = finalize(found, strategy.name(), self.max_items);
                    if cleaned.is_empty() {
                        tracing::debug!(
                            source = %self.source,
                            strategy = strategy.name(),
                            "strategy returned no candidates, falling through"
                        );
                        continue;
                    }
                    tracing::info!(
                        source = %self.source,
                        strategy = strategy.name(),
                        count = cleaned.len(),
                        "strategy succeeded"
                    );
                    return cleaned;
                }
                Err(e) => {
                    tracing::warn!(
                        source = %self.source,
                        strategy = strategy.name(),
                        error = %e,
                        "strategy failed, falling through"
                    );
                }
            }
        }

        tracing::warn!(source = %self.source, "all strategies exhausted without candidates");
        Vec::new()
    }
}

#[async_trait]
impl Collector for FallbackChain {
    fn source(&self) -> SourceTag {
        self.source
    }

    async fn collect(&self, category: Option<&str>) -> Vec<RawCandidate> {
        self.run(category).await
    }
}

fn finalize(found: Vec<RawCandidate>, strategy: &str, max_items: usize) -> Vec<RawCandidate> {
    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|mut candidate| {
            let name = candidate.name.split_whitespace().collect::<Vec<_>>().join(" ");
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                return None;
            }
            candidate.name = name;
            if candidate.metrics.strategy.is_none() {
                candidate.metrics.strategy = Some(strategy.to_string());
            }
            Some(candidate)
        })
        .take(max_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Fixed {
        name: &'static str,
        names: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Strategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .names
                .iter()
                .map(|n| RawCandidate::new(SourceTag::Amazon, *n))
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
            Err(ScraperError::Blocked {
                domain: "www.amazon.com".to_string(),
                status: 503,
            })
        }
    }

    fn fixed(name: &'static str, names: Vec<&'static str>) -> (Fixed, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                name,
                names,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn error_then_empty_then_hit() {
        let (empty, _) = fixed("empty", vec![]);
        let (hit, _) = fixed("hit", vec!["Desk Lamp"]);
        let chain = FallbackChain::new(SourceTag::Amazon)
            .then(Failing)
            .then(empty)
            .then(hit);

        let out = chain.collect(None).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].metrics.strategy.as_deref(), Some("hit"));
    }

    #[tokio::test]
    async fn later_strategies_not_invoked_after_hit() {
        let (first, _) = fixed("first", vec!["Neck Fan"]);
        let (second, second_calls) = fixed("second", vec!["Other"]);
        let chain = FallbackChain::new(SourceTag::Tiktok).then(first).then(second);

        let out = chain.run(None).await;
        assert_eq!(out[0].name, "Neck Fan");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_returns_empty() {
        let (empty, _) = fixed("empty", vec![]);
        let chain = FallbackChain::new(SourceTag::Aliexpress).then(Failing).then(empty);
        assert!(chain.collect(Some("kitchen")).await.is_empty());
    }

    #[tokio::test]
    async fn blank_only_results_fall_through() {
        let (blank, _) = fixed("blank", vec!["   ", ""]);
        let (hit, _) = fixed("hit", vec!["Ice Roller"]);
        let chain = FallbackChain::new(SourceTag::Amazon).then(blank).then(hit);
        let out = chain.run(None).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Ice Roller");
    }

    #[tokio::test]
    async fn dedupes_case_insensitively_and_caps() {
        let (hit, _) = fixed("hit", vec!["Cloud  Slides", "cloud slides", "Galaxy Lamp", "Neck Fan"]);
        let chain = FallbackChain::new(SourceTag::Amazon).then(hit).max_items(2);
        let out = chain.run(None).await;
        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cloud Slides", "Galaxy Lamp"]);
    }

    #[test]
    fn strategy_names_keep_order() {
        let (a, _) = fixed("a", vec![]);
        let (b, _) = fixed("b", vec![]);
        let chain = FallbackChain::new(SourceTag::Amazon).then(a).then(b);
        assert_eq!(chain.strategy_names(), vec!["a", "b"]);
    }
}
