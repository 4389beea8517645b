//! Enrichment stage: one batched reasoning-service call that scores the
//! collected candidates, with the heuristic scorer as fallback.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use scout_core::{CandidateProduct, RawCandidate, ScanFilters, SourceTag};
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::heuristic::HeuristicScorer;
use crate::llm::ReasoningClient;
use crate::normalize::{validate, CandidateDraft};

pub const MAX_BATCH_SIZE: usize = 25;

const SYSTEM_PROMPT: &str = "You are a product research analyst for an online store owner. \
You score products that are already trending. You never invent products. \
Reply with a single JSON object and nothing else.";

/// Scored candidates plus whether the reasoning service produced them.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub products: Vec<CandidateProduct>,
    pub enriched: bool,
}

#[derive(Debug, Clone)]
pub struct Enricher {
    heuristic: HeuristicScorer,
    batch_size: usize,
}

impl Enricher {
    #[must_use]
    pub fn new(heuristic: HeuristicScorer, batch_size: usize) -> Self {
        Self {
            heuristic,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Score `raw` under `filters`.
    ///
    /// Empty input yields empty output without calling anything. Candidates
    /// whose name contains an excluded term are dropped first. With a
    /// reasoning client, one batch of at most `batch_size` candidates is
    /// sent; a failed call, an unparsable reply or a reply in which no
    /// element survives validation falls back to the heuristic scorer over
    /// every remaining candidate. Output is sorted by overall score.
    pub async fn enrich(
        &self,
        raw: &[RawCandidate],
        filters: &ScanFilters,
        reasoning: Option<&dyn ReasoningClient>,
    ) -> Enrichment {
        if raw.is_empty() {
            return Enrichment::default();
        }

        let kept: Vec<&RawCandidate> = raw.iter().filter(|c| !filters.excludes(&c.name)).collect();
        if kept.len() < raw.len() {
            tracing::debug!(
                excluded = raw.len() - kept.len(),
                "dropped candidates matching excluded terms"
            );
        }
        if kept.is_empty() {
            return Enrichment::default();
        }

        if let Some(client) = reasoning {
            let batch = interleave_by_source(&kept, self.batch_size);
            match self.enrich_batch(client, &batch, filters).await {
                Ok(products) if !products.is_empty() => {
                    tracing::info!(
                        sent = batch.len(),
                        kept = products.len(),
                        "reasoning service scored batch"
                    );
                    return Enrichment {
                        products: sorted(products),
                        enriched: true,
                    };
                }
                Ok(_) => {
                    tracing::warn!(
                        sent = batch.len(),
                        "reasoning reply contained no usable products, using heuristic scorer"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reasoning service failed, using heuristic scorer");
                }
            }
        }

        let products = kept
            .iter()
            .filter_map(|c| self.heuristic.score(c))
            .collect();
        Enrichment {
            products: sorted(products),
            enriched: false,
        }
    }

    async fn enrich_batch(
        &self,
        client: &dyn ReasoningClient,
        batch: &[&RawCandidate],
        filters: &ScanFilters,
    ) -> Result<Vec<CandidateProduct>, PipelineError> {
        let prompt = build_prompt(batch, filters);
        let reply = client.complete_json(SYSTEM_PROMPT, &prompt).await?;
        let items = reply_items(&reply)
            .ok_or_else(|| PipelineError::UnexpectedReply("no products array".to_string()))?;
        Ok(merge_reply(items, batch, filters))
    }
}

/// Round-robin across sources so one batch covers every source that yielded.
fn interleave_by_source<'a>(candidates: &[&'a RawCandidate], limit: usize) -> Vec<&'a RawCandidate> {
    let mut order: Vec<SourceTag> = Vec::new();
    let mut queues: HashMap<SourceTag, VecDeque<&'a RawCandidate>> = HashMap::new();
    for c in candidates {
        if !queues.contains_key(&c.source) {
            order.push(c.source);
        }
        queues.entry(c.source).or_default().push_back(*c);
    }

    let mut out = Vec::with_capacity(limit.min(candidates.len()));
    while out.len() < limit {
        let mut progressed = false;
        for source in &order {
            if out.len() == limit {
                break;
            }
            if let Some(c) = queues.get_mut(source).and_then(VecDeque::pop_front) {
                out.push(c);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    out
}

fn build_prompt(batch: &[&RawCandidate], filters: &ScanFilters) -> String {
    let listing: Vec<Value> = batch
        .iter()
        .map(|c| json!({ "name": c.name, "source": c.source, "metrics": c.metrics }))
        .collect();

    let mut prompt = String::from(
        "Score each of the products below as a dropshipping opportunity.\n\n\
         Rules:\n\
         - Use ONLY the products listed. Do not add, rename or merge products.\n\
         - Copy each name exactly as given.\n\
         - Estimate source_cost and recommended_price in USD from the metrics.\n\
         - Scores are integers from 0 to 100.\n",
    );
    for line in filters.prompt_constraints() {
        let _ = writeln!(prompt, "- {line}");
    }
    let _ = write!(
        prompt,
        "\nProducts:\n{}\n\n\
         Reply as {{\"products\": [{{\"name\", \"source\", \"category\", \"why_trending\", \
         \"estimated_views\", \"source_cost\", \"recommended_price\", \"margin_percent\", \
         \"trend_score\", \"overall_score\", \"competition_score\", \"profit_score\", \
         \"saturation\" (low|medium|high), \"active_ads\", \"trend_direction\" (up|down|stable), \
         \"trend_percent\", \"search_volume\", \"platforms\"}}]}}",
        serde_json::to_string(&listing).unwrap_or_default()
    );
    prompt
}

fn reply_items(reply: &Value) -> Option<&Vec<Value>> {
    match reply {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["products", "candidates", "results"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    }
}

/// Validate reply elements, keeping only names that were sent. Observed
/// facts (URLs, raw metrics, reach) come from the sent candidate.
fn merge_reply(
    items: &[Value],
    batch: &[&RawCandidate],
    filters: &ScanFilters,
) -> Vec<CandidateProduct> {
    let by_name: HashMap<String, &RawCandidate> = batch
        .iter()
        .map(|c| (c.name.trim().to_lowercase(), *c))
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let Ok(draft) = serde_json::from_value::<CandidateDraft>(item.clone()) else {
            tracing::debug!("skipping malformed reasoning element");
            continue;
        };
        let key = draft
            .name
            .as_deref()
            .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default();
        let Some(raw) = by_name.get(&key) else {
            tracing::debug!(name = %key, "dropping product not present in the batch");
            continue;
        };
        if !seen.insert(key) || filters.excludes(&raw.name) {
            continue;
        }

        let observed = CandidateDraft::from_raw(raw);
        let merged = CandidateDraft {
            name: Some(raw.name.clone()),
            source: Some(raw.source.as_str().to_string()),
            image_url: observed.image_url,
            product_url: observed.product_url,
            estimated_views: draft.estimated_views.or(observed.estimated_views),
            active_ads: draft.active_ads.or(observed.active_ads),
            trend_percent: draft.trend_percent.or(observed.trend_percent),
            search_volume: draft.search_volume.or(observed.search_volume),
            category: draft.category.or(observed.category),
            ..draft
        };
        if let Some(mut product) = validate(merged, raw.source) {
            product.raw_metrics = raw.metrics.clone();
            product.enriched = true;
            out.push(product);
        }
    }
    out
}

fn sorted(mut products: Vec<CandidateProduct>) -> Vec<CandidateProduct> {
    products.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));
    products
}
