//! Search-interest collector.
//!
//! Strategy order:
//! 1. Related queries (rising first, then top) for each seed keyword, via the
//!    explore/widget API pair.
//! 2. Daily trending-searches RSS feed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{RawCandidate, RawMetrics, SourceTag};
use serde_json::Value;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{json_count, normalize_image_url, parse_compact_count};
use crate::rss::parse_feed;
use crate::strategy::{FallbackChain, Strategy};

pub const BASE_URL: &str = "https://trends.google.com";

/// Interest value reported for "Breakout" rising queries.
const BREAKOUT_VALUE: u64 = 1000;
const PER_LIST: usize = 10;

#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, base_url: &str, seeds: Vec<String>) -> FallbackChain {
    let base = base_url.trim_end_matches('/').to_string();
    FallbackChain::new(SourceTag::GoogleTrends)
        .then(RelatedQueries {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
            seeds,
        })
        .then(DailyTrends { fetcher, base })
}

fn parse_xssi(body: &str, context: &str) -> Result<Value, ScraperError> {
    serde_json::from_str(super::strip_xssi(body)).map_err(|e| ScraperError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Locate the related-queries widget in an explore response, returning its
/// token and request object.
pub(crate) fn related_widget(explore: &Value) -> Result<(String, Value), ScraperError> {
    let widgets = explore
        .get("widgets")
        .and_then(Value::as_array)
        .ok_or_else(|| ScraperError::Shape {
            context: "trends explore".to_string(),
            reason: "missing widgets array".to_string(),
        })?;
    widgets
        .iter()
        .find(|w| w.get("id").and_then(Value::as_str) == Some("RELATED_QUERIES"))
        .and_then(|w| {
            let token = w.get("token")?.as_str()?.to_string();
            let request = w.get("request")?.clone();
            Some((token, request))
        })
        .ok_or_else(|| ScraperError::Shape {
            context: "trends explore".to_string(),
            reason: "no RELATED_QUERIES widget".to_string(),
        })
}

/// Parse a related-searches widget response. `rankedList[0]` holds top
/// queries and `rankedList[1]` rising ones; rising come first in the output.
pub(crate) fn parse_related(body: &Value, seed: &str) -> Vec<RawCandidate> {
    let lists = body
        .pointer("/default/rankedList")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let keywords_of = |idx: usize| -> Vec<Value> {
        lists
            .get(idx)
            .and_then(|l| l.get("rankedKeyword"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let rising = keywords_of(1).into_iter().take(PER_LIST).map(|k| (k, true));
    let top = keywords_of(0).into_iter().take(PER_LIST).map(|k| (k, false));

    let mut seen = HashSet::new();
    rising
        .chain(top)
        .filter_map(|(keyword, is_rising)| {
            let query = keyword.get("query").and_then(Value::as_str)?.trim().to_string();
            if query.is_empty() || !seen.insert(query.to_lowercase()) {
                return None;
            }
            let formatted = keyword
                .get("formattedValue")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let value = keyword.get("value").and_then(json_count);
            let (search_volume, growth) = if formatted.eq_ignore_ascii_case("breakout") {
                (Some(BREAKOUT_VALUE), Some(5000.0))
            } else if is_rising {
                #[allow(clippy::cast_precision_loss)]
                let growth = value.map(|v| v as f64);
                (value, growth)
            } else {
                (value, None)
            };
            Some(
                RawCandidate::new(SourceTag::GoogleTrends, query.clone()).with_metrics(RawMetrics {
                    search_volume,
                    growth_percent: growth,
                    query: Some(seed.to_string()),
                    ..RawMetrics::default()
                }),
            )
        })
        .collect()
}

pub(crate) fn parse_daily_rss(xml: &str) -> Result<Vec<RawCandidate>, ScraperError> {
    let items = parse_feed(xml, 30)?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let title = item.title()?;
            let traffic = item.get("ht:approx_traffic").and_then(parse_compact_count);
            let picture = item.get("ht:picture").and_then(normalize_image_url);
            Some(
                RawCandidate::new(SourceTag::GoogleTrends, title)
                    .with_metrics(RawMetrics {
                        search_volume: traffic,
                        ..RawMetrics::default()
                    })
                    .with_image(picture),
            )
        })
        .collect())
}

struct RelatedQueries {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Vec<String>,
}

impl RelatedQueries {
    async fn for_keyword(&self, keyword: &str) -> Result<Vec<RawCandidate>, ScraperError> {
        let req = serde_json::json!({
            "comparisonItem": [ { "keyword": keyword, "geo": "US", "time": "today 3-m" } ],
            "category": 0,
            "property": ""
        });
        let explore_url = format!(
            "{}/trends/api/explore?hl=en-US&tz=0&req={}",
            self.base,
            super::encode(&req.to_string())
        );
        let explore_body = self.fetcher.get_text(&explore_url).await?;
        let (token, request) = related_widget(&parse_xssi(&explore_body, "trends explore")?)?;

        let related_url = format!(
            "{}/trends/api/widgetdata/relatedsearches?hl=en-US&tz=0&req={}&token={}",
            self.base,
            super::encode(&request.to_string()),
            super::encode(&token)
        );
        let related_body = self.fetcher.get_text(&related_url).await?;
        Ok(parse_related(
            &parse_xssi(&related_body, "trends related searches")?,
            keyword,
        ))
    }
}

#[async_trait]
impl Strategy for RelatedQueries {
    fn name(&self) -> &'static str {
        "related_queries"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 5);
        let mut out = Vec::new();
        let mut first_err = None;
        for keyword in &keywords {
            match self.for_keyword(keyword).await {
                Ok(found) => out.extend(found),
                Err(e) => {
                    tracing::debug!(keyword = %keyword, error = %e, "related queries failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        match (out.is_empty(), first_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(out),
        }
    }
}

struct DailyTrends {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for DailyTrends {
    fn name(&self) -> &'static str {
        "daily_trends_rss"
    }

    async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let xml = self
            .fetcher
            .get_text(&format!("{}/trending/rss?geo=US", self.base))
            .await?;
        parse_daily_rss(&xml)
    }
}
