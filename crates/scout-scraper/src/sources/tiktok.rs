//! Short-video trend collector.
//!
//! Strategy order:
//! 1. Creative Center hashtag-trend API.
//! 2. Creative Center keyword-trend API.
//! 3. Creative Center trending page, reading its embedded `__NEXT_DATA__`.
//! 4. Public per-hashtag pages, mining the meta description for views and
//!    co-occurring hashtags.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scout_core::{RawCandidate, RawMetrics, SourceTag};
use serde_json::Value;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{collect_objects, json_count, json_number, json_str, meta_content, parse_compact_count, script_by_id};
use crate::origin::title_case;
use crate::strategy::{FallbackChain, Strategy};

pub const CREATIVE_CENTER_BASE: &str = "https://ads.tiktok.com";
pub const WEB_BASE: &str = "https://www.tiktok.com";

/// Hashtags where product discovery content concentrates.
const SEED_HASHTAGS: [&str; 9] = [
    "tiktokmademebuyit",
    "amazonfinds",
    "viralproducts",
    "gadgettok",
    "homeessentials",
    "beautyhacks",
    "cleaningtok",
    "organizationtok",
    "musthaves",
];

/// Tags that trend constantly but never name a product.
const GENERIC_TAGS: [&str; 12] = [
    "fyp",
    "foryou",
    "foryoupage",
    "viral",
    "trending",
    "tiktok",
    "duet",
    "xyzbca",
    "funny",
    "love",
    "capcut",
    "trend",
];

static VIEWS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*\s*[kmb]?)\s+views").expect("valid regex")
});
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]{3,40})").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct TiktokEndpoints {
    pub creative_center_base: String,
    pub web_base: String,
}

impl Default for TiktokEndpoints {
    fn default() -> Self {
        Self {
            creative_center_base: CREATIVE_CENTER_BASE.to_string(),
            web_base: WEB_BASE.to_string(),
        }
    }
}

#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, endpoints: &TiktokEndpoints) -> FallbackChain {
    let cc = endpoints.creative_center_base.trim_end_matches('/').to_string();
    let web = endpoints.web_base.trim_end_matches('/').to_string();
    FallbackChain::new(SourceTag::Tiktok)
        .then(HashtagTrends {
            fetcher: Arc::clone(&fetcher),
            base: cc.clone(),
        })
        .then(KeywordTrends {
            fetcher: Arc::clone(&fetcher),
            base: cc.clone(),
        })
        .then(TrendingPage {
            fetcher: Arc::clone(&fetcher),
            base: cc,
        })
        .then(HashtagPages { fetcher, base: web })
        .max_items(40)
}

fn is_generic(tag: &str) -> bool {
    let lowered = tag.to_ascii_lowercase();
    GENERIC_TAGS.contains(&lowered.as_str()) || SEED_HASHTAGS.contains(&lowered.as_str())
}

fn tag_candidate(tag: &str, views: Option<u64>, growth: Option<f64>) -> RawCandidate {
    let tag = tag.trim_start_matches('#');
    RawCandidate::new(SourceTag::Tiktok, title_case(&tag.replace('_', " "))).with_metrics(RawMetrics {
        views,
        growth_percent: growth,
        hashtag: Some(format!("#{tag}")),
        ..RawMetrics::default()
    })
}

/// Growth between the first and last points of a `[{time, value}]` series.
fn series_growth(series: Option<&Value>) -> Option<f64> {
    let points: Vec<f64> = series?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("value").and_then(json_number))
        .collect();
    let first = *points.first()?;
    let last = *points.last()?;
    (first > 0.0).then(|| ((last - first) / first * 1000.0).round() / 10.0)
}

fn ensure_ok(body: &Value, context: &str) -> Result<(), ScraperError> {
    match body.get("code").and_then(Value::as_i64) {
        None | Some(0) => Ok(()),
        Some(code) => Err(ScraperError::Shape {
            context: context.to_string(),
            reason: format!("api returned code {code}"),
        }),
    }
}

/// Parse a Creative Center hashtag list response.
pub(crate) fn parse_hashtag_list(body: &Value) -> Vec<RawCandidate> {
    let Some(list) = body.pointer("/data/list").and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|item| {
            let tag = item.get("hashtag_name").and_then(Value::as_str)?;
            if is_generic(tag) {
                return None;
            }
            let views = item.get("video_views").and_then(json_count);
            let growth = series_growth(item.get("trend"));
            Some(tag_candidate(tag, views, growth))
        })
        .collect()
}

/// Parse a Creative Center keyword list response.
pub(crate) fn parse_keyword_list(body: &Value) -> Vec<RawCandidate> {
    let list = body
        .pointer("/data/keyword_list")
        .or_else(|| body.pointer("/data/list"))
        .and_then(Value::as_array);
    let Some(list) = list else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|item| {
            let keyword = item.get("keyword").and_then(Value::as_str)?.trim();
            if keyword.is_empty() {
                return None;
            }
            let views = ["video_views", "impression", "post"]
                .iter()
                .find_map(|k| item.get(*k).and_then(json_count));
            let growth = item.get("post_change").and_then(json_number);
            Some(
                RawCandidate::new(SourceTag::Tiktok, title_case(keyword)).with_metrics(RawMetrics {
                    views,
                    growth_percent: growth,
                    query: Some(keyword.to_string()),
                    ..RawMetrics::default()
                }),
            )
        })
        .collect()
}

/// Parse hashtag objects out of the trending page's `__NEXT_DATA__` blob.
pub(crate) fn parse_trending_page(html: &str) -> Result<Vec<RawCandidate>, ScraperError> {
    let Some(raw) = script_by_id(html, "__NEXT_DATA__") else {
        return Ok(Vec::new());
    };
    let data: Value = serde_json::from_str(&raw).map_err(|e| ScraperError::Deserialize {
        context: "tiktok trending page __NEXT_DATA__".to_string(),
        source: e,
    })?;

    let mut objects = Vec::new();
    collect_objects(
        &data,
        &|m| m.contains_key("hashtagName") || m.contains_key("hashtag_name"),
        &mut objects,
    );

    Ok(objects
        .into_iter()
        .filter_map(|m| {
            let tag = json_str(m, &["hashtagName", "hashtag_name"])?;
            if is_generic(tag) {
                return None;
            }
            let views = ["videoViews", "video_views"]
                .iter()
                .find_map(|k| m.get(*k).and_then(json_count));
            Some(tag_candidate(tag, views, series_growth(m.get("trend"))))
        })
        .collect())
}

/// Mine a hashtag page's meta description for view counts and co-occurring
/// hashtags. Falls back to the page's own tag when nothing else is named.
pub(crate) fn parse_hashtag_page(html: &str, page_tag: &str) -> Vec<RawCandidate> {
    let description = meta_content(html, "description")
        .or_else(|| meta_content(html, "og:description"))
        .unwrap_or_default();
    if description.is_empty() {
        return Vec::new();
    }

    let views = VIEWS_RE
        .captures(&description)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_compact_count(m.as_str()));

    let mut seen = HashSet::new();
    let mut out: Vec<RawCandidate> = HASHTAG_RE
        .captures_iter(&description)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|tag| !tag.eq_ignore_ascii_case(page_tag) && !is_generic(tag))
        .filter(|tag| seen.insert(tag.to_ascii_lowercase()))
        .map(|tag| {
            let mut candidate = tag_candidate(&tag, None, None);
            candidate.metrics.query = Some(format!("#{page_tag}"));
            candidate
        })
        .collect();

    if out.is_empty() && !is_generic(page_tag) {
        out.push(tag_candidate(page_tag, views, None));
    }
    out
}

struct HashtagTrends {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for HashtagTrends {
    fn name(&self) -> &'static str {
        "hashtag_api"
    }

    async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let url = format!(
            "{}/creative_radar_api/v1/popular_trend/hashtag/list?page=1&limit=50&period=7&country_code=US&sort_by=popular",
            self.base
        );
        let body = self.fetcher.get_json(&url).await?;
        ensure_ok(&body, "tiktok hashtag list")?;
        Ok(parse_hashtag_list(&body))
    }
}

struct KeywordTrends {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for KeywordTrends {
    fn name(&self) -> &'static str {
        "keyword_api"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let mut url = format!(
            "{}/creative_radar_api/v1/popular_trend/keyword/list?page=1&limit=50&period=7&country_code=US",
            self.base
        );
        if let Some(category) = category {
            url.push_str("&keyword=");
            url.push_str(&super::encode(category));
        }
        let body = self.fetcher.get_json(&url).await?;
        ensure_ok(&body, "tiktok keyword list")?;
        Ok(parse_keyword_list(&body))
    }
}

struct TrendingPage {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for TrendingPage {
    fn name(&self) -> &'static str {
        "trending_page"
    }

    async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let url = format!(
            "{}/business/creativecenter/inspiration/popular/hashtag/pc/en",
            self.base
        );
        let html = self.fetcher.get_text(&url).await?;
        parse_trending_page(&html)
    }
}

struct HashtagPages {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for HashtagPages {
    fn name(&self) -> &'static str {
        "hashtag_pages"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let tags: Vec<String> = match category {
            Some(c) => vec![c.split_whitespace().collect::<String>().to_ascii_lowercase()],
            None => SEED_HASHTAGS.iter().take(4).map(|t| (*t).to_string()).collect(),
        };

        let mut out = Vec::new();
        let mut last_err = None;
        for tag in &tags {
            let url = format!("{}/tag/{}", self.base, super::encode(tag));
            match self.fetcher.get_text(&url).await {
                Ok(html) => out.extend(parse_hashtag_page(&html, tag)),
                Err(e) => {
                    tracing::debug!(tag = %tag, error = %e, "tiktok hashtag page failed");
                    last_err = Some(e);
                }
            }
        }

        match (out.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(out),
        }
    }
}
