//! Wholesale-marketplace collector. Supplies source cost and order volume.
//!
//! Strategy order:
//! 1. Search JSON endpoint.
//! 2. Search page, reading the product state assigned in inline scripts.
//! 3. Search page product cards.
//! 4. Deals landing page item links.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{RawCandidate, RawMetrics, SourceTag};
use scraper::Html;
use serde_json::{Map, Value};

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{
    absolutize, assigned_json, collect_objects, element_text, first_attr, first_text, json_count,
    json_number, json_str, normalize_image_url, parse_compact_count, parse_price, selector,
};
use crate::strategy::{FallbackChain, Strategy};

pub const BASE_URL: &str = "https://www.aliexpress.us";

const SCRIPT_MARKERS: [&str; 3] = [
    "window._dida_config_._init_data_",
    "window.runParams",
    "_init_data_",
];

const TITLE_KEYS: [&str; 4] = ["displayTitle", "title", "productTitle", "subject"];

#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, base_url: &str, seeds: Vec<String>) -> FallbackChain {
    let base = base_url.trim_end_matches('/').to_string();
    let seeds = Arc::new(seeds);
    FallbackChain::new(SourceTag::Aliexpress)
        .then(SearchApi {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
            seeds: Arc::clone(&seeds),
        })
        .then(EmbeddedState {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
            seeds: Arc::clone(&seeds),
        })
        .then(SearchCards {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
            seeds,
        })
        .then(DealsPage { fetcher, base })
}

fn is_product_object(map: &Map<String, Value>) -> bool {
    product_title(map).is_some()
        && (map.contains_key("productId")
            || map.contains_key("prices")
            || map.contains_key("salePrice")
            || map.contains_key("price"))
}

/// Title may be a plain string or `{ "displayTitle": ... }`.
fn product_title(map: &Map<String, Value>) -> Option<String> {
    if let Some(t) = json_str(map, &TITLE_KEYS) {
        return Some(t.to_string());
    }
    map.get("title")
        .and_then(Value::as_object)
        .and_then(|inner| json_str(inner, &TITLE_KEYS))
        .map(str::to_owned)
}

fn price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(inner) => ["minPrice", "value", "formattedPrice", "minAmount"]
            .iter()
            .find_map(|k| inner.get(*k).and_then(price_value)),
        other => json_number(other).filter(|p| *p > 0.0),
    }
}

fn product_price(map: &Map<String, Value>) -> Option<f64> {
    if let Some(prices) = map.get("prices").and_then(Value::as_object) {
        if let Some(p) = ["salePrice", "originalPrice"]
            .iter()
            .find_map(|k| prices.get(*k).and_then(price_value))
        {
            return Some(p);
        }
    }
    ["salePrice", "price", "minPrice"]
        .iter()
        .find_map(|k| map.get(*k).and_then(price_value))
}

fn product_orders(map: &Map<String, Value>) -> Option<u64> {
    ["tradeDesc", "orders", "sold"]
        .iter()
        .find_map(|k| map.get(*k).and_then(json_count))
        .or_else(|| {
            map.get("trade")
                .and_then(Value::as_object)
                .and_then(|t| t.get("tradeDesc"))
                .and_then(json_count)
        })
}

fn product_image(map: &Map<String, Value>) -> Option<String> {
    json_str(map, &["imgUrl", "image", "imageUrl"])
        .or_else(|| {
            map.get("image")
                .and_then(Value::as_object)
                .and_then(|i| json_str(i, &["imgUrl", "url"]))
        })
        .and_then(normalize_image_url)
}

fn product_link(map: &Map<String, Value>, base: &str) -> Option<String> {
    if let Some(url) = json_str(map, &["productDetailUrl", "detailUrl", "productUrl"]) {
        return absolutize(base, url);
    }
    let id = map.get("productId")?;
    let id = id
        .as_str()
        .map(str::to_owned)
        .or_else(|| id.as_u64().map(|n| n.to_string()))?;
    Some(format!("{base}/item/{id}.html"))
}

/// Walk any JSON document for product-shaped objects.
pub(crate) fn products_from_json(value: &Value, base: &str, keyword: &str) -> Vec<RawCandidate> {
    let mut objects = Vec::new();
    collect_objects(value, &is_product_object, &mut objects);
    objects
        .into_iter()
        .filter_map(|map| {
            let name = product_title(map)?;
            let rating = map
                .get("evaluation")
                .and_then(Value::as_object)
                .and_then(|e| e.get("starRating"))
                .or_else(|| map.get("starRating"))
                .and_then(json_number);
            Some(
                RawCandidate::new(SourceTag::Aliexpress, name)
                    .with_metrics(RawMetrics {
                        price: product_price(map),
                        orders: product_orders(map),
                        rating,
                        query: Some(keyword.to_string()),
                        ..RawMetrics::default()
                    })
                    .with_image(product_image(map))
                    .with_url(product_link(map, base)),
            )
        })
        .collect()
}

/// Find the product state assigned in an inline script.
pub(crate) fn parse_embedded(html: &str, base: &str, keyword: &str) -> Vec<RawCandidate> {
    let scripts: Vec<String> = {
        let doc = Html::parse_document(html);
        match selector("script") {
            Some(sel) => doc.select(&sel).map(|s| s.text().collect::<String>()).collect(),
            None => Vec::new(),
        }
    };
    for script in &scripts {
        for marker in SCRIPT_MARKERS {
            if let Some(value) = assigned_json(script, marker) {
                let found = products_from_json(&value, base, keyword);
                if !found.is_empty() {
                    return found;
                }
            }
        }
    }
    Vec::new()
}

pub(crate) fn parse_search_cards(html: &str, base: &str, keyword: &str) -> Vec<RawCandidate> {
    const CARDS: [&str; 3] = [
        "div.search-item-card-wrapper-gallery",
        "a.search-card-item",
        "div[class*='product-card']",
    ];
    let doc = Html::parse_document(html);
    for css in CARDS {
        let Some(sel) = selector(css) else { continue };
        let found: Vec<RawCandidate> = doc
            .select(&sel)
            .filter_map(|card| {
                let name = first_text(&card, &["h3", "h1", "div[class*='title']"])
                    .or_else(|| first_attr(&card, &["img"], &["alt"]))?;
                let price = first_text(&card, &["div[class*='price-sale']", "div[class*='price']", "span[class*='price']"])
                    .and_then(|t| parse_price(&t));
                let orders = first_text(&card, &["span[class*='trade']", "span[class*='sold']"])
                    .and_then(|t| parse_compact_count(&t));
                let image = first_attr(&card, &["img"], &["src", "data-src"])
                    .and_then(|u| normalize_image_url(&u));
                let href = card
                    .value()
                    .attr("href")
                    .map(str::to_owned)
                    .or_else(|| first_attr(&card, &["a[href*='/item/']"], &["href"]));
                Some(
                    RawCandidate::new(SourceTag::Aliexpress, name)
                        .with_metrics(RawMetrics {
                            price,
                            orders,
                            query: Some(keyword.to_string()),
                            ..RawMetrics::default()
                        })
                        .with_image(image)
                        .with_url(href.and_then(|h| absolutize(base, &h))),
                )
            })
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

pub(crate) fn parse_deal_links(html: &str, base: &str) -> Vec<RawCandidate> {
    let doc = Html::parse_document(html);
    let Some(sel) = selector("a[href*='/item/']") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    doc.select(&sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = absolutize(base, href)?;
            let name = Some(element_text(&a))
                .filter(|t| t.len() >= 4)
                .or_else(|| first_attr(&a, &["img"], &["alt"]))?;
            let key = url.split('?').next().unwrap_or(&url).to_string();
            if !seen.insert(key) {
                return None;
            }
            let price = parse_price(&element_text(&a));
            let image = first_attr(&a, &["img"], &["src"]).and_then(|u| normalize_image_url(&u));
            Some(
                RawCandidate::new(SourceTag::Aliexpress, name)
                    .with_metrics(RawMetrics {
                        price,
                        ..RawMetrics::default()
                    })
                    .with_image(image)
                    .with_url(Some(url)),
            )
        })
        .collect()
}

/// Run a per-keyword fetch and parse, returning the first keyword's error
/// only when nothing was found.
async fn per_keyword<F>(
    fetcher: &HttpFetcher,
    keywords: Vec<String>,
    url_for: impl Fn(&str) -> String + Send + Sync,
    parse: F,
) -> Result<Vec<RawCandidate>, ScraperError>
where
    F: Fn(&str, &str) -> Vec<RawCandidate> + Send + Sync,
{
    let mut out = Vec::new();
    let mut first_err = None;
    for keyword in &keywords {
        let url = url_for(keyword);
        match fetcher.get_text(&url).await {
            Ok(body) => out.extend(parse(&body, keyword)),
            Err(e) => {
                tracing::debug!(keyword = %keyword, error = %e, "aliexpress search failed");
                first_err.get_or_insert(e);
            }
        }
    }
    match (out.is_empty(), first_err) {
        (true, Some(e)) => Err(e),
        _ => Ok(out),
    }
}

fn search_slug(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

struct SearchApi {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Arc<Vec<String>>,
}

#[async_trait]
impl Strategy for SearchApi {
    fn name(&self) -> &'static str {
        "search_api"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 3);
        let base = self.base.clone();
        per_keyword(
            &self.fetcher,
            keywords,
            |kw| {
                format!(
                    "{base}/glosearch/api/product?trafficChannel=main&SearchText={}&ltype=wholesale&SortType=total_tranpro_desc&page=1",
                    super::encode(kw)
                )
            },
            |body, kw| match serde_json::from_str::<Value>(body) {
                Ok(value) => products_from_json(&value, &self.base, kw),
                Err(e) => {
                    tracing::debug!(error = %e, "aliexpress search api returned non-json");
                    Vec::new()
                }
            },
        )
        .await
    }
}

struct EmbeddedState {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Arc<Vec<String>>,
}

#[async_trait]
impl Strategy for EmbeddedState {
    fn name(&self) -> &'static str {
        "embedded_state"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 3);
        let base = self.base.clone();
        per_keyword(
            &self.fetcher,
            keywords,
            |kw| format!("{base}/w/wholesale-{}.html", search_slug(kw)),
            |body, kw| parse_embedded(body, &self.base, kw),
        )
        .await
    }
}

struct SearchCards {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Arc<Vec<String>>,
}

#[async_trait]
impl Strategy for SearchCards {
    fn name(&self) -> &'static str {
        "search_cards"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 3);
        let base = self.base.clone();
        per_keyword(
            &self.fetcher,
            keywords,
            |kw| format!("{base}/w/wholesale-{}.html", search_slug(kw)),
            |body, kw| parse_search_cards(body, &self.base, kw),
        )
        .await
    }
}

struct DealsPage {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for DealsPage {
    fn name(&self) -> &'static str {
        "deals_page"
    }

    async fn fetch(&self, _category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let html = self.fetcher.get_text(&format!("{}/gcp/deals", self.base)).await?;
        Ok(parse_deal_links(&html, &self.base))
    }
}
