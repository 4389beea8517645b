//! Secondary image lookups used to backfill missing product media.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde_json::Value;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{normalize_image_url, selector};
use crate::sources::encode;

pub const BING_BASE_URL: &str = "https://www.bing.com";

/// A public source that can suggest an image for a product name.
#[async_trait]
pub trait ImageLookup: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns the underlying fetch error; `Ok(None)` means the page had no
    /// usable image.
    async fn find_image(&self, query: &str) -> Result<Option<String>, ScraperError>;
}

/// Image search results page. Full-size URLs sit in the `m` attribute of
/// `a.iusc` as JSON (`murl`); thumbnails are the fallback.
pub struct BingImageLookup {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

impl BingImageLookup {
    #[must_use]
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub(crate) fn parse_bing(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    if let Some(sel) = selector("a.iusc") {
        let full = doc.select(&sel).find_map(|a| {
            let meta: Value = serde_json::from_str(a.value().attr("m")?).ok()?;
            meta.get("murl")
                .and_then(Value::as_str)
                .and_then(normalize_image_url)
        });
        if full.is_some() {
            return full;
        }
    }
    let sel = selector("img.mimg")?;
    doc.select(&sel).find_map(|img| {
        ["src", "data-src"]
            .iter()
            .find_map(|a| img.value().attr(a))
            .and_then(normalize_image_url)
    })
}

#[async_trait]
impl ImageLookup for BingImageLookup {
    fn name(&self) -> &'static str {
        "image_search"
    }

    async fn find_image(&self, query: &str) -> Result<Option<String>, ScraperError> {
        let url = format!("{}/images/search?q={}&form=HDRSC2", self.base, encode(query));
        let html = self.fetcher.get_text(&url).await?;
        Ok(parse_bing(&html))
    }
}

/// Marketplace product search; the first result thumbnail is used.
pub struct MarketplaceImageLookup {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

impl MarketplaceImageLookup {
    #[must_use]
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub(crate) fn parse_marketplace(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = selector("img.s-image")?;
    doc.select(&sel)
        .find_map(|img| img.value().attr("src").and_then(normalize_image_url))
}

#[async_trait]
impl ImageLookup for MarketplaceImageLookup {
    fn name(&self) -> &'static str {
        "marketplace_search"
    }

    async fn find_image(&self, query: &str) -> Result<Option<String>, ScraperError> {
        let url = format!("{}/s?k={}", self.base, encode(query));
        let html = self.fetcher.get_text(&url).await?;
        Ok(parse_marketplace(&html))
    }
}
