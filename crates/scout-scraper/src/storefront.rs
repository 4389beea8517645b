//! Storefront inventory reader over the public per-store `products.json`
//! catalog endpoint.
//!
//! ## Observed shape
//!
//! `{"products": [{"title", "handle", "images": [{"src"}], "variants": [{"price"}]}]}`.
//! Variant prices arrive as decimal strings (`"24.99"`), occasionally as
//! numbers. Pagination is by `page=N`; an empty `products` array marks the end.

use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{CatalogItem, RawCandidate, RawMetrics, SourceTag};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{json_number, normalize_image_url};
use crate::origin::{extract_origin, store_identity};
use crate::strategy::{FallbackChain, Strategy};

/// Hard cap on pages fetched per store.
pub const MAX_PAGES: u32 = 10;
/// Hard cap on items kept per store.
pub const MAX_ITEMS: usize = 300;
const PAGE_SIZE: u32 = 30;

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    products: Vec<CatalogProduct>,
}

#[derive(Debug, Deserialize)]
struct CatalogProduct {
    #[serde(default)]
    title: String,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    images: Vec<CatalogImage>,
    #[serde(default)]
    variants: Vec<CatalogVariant>,
}

#[derive(Debug, Deserialize)]
struct CatalogImage {
    #[serde(default)]
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogVariant {
    #[serde(default)]
    price: Option<Value>,
}

impl CatalogProduct {
    /// Lowest positive variant price.
    fn min_price(&self) -> Option<f64> {
        self.variants
            .iter()
            .filter_map(|v| v.price.as_ref().and_then(json_number))
            .filter(|p| *p > 0.0)
            .reduce(f64::min)
    }

    fn into_item(self, origin: &str) -> Option<CatalogItem> {
        let name = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return None;
        }
        let price = self.min_price();
        let image_url = self
            .images
            .iter()
            .find_map(|i| i.src.as_deref())
            .and_then(normalize_image_url);
        let product_url = self
            .handle
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| format!("{origin}/products/{h}"));
        Some(CatalogItem {
            name,
            price,
            handle: self.handle,
            image_url,
            product_url,
        })
    }
}

/// Reads a storefront's public catalog, page by page.
pub struct StorefrontReader {
    fetcher: Arc<HttpFetcher>,
}

impl StorefrontReader {
    #[must_use]
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self { fetcher }
    }

    /// Pull the full catalog of `store_url`, stopping at the first empty page,
    /// after [`MAX_PAGES`] pages, or once [`MAX_ITEMS`] items are collected.
    ///
    /// # Errors
    ///
    /// Returns the first page's fetch or decode error. Failures on later
    /// pages end pagination and keep what was already read.
    pub async fn pull(&self, store_url: &str) -> Result<Vec<CatalogItem>, ScraperError> {
        let origin = extract_origin(store_url);
        let mut items: Vec<CatalogItem> = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = format!("{origin}/products.json?limit={PAGE_SIZE}&page={page}");
            let parsed = match self.fetch_page(&url).await {
                Ok(parsed) => parsed,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(store = %origin, page, error = %e, "catalog page failed, keeping partial pull");
                    break;
                }
            };
            if parsed.products.is_empty() {
                break;
            }
            items.extend(parsed.products.into_iter().filter_map(|p| p.into_item(&origin)));
            if items.len() >= MAX_ITEMS {
                items.truncate(MAX_ITEMS);
                break;
            }
        }

        tracing::debug!(store = %origin, count = items.len(), "catalog pulled");
        Ok(items)
    }

    async fn fetch_page(&self, url: &str) -> Result<CatalogPage, ScraperError> {
        let body = self.fetcher.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("catalog page {url}"),
            source: e,
        })
    }
}

/// Storefront collector over a fixed list of seed stores. Each catalog item
/// becomes a candidate carrying its retail price.
#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, seed_stores: Vec<String>) -> FallbackChain {
    FallbackChain::new(SourceTag::Shopify)
        .then(CatalogJson {
            reader: StorefrontReader::new(fetcher),
            stores: seed_stores,
        })
        .max_items(60)
}

struct CatalogJson {
    reader: StorefrontReader,
    stores: Vec<String>,
}

#[async_trait]
impl Strategy for CatalogJson {
    fn name(&self) -> &'static str {
        "catalog_json"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let needle = category.map(str::to_lowercase);
        let mut out = Vec::new();
        let mut first_err = None;

        for store in &self.stores {
            let (_, store_name) = store_identity(store);
            match self.reader.pull(store).await {
                Ok(items) => out.extend(
                    items
                        .into_iter()
                        .filter(|i| {
                            needle
                                .as_deref()
                                .is_none_or(|n| i.name.to_lowercase().contains(n))
                        })
                        .map(|i| {
                            RawCandidate::new(SourceTag::Shopify, i.name)
                                .with_metrics(RawMetrics {
                                    price: i.price,
                                    query: Some(store_name.clone()),
                                    ..RawMetrics::default()
                                })
                                .with_image(i.image_url)
                                .with_url(i.product_url)
                        }),
                ),
                Err(e) => {
                    tracing::debug!(store = %store, error = %e, "seed store pull failed");
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
