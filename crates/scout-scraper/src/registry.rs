//! Wiring of the six per-source collectors and the image lookups.

use std::sync::Arc;

use scout_core::AppConfig;

use crate::image_search::{BingImageLookup, ImageLookup, MarketplaceImageLookup};
use crate::sources::meta_ads::AdArchive;
use crate::sources::{aliexpress, amazon, google_trends, meta_ads, tiktok};
use crate::storefront;
use crate::strategy::Collector;
use crate::HttpFetcher;

/// Base URLs of every external source. Tests point these at a mock server.
#[derive(Debug, Clone)]
pub struct SourceEndpoints {
    pub tiktok: tiktok::TiktokEndpoints,
    pub amazon: String,
    pub aliexpress: String,
    pub google_trends: String,
    pub meta_ads: String,
    pub image_search: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            tiktok: tiktok::TiktokEndpoints::default(),
            amazon: amazon::BASE_URL.to_string(),
            aliexpress: aliexpress::BASE_URL.to_string(),
            google_trends: google_trends::BASE_URL.to_string(),
            meta_ads: meta_ads::BASE_URL.to_string(),
            image_search: crate::image_search::BING_BASE_URL.to_string(),
        }
    }
}

impl SourceEndpoints {
    /// Every source served from one origin, as a mock server would.
    #[must_use]
    pub fn single_origin(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            tiktok: tiktok::TiktokEndpoints {
                creative_center_base: base.clone(),
                web_base: base.clone(),
            },
            amazon: base.clone(),
            aliexpress: base.clone(),
            google_trends: base.clone(),
            meta_ads: base.clone(),
            image_search: base,
        }
    }
}

/// Keyword and store seeds shared by the per-keyword collectors.
#[derive(Debug, Clone, Default)]
pub struct Seeds {
    pub keywords: Vec<String>,
    pub stores: Vec<String>,
}

impl Seeds {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            keywords: config.trend_seeds.clone(),
            stores: config.seed_stores.clone(),
        }
    }
}

/// All six collectors, in a stable order.
#[must_use]
pub fn default_collectors(
    fetcher: &Arc<HttpFetcher>,
    endpoints: &SourceEndpoints,
    seeds: &Seeds,
) -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(tiktok::collector(Arc::clone(fetcher), &endpoints.tiktok)),
        Arc::new(amazon::collector(Arc::clone(fetcher), &endpoints.amazon)),
        Arc::new(aliexpress::collector(
            Arc::clone(fetcher),
            &endpoints.aliexpress,
            seeds.keywords.clone(),
        )),
        Arc::new(google_trends::collector(
            Arc::clone(fetcher),
            &endpoints.google_trends,
            seeds.keywords.clone(),
        )),
        Arc::new(meta_ads::collector(
            Arc::clone(fetcher),
            &endpoints.meta_ads,
            seeds.keywords.clone(),
        )),
        Arc::new(storefront::collector(Arc::clone(fetcher), seeds.stores.clone())),
    ]
}

/// Image lookups in preference order.
#[must_use]
pub fn default_image_lookups(
    fetcher: &Arc<HttpFetcher>,
    endpoints: &SourceEndpoints,
) -> Vec<Arc<dyn ImageLookup>> {
    vec![
        Arc::new(BingImageLookup::new(Arc::clone(fetcher), &endpoints.image_search)),
        Arc::new(MarketplaceImageLookup::new(Arc::clone(fetcher), &endpoints.amazon)),
    ]
}

#[must_use]
pub fn ad_archive(fetcher: &Arc<HttpFetcher>, endpoints: &SourceEndpoints) -> AdArchive {
    AdArchive::new(Arc::clone(fetcher), &endpoints.meta_ads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchConfig;

    #[test]
    fn one_collector_per_source() {
        let fetcher = Arc::new(HttpFetcher::new(&FetchConfig::immediate()).unwrap());
        let collectors = default_collectors(
            &fetcher,
            &SourceEndpoints::default(),
            &Seeds::default(),
        );
        let sources: Vec<_> = collectors.iter().map(|c| c.source()).collect();
        assert_eq!(sources, scout_core::SourceTag::ALL.to_vec());
    }
}
