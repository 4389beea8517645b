//! Ad-library collector. Supplies competition signal: how many active ads
//! mention a product keyword.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scout_core::{RawCandidate, RawMetrics, SourceTag};
use scraper::Html;
use serde::Serialize;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{first_attr, first_text, normalize_image_url, parse_compact_count, selector};
use crate::origin::title_case;
use crate::strategy::{FallbackChain, Strategy};

pub const BASE_URL: &str = "https://www.facebook.com";

static RESULT_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)~?\s*(\d[\d,.]*\s*[km]?)\s+results?").expect("valid regex")
});

const CARD_SELECTORS: [&str; 2] = ["div[data-testid='ad-card']", "div.x1plvlek"];

/// Active-ad summary for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdSummary {
    pub query: String,
    pub total_ads: u64,
    pub advertisers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Parsed ad-library page: visible cards plus the header result count.
#[derive(Debug, Default)]
pub(crate) struct LibraryPage {
    pub cards: usize,
    pub advertisers: Vec<String>,
    pub image_url: Option<String>,
    pub result_count: Option<u64>,
}

pub(crate) fn parse_library_page(html: &str) -> LibraryPage {
    let doc = Html::parse_document(html);
    let mut page = LibraryPage::default();

    for css in CARD_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        let cards: Vec<_> = doc.select(&sel).collect();
        if cards.is_empty() {
            continue;
        }
        page.cards = cards.len();
        let mut seen = HashSet::new();
        for card in &cards {
            if let Some(name) = first_text(card, &["[data-testid='advertiser-name']", "a[href*='facebook.com/'] span", "strong"]) {
                if seen.insert(name.to_lowercase()) {
                    page.advertisers.push(name);
                }
            }
            if page.image_url.is_none() {
                page.image_url = first_attr(card, &["img"], &["src"]).and_then(|u| normalize_image_url(&u));
            }
        }
        break;
    }

    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    page.result_count = RESULT_COUNT_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_compact_count(m.as_str()));
    page
}

fn library_url(base: &str, query: &str) -> String {
    format!(
        "{base}/ads/library/?active_status=active&ad_type=all&country=US&q={}&search_type=keyword_unordered&media_type=all",
        super::encode(query)
    )
}

/// Ad-library lookup used both by the collector and by single-product
/// analysis.
pub struct AdArchive {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

impl AdArchive {
    #[must_use]
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Count active ads for `query`. Prefers the header result count and
    /// falls back to the number of visible cards.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or [`ScraperError::Shape`] when the page has
    /// neither cards nor a result count.
    pub async fn search(&self, query: &str) -> Result<AdSummary, ScraperError> {
        let html = self.fetcher.get_text(&library_url(&self.base, query)).await?;
        let page = parse_library_page(&html);
        let total_ads = match (page.result_count, page.cards) {
            (Some(n), _) => n,
            (None, cards) if cards > 0 => cards as u64,
            _ => {
                return Err(ScraperError::Shape {
                    context: format!("ad library for {query:?}"),
                    reason: "no ad cards or result count".to_string(),
                })
            }
        };
        Ok(AdSummary {
            query: query.to_string(),
            total_ads,
            advertisers: page.advertisers,
            image_url: page.image_url,
        })
    }
}

#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, base_url: &str, seeds: Vec<String>) -> FallbackChain {
    let base = base_url.trim_end_matches('/').to_string();
    let seeds = Arc::new(seeds);
    FallbackChain::new(SourceTag::MetaAds)
        .then(CardScrape {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
            seeds: Arc::clone(&seeds),
        })
        .then(ResultCount {
            fetcher,
            base,
            seeds,
        })
}

fn ad_candidate(keyword: &str, ad_count: u64, image: Option<String>) -> RawCandidate {
    RawCandidate::new(SourceTag::MetaAds, title_case(keyword))
        .with_metrics(RawMetrics {
            ad_count: Some(ad_count),
            query: Some(keyword.to_string()),
            ..RawMetrics::default()
        })
        .with_image(image)
}

/// Fetch each keyword's library page and map it through `pick`.
async fn per_keyword<F>(
    fetcher: &HttpFetcher,
    base: &str,
    keywords: Vec<String>,
    pick: F,
) -> Result<Vec<RawCandidate>, ScraperError>
where
    F: Fn(&str, LibraryPage) -> Option<RawCandidate> + Send + Sync,
{
    let mut out = Vec::new();
    let mut first_err = None;
    for keyword in &keywords {
        match fetcher.get_text(&library_url(base, keyword)).await {
            Ok(html) => out.extend(pick(keyword, parse_library_page(&html))),
            Err(e) => {
                tracing::debug!(keyword = %keyword, error = %e, "ad library fetch failed");
                first_err.get_or_insert(e);
            }
        }
    }
    match (out.is_empty(), first_err) {
        (true, Some(e)) => Err(e),
        _ => Ok(out),
    }
}

struct CardScrape {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Arc<Vec<String>>,
}

#[async_trait]
impl Strategy for CardScrape {
    fn name(&self) -> &'static str {
        "ad_cards"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 5);
        per_keyword(&self.fetcher, &self.base, keywords, |keyword, page| {
            (page.cards > 0).then(|| {
                let count = page.result_count.unwrap_or(page.cards as u64);
                ad_candidate(keyword, count, page.image_url)
            })
        })
        .await
    }
}

struct ResultCount {
    fetcher: Arc<HttpFetcher>,
    base: String,
    seeds: Arc<Vec<String>>,
}

#[async_trait]
impl Strategy for ResultCount {
    fn name(&self) -> &'static str {
        "result_count"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let keywords = super::keywords_for(category, &self.seeds, 5);
        per_keyword(&self.fetcher, &self.base, keywords, |keyword, page| {
            page.result_count
                .map(|count| ad_candidate(keyword, count, page.image_url))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cards_and_advertisers() {
        let html = r#"<html><body>
            <div role="heading">~1,200 results</div>
            <div data-testid="ad-card"><strong>GlowShop</strong><img src="https://scontent.xx.fbcdn.net/a.jpg"></div>
            <div data-testid="ad-card"><strong>glowshop</strong></div>
            <div data-testid="ad-card"><strong>Lumen Co</strong></div>
        </body></html>"#;
        let page = parse_library_page(html);
        assert_eq!(page.cards, 3);
        assert_eq!(page.advertisers, vec!["GlowShop", "Lumen Co"]);
        assert_eq!(page.result_count, Some(1200));
        assert_eq!(page.image_url.as_deref(), Some("https://scontent.xx.fbcdn.net/a.jpg"));
    }

    #[test]
    fn compact_result_count_without_cards() {
        let page = parse_library_page("<div>About 4.5K results</div>");
        assert_eq!(page.cards, 0);
        assert_eq!(page.result_count, Some(4500));
    }

    #[test]
    fn empty_page_has_nothing() {
        let page = parse_library_page("<html><body>Log in to continue</body></html>");
        assert_eq!(page.cards, 0);
        assert_eq!(page.result_count, None);
    }

    #[test]
    fn library_url_encodes_query() {
        let url = library_url("https://www.facebook.com", "neck fan");
        assert!(url.contains("q=neck%20fan"));
        assert!(url.contains("active_status=active"));
    }
}
