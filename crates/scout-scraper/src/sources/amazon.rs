//! Marketplace bestseller collector.
//!
//! Strategy order:
//! 1. Bestseller RSS feed per category.
//! 2. Bestseller grid page, trying several known card layouts.
//! 3. Movers & shakers page (carries rank growth).
//! 4. Any product-detail links on the bestseller page, de-duplicated by ASIN.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scout_core::{RawCandidate, RawMetrics, SourceTag};
use scraper::Html;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::html::{
    absolutize, clean_text, element_text, first_attr, first_text, normalize_image_url,
    parse_percent, parse_price, selector,
};
use crate::rss::parse_feed;
use crate::strategy::{FallbackChain, Strategy};

pub const BASE_URL: &str = "https://www.amazon.com";

const DEFAULT_SLUGS: [&str; 3] = ["electronics", "home-garden", "beauty"];

static RSS_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\d+):\s*(.+)$").expect("valid regex"));
static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("valid regex"));
static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("valid regex"));

/// One known bestseller card layout.
struct CardLayout {
    card: &'static str,
    name: &'static [&'static str],
    price: &'static [&'static str],
    image: &'static [&'static str],
    link: &'static [&'static str],
    growth: &'static [&'static str],
}

const LAYOUTS: [CardLayout; 3] = [
    CardLayout {
        card: "div[id^='gridItemRoot']",
        name: &[
            "div[class*='p13n-sc-css-line-clamp']",
            "a.a-link-normal span div",
            "a.a-link-normal span",
        ],
        price: &["span.p13n-sc-price", "span._cDEzb_p13n-sc-price_3mJ9Z", "span.a-color-price"],
        image: &["img"],
        link: &["a.a-link-normal[href*='/dp/']", "a.a-link-normal"],
        growth: &["span.zg-percent-change", "span.zg-grid-pct-change"],
    },
    CardLayout {
        card: "div.p13n-sc-uncoverable-faceout",
        name: &["div[class*='line-clamp']", "a span div"],
        price: &["span[class*='p13n-sc-price']", "span.a-color-price"],
        image: &["img"],
        link: &["a[href*='/dp/']"],
        growth: &["span.zg-percent-change"],
    },
    CardLayout {
        card: "li.zg-item-immersion",
        name: &["div.p13n-sc-truncate", "div.p13n-sc-truncated", "a span"],
        price: &["span.p13n-sc-price", "span.a-color-price"],
        image: &["img"],
        link: &["a.a-link-normal"],
        growth: &["span.zg-percent-change"],
    },
];

#[must_use]
pub fn collector(fetcher: Arc<HttpFetcher>, base_url: &str) -> FallbackChain {
    let base = base_url.trim_end_matches('/').to_string();
    FallbackChain::new(SourceTag::Amazon)
        .then(BestsellerFeed {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
        })
        .then(BestsellerPage {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
        })
        .then(MoversPage {
            fetcher: Arc::clone(&fetcher),
            base: base.clone(),
        })
        .then(ProductLinks { fetcher, base })
}

/// Map a free-text category onto bestseller slugs.
pub(crate) fn slugs_for(category: Option<&str>) -> Vec<String> {
    let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) else {
        return DEFAULT_SLUGS.iter().map(|s| (*s).to_string()).collect();
    };
    let lowered = category.to_lowercase();
    let mapped = match lowered.as_str() {
        "home" | "home & kitchen" | "home and kitchen" | "kitchen" => "home-garden",
        "beauty" | "skincare" | "beauty & personal care" => "beauty",
        "tech" | "gadgets" | "electronics" => "electronics",
        "fitness" | "sports" | "outdoors" => "sporting-goods",
        "pets" | "pet supplies" => "pet-supplies",
        "toys" | "games" => "toys-and-games",
        _ => "",
    };
    if !mapped.is_empty() {
        return vec![mapped.to_string()];
    }
    let slug = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    vec![slug]
}

pub(crate) fn parse_rss(xml: &str, slug: &str) -> Result<Vec<RawCandidate>, ScraperError> {
    let items = parse_feed(xml, 50)?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let title = item.title()?;
            let (rank, name) = match RSS_TITLE_RE.captures(title) {
                Some(caps) => (
                    caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()),
                    caps.get(2).map_or(title, |m| m.as_str()),
                ),
                None => (None, title),
            };
            let description = item.description().unwrap_or_default();
            let image = IMG_SRC_RE
                .captures(description)
                .and_then(|c| c.get(1))
                .and_then(|m| normalize_image_url(m.as_str()));
            // Descriptions embed markup; strip tags before reading the price.
            let plain = Html::parse_fragment(description)
                .root_element()
                .text()
                .collect::<String>();
            Some(
                RawCandidate::new(SourceTag::Amazon, clean_text(name))
                    .with_metrics(RawMetrics {
                        rank,
                        price: parse_price(&plain),
                        category: Some(slug.to_string()),
                        ..RawMetrics::default()
                    })
                    .with_image(image)
                    .with_url(item.link().map(str::to_owned)),
            )
        })
        .collect())
}

/// Parse bestseller-style cards, trying each known layout until one matches.
pub(crate) fn parse_cards(html: &str, page_url: &str, slug: &str) -> Vec<RawCandidate> {
    let doc = Html::parse_document(html);
    for layout in &LAYOUTS {
        let Some(card_sel) = selector(layout.card) else {
            continue;
        };
        let found: Vec<RawCandidate> = doc
            .select(&card_sel)
            .enumerate()
            .filter_map(|(idx, card)| {
                let name = first_text(&card, layout.name)
                    .or_else(|| first_attr(&card, &["img"], &["alt"]))?;
                let price = first_text(&card, layout.price).and_then(|t| parse_price(&t));
                let growth = first_text(&card, layout.growth).and_then(|t| parse_percent(&t));
                let image = first_attr(&card, layout.image, &["src", "data-src"])
                    .and_then(|u| normalize_image_url(&u));
                let link = first_attr(&card, layout.link, &["href"])
                    .and_then(|href| absolutize(page_url, &href));
                Some(
                    RawCandidate::new(SourceTag::Amazon, name)
                        .with_metrics(RawMetrics {
                            rank: u32::try_from(idx + 1).ok(),
                            price,
                            growth_percent: growth,
                            category: Some(slug.to_string()),
                            ..RawMetrics::default()
                        })
                        .with_image(image)
                        .with_url(link),
                )
            })
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Every `/dp/` link with visible text or image alt, one per ASIN.
pub(crate) fn parse_product_links(html: &str, page_url: &str, slug: &str) -> Vec<RawCandidate> {
    let doc = Html::parse_document(html);
    let Some(link_sel) = selector("a[href*='/dp/']") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    doc.select(&link_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let asin = ASIN_RE.captures(href)?.get(1)?.as_str().to_string();
            let text = element_text(&a);
            let name = if text.len() >= 4 {
                text
            } else {
                first_attr(&a, &["img"], &["alt"])?
            };
            if !seen.insert(asin.clone()) {
                return None;
            }
            let image = first_attr(&a, &["img"], &["src"]).and_then(|u| normalize_image_url(&u));
            Some(
                RawCandidate::new(SourceTag::Amazon, name)
                    .with_metrics(RawMetrics {
                        category: Some(slug.to_string()),
                        ..RawMetrics::default()
                    })
                    .with_image(image)
                    .with_url(absolutize(page_url, &format!("/dp/{asin}"))),
            )
        })
        .collect()
}

/// Fetch one page per slug and parse each synchronously.
async fn per_slug<F>(
    fetcher: &HttpFetcher,
    urls: Vec<(String, String)>,
    parse: F,
) -> Result<Vec<RawCandidate>, ScraperError>
where
    F: Fn(&str, &str, &str) -> Result<Vec<RawCandidate>, ScraperError> + Send + Sync,
{
    let mut out = Vec::new();
    let mut last_err = None;
    for (slug, url) in urls {
        match fetcher.get_text(&url).await {
            Ok(body) => match parse(&body, &url, &slug) {
                Ok(found) => out.extend(found),
                Err(e) => last_err = Some(e),
            },
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "amazon page failed");
                last_err = Some(e);
            }
        }
    }
    match (out.is_empty(), last_err) {
        (true, Some(e)) => Err(e),
        _ => Ok(out),
    }
}

fn slug_urls(base: &str, path: &str, category: Option<&str>) -> Vec<(String, String)> {
    slugs_for(category)
        .into_iter()
        .map(|slug| {
            let url = format!("{base}/gp/{path}/{slug}");
            (slug, url)
        })
        .collect()
}

struct BestsellerFeed {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for BestsellerFeed {
    fn name(&self) -> &'static str {
        "bestseller_rss"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let urls = slug_urls(&self.base, "rss/bestsellers", category);
        per_slug(&self.fetcher, urls, |body, _url, slug| parse_rss(body, slug)).await
    }
}

struct BestsellerPage {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for BestsellerPage {
    fn name(&self) -> &'static str {
        "bestseller_page"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let urls = slug_urls(&self.base, "bestsellers", category);
        per_slug(&self.fetcher, urls, |body, url, slug| Ok(parse_cards(body, url, slug))).await
    }
}

struct MoversPage {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for MoversPage {
    fn name(&self) -> &'static str {
        "movers_and_shakers"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let urls = slug_urls(&self.base, "movers-and-shakers", category);
        per_slug(&self.fetcher, urls, |body, url, slug| Ok(parse_cards(body, url, slug))).await
    }
}

struct ProductLinks {
    fetcher: Arc<HttpFetcher>,
    base: String,
}

#[async_trait]
impl Strategy for ProductLinks {
    fn name(&self) -> &'static str {
        "product_links"
    }

    async fn fetch(&self, category: Option<&str>) -> Result<Vec<RawCandidate>, ScraperError> {
        let urls = slug_urls(&self.base, "bestsellers", category);
        per_slug(&self.fetcher, urls, |body, url, slug| {
            Ok(parse_product_links(body, url, slug))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maps_to_known_slug_or_slugifies() {
        assert_eq!(slugs_for(None).len(), 3);
        assert_eq!(slugs_for(Some("Kitchen")), vec!["home-garden"]);
        assert_eq!(slugs_for(Some("Arts & Crafts")), vec!["arts-crafts"]);
    }

    #[test]
    fn rss_title_rank_image_and_price() {
        let xml = r#"<rss><channel><item>
            <title>#3: Mini Portable Blender, USB Rechargeable</title>
            <link>https://www.amazon.com/dp/B0BLEND001</link>
            <description><![CDATA[<a href="x"><img src="https://m.media-amazon.com/images/I/blend.jpg" /></a><span class="price"><b>$29.99</b></span>]]></description>
        </item></channel></rss>"#;
        let out = parse_rss(xml, "electronics").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Mini Portable Blender, USB Rechargeable");
        assert_eq!(out[0].metrics.rank, Some(3));
        assert_eq!(out[0].metrics.price, Some(29.99));
        assert_eq!(
            out[0].image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/blend.jpg")
        );
    }

    #[test]
    fn grid_cards_parse() {
        let html = r#"<html><body>
          <div id="gridItemRoot1">
            <a class="a-link-normal" href="/Sunset-Lamp/dp/B0LAMP0001/ref=zg"><img src="https://m.media-amazon.com/lamp.jpg" alt="Sunset Lamp"></a>
            <div class="_cDEzb_p13n-sc-css-line-clamp-3_g3dy1">Sunset Projection Lamp</div>
            <span class="p13n-sc-price">$19.99</span>
          </div>
          <div id="gridItemRoot2">
            <a class="a-link-normal" href="/dp/B0FAN00002"><img src="//m.media-amazon.com/fan.jpg" alt="Neck Fan"></a>
          </div>
        </body></html>"#;
        let out = parse_cards(html, "https://www.amazon.com/gp/bestsellers/home-garden", "home-garden");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "Sunset Projection Lamp");
        assert_eq!(out[0].metrics.price, Some(19.99));
        assert_eq!(
            out[0].product_url.as_deref(),
            Some("https://www.amazon.com/Sunset-Lamp/dp/B0LAMP0001/ref=zg")
        );
        assert_eq!(out[1].name, "Neck Fan");
        assert_eq!(out[1].image_url.as_deref(), Some("https://m.media-amazon.com/fan.jpg"));
        assert_eq!(out[1].metrics.rank, Some(2));
    }

    #[test]
    fn movers_cards_carry_growth() {
        let html = r#"<ul><li class="zg-item-immersion">
            <span class="zg-percent-change">+1,240%</span>
            <div class="p13n-sc-truncate">Cloud Slides</div>
            <span class="p13n-sc-price">$24.00</span>
        </li></ul>"#;
        let out = parse_cards(html, "https://www.amazon.com/gp/movers-and-shakers/x", "x");
        assert_eq!(out[0].metrics.growth_percent, Some(1240.0));
    }

    #[test]
    fn product_links_dedupe_by_asin() {
        let html = r#"<div>
          <a href="/Ice-Roller/dp/B0ICE00001/ref=a">Ice Roller for Face</a>
          <a href="/dp/B0ICE00001?th=1">Ice Roller for Face (again)</a>
          <a href="/dp/B0SHORT001">ab</a>
          <a href="/dp/B0PIC00001"><img src="https://m.media-amazon.com/p.jpg" alt="Galaxy Projector"></a>
        </div>"#;
        let out = parse_product_links(html, "https://www.amazon.com/gp/bestsellers/x", "x");
        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ice Roller for Face", "Galaxy Projector"]);
        assert_eq!(out[0].product_url.as_deref(), Some("https://www.amazon.com/dp/B0ICE00001"));
    }
}
