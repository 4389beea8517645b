//! Image resolver: backfills missing or implausible product media through
//! secondary lookups, with a fixed concurrency ceiling.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use scout_core::CandidateProduct;
use scout_scraper::html::normalize_image_url;
use scout_scraper::ImageLookup;

/// Shorter URLs cannot point at a real image host path.
pub const MIN_IMAGE_URL_LEN: usize = 20;

const PLACEHOLDER_FILES: [&str; 4] = ["blank.gif", "spacer.gif", "transparent.png", "1x1.gif"];

/// Returns `true` when `url` is missing, protocol-relative, too short, not
/// http(s), or a plain-http link to an obvious placeholder file.
///
/// A long `https://` URL is always kept.
#[must_use]
pub fn needs_lookup(url: Option<&str>) -> bool {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return true;
    };
    if url.starts_with("//") || url.len() < MIN_IMAGE_URL_LEN {
        return true;
    }
    if url.starts_with("https://") && url.len() > MIN_IMAGE_URL_LEN {
        return false;
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return true;
    }
    is_placeholder_file(url)
}

fn is_placeholder_file(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    file.ends_with(".svg")
        || file.starts_with("placeholder.")
        || PLACEHOLDER_FILES.contains(&file.as_str())
}

pub struct ImageResolver {
    lookups: Vec<Arc<dyn ImageLookup>>,
    concurrency: usize,
}

impl ImageResolver {
    /// At most two lookups are consulted per product, in the given order.
    #[must_use]
    pub fn new(lookups: Vec<Arc<dyn ImageLookup>>, concurrency: usize) -> Self {
        Self {
            lookups: lookups.into_iter().take(2).collect(),
            concurrency: concurrency.max(1),
        }
    }

    /// Backfill images, preserving order. Products that already have a
    /// plausible URL are returned unchanged, so a second pass is a no-op.
    pub async fn resolve_images(&self, products: Vec<CandidateProduct>) -> Vec<CandidateProduct> {
        let pending = products
            .iter()
            .filter(|p| needs_lookup(p.image_url.as_deref()))
            .count();
        if pending == 0 {
            return products;
        }
        tracing::debug!(pending, concurrency = self.concurrency, "resolving product images");

        stream::iter(products)
            .map(|product| self.resolve_one(product))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn resolve_one(&self, mut product: CandidateProduct) -> CandidateProduct {
        if !needs_lookup(product.image_url.as_deref()) {
            return product;
        }

        // A protocol-relative URL only lacks its scheme.
        if let Some(fixed) = product.image_url.as_deref().and_then(normalize_image_url) {
            if !needs_lookup(Some(&fixed)) {
                product.image_url = Some(fixed);
                return product;
            }
        }

        for lookup in &self.lookups {
            match lookup.find_image(&product.name).await {
                Ok(Some(url)) if !needs_lookup(Some(&url)) => {
                    tracing::debug!(product = %product.name, lookup = lookup.name(), "image resolved");
                    product.image_url = Some(url);
                    return product;
                }
                Ok(_) => {
                    tracing::debug!(product = %product.name, lookup = lookup.name(), "no plausible image");
                }
                Err(e) => {
                    tracing::debug!(
                        product = %product.name,
                        lookup = lookup.name(),
                        error = %e,
                        "image lookup failed"
                    );
                }
            }
        }
        product
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use scout_core::SourceTag;
    use scout_scraper::ScraperError;

    use super::*;

    struct Fixed {
        answer: Option<&'static str>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageLookup for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn find_image(&self, _query: &str) -> Result<Option<String>, ScraperError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.answer.map(str::to_string))
        }
    }

    fn dyn_lookup(lookup: &Arc<Fixed>) -> Arc<dyn ImageLookup> {
        Arc::clone(lookup) as Arc<dyn ImageLookup>
    }

    struct Broken;

    #[async_trait]
    impl ImageLookup for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn find_image(&self, _query: &str) -> Result<Option<String>, ScraperError> {
            Err(ScraperError::Blocked {
                domain: "www.bing.com".to_string(),
                status: 403,
            })
        }
    }

    fn product(name: &str, image: Option<&str>) -> CandidateProduct {
        CandidateProduct {
            image_url: image.map(str::to_string),
            ..CandidateProduct::new(name, SourceTag::Tiktok)
        }
    }

    const GOOD: &str = "https://cdn.example.com/images/neck-fan.jpg";
    const FOUND: &str = "https://images.example.net/found/lamp.jpg";

    #[test]
    fn classifies_urls() {
        assert!(needs_lookup(None));
        assert!(needs_lookup(Some("  ")));
        assert!(needs_lookup(Some("//cdn.example.com/images/neck-fan.jpg")));
        assert!(needs_lookup(Some("https://x.co/a.jpg")));
        assert!(needs_lookup(Some("data:image/png;base64,AAAAAAAAAAAAAAAA")));
        assert!(needs_lookup(Some("http://cdn.example.com/static/logo.svg?v=2")));
        assert!(needs_lookup(Some("http://cdn.example.com/img/placeholder.png")));
        assert!(needs_lookup(Some("http://cdn.example.com/img/spacer.gif")));
        assert!(!needs_lookup(Some("http://cdn.example.com/sprite-bottle-holder.jpg")));
        assert!(!needs_lookup(Some(GOOD)));
    }

    #[tokio::test]
    async fn long_https_url_is_kept_whatever_its_name() {
        let lookup = Fixed::new(Some(FOUND));
        let resolver = ImageResolver::new(vec![dyn_lookup(&lookup)], 5);
        let urls = [
            "https://cdn.shopify.com/s/files/sprite-drink-bottle-holder.jpg",
            "https://cdn.shopify.com/s/files/wall-art-1x1-canvas.jpg",
            "https://cdn.shopify.com/s/files/logo-mark.svg",
            "https://cdn.example.com/img/placeholder.png",
        ];
        let input: Vec<_> = urls.iter().map(|u| product("Holder", Some(u))).collect();

        let out = resolver.resolve_images(input).await;
        let kept: Vec<_> = out.iter().map(|p| p.image_url.as_deref()).collect();
        assert_eq!(kept, urls.iter().map(|u| Some(*u)).collect::<Vec<_>>());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn plausible_https_url_is_never_replaced() {
        let lookup = Fixed::new(Some(FOUND));
        let resolver = ImageResolver::new(vec![dyn_lookup(&lookup)], 5);
        let out = resolver.resolve_images(vec![product("Neck Fan", Some(GOOD))]).await;
        assert_eq!(out[0].image_url.as_deref(), Some(GOOD));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn protocol_relative_is_fixed_without_lookup() {
        let lookup = Fixed::new(Some(FOUND));
        let resolver = ImageResolver::new(vec![dyn_lookup(&lookup)], 5);
        let out = resolver
            .resolve_images(vec![product("Neck Fan", Some("//cdn.example.com/images/neck-fan.jpg"))])
            .await;
        assert_eq!(out[0].image_url.as_deref(), Some(GOOD));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_lookup_falls_through_then_leaves_field() {
        let broken: Arc<dyn ImageLookup> = Arc::new(Broken);
        let resolver = ImageResolver::new(vec![broken, dyn_lookup(&Fixed::new(Some(FOUND)))], 5);
        let out = resolver.resolve_images(vec![product("Lamp", None)]).await;
        assert_eq!(out[0].image_url.as_deref(), Some(FOUND));

        let resolver = ImageResolver::new(vec![Arc::new(Broken) as Arc<dyn ImageLookup>], 5);
        let out = resolver
            .resolve_images(vec![product("Lamp", Some("https://x.co/a.jpg"))])
            .await;
        assert_eq!(out[0].image_url.as_deref(), Some("https://x.co/a.jpg"));
    }

    #[tokio::test]
    async fn implausible_lookup_result_is_rejected() {
        let resolver = ImageResolver::new(vec![dyn_lookup(&Fixed::new(Some("https://x.co/a.svg")))], 5);
        let out = resolver.resolve_images(vec![product("Lamp", None)]).await;
        assert!(out[0].image_url.is_none());
    }

    #[tokio::test]
    async fn concurrency_ceiling_and_order_hold() {
        let lookup = Fixed::new(Some(FOUND));
        let resolver = ImageResolver::new(vec![dyn_lookup(&lookup)], 3);
        let input: Vec<_> = (0..12).map(|i| product(&format!("P{i}"), None)).collect();

        let out = resolver.resolve_images(input).await;
        let names: Vec<_> = out.iter().map(|p| p.name.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| format!("P{i}")).collect();
        assert_eq!(names, expected);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 12);
        assert!(lookup.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let lookup = Fixed::new(Some(FOUND));
        let resolver = ImageResolver::new(vec![dyn_lookup(&lookup)], 5);
        let once = resolver.resolve_images(vec![product("Lamp", None)]).await;
        let twice = resolver.resolve_images(once.clone()).await;
        assert_eq!(once, twice);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
