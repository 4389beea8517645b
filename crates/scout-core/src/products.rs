use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External source a candidate was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Short-video trend service.
    Tiktok,
    /// General marketplace bestseller lists.
    Amazon,
    /// B2C marketplace search and deals.
    Aliexpress,
    /// Search-trend related queries.
    GoogleTrends,
    /// Ad-transparency archive.
    MetaAds,
    /// Public storefront catalogs.
    Shopify,
}

impl SourceTag {
    pub const ALL: [SourceTag; 6] = [
        SourceTag::Tiktok,
        SourceTag::Amazon,
        SourceTag::Aliexpress,
        SourceTag::GoogleTrends,
        SourceTag::MetaAds,
        SourceTag::Shopify,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Tiktok => "tiktok",
            SourceTag::Amazon => "amazon",
            SourceTag::Aliexpress => "aliexpress",
            SourceTag::GoogleTrends => "google_trends",
            SourceTag::MetaAds => "meta_ads",
            SourceTag::Shopify => "shopify",
        }
    }

    /// Returns `true` for sources whose listed price is what a shopper pays
    /// at retail, so the heuristic scorer derives supplier cost from it.
    #[must_use]
    pub fn lists_retail_price(self) -> bool {
        matches!(self, SourceTag::Amazon | SourceTag::Shopify)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "tiktok" => Ok(SourceTag::Tiktok),
            "amazon" => Ok(SourceTag::Amazon),
            "aliexpress" => Ok(SourceTag::Aliexpress),
            "google_trends" | "googletrends" | "trends" => Ok(SourceTag::GoogleTrends),
            "meta_ads" | "meta" | "facebook_ads" => Ok(SourceTag::MetaAds),
            "shopify" => Ok(SourceTag::Shopify),
            other => Err(format!("unknown source \"{other}\"")),
        }
    }
}

/// Source-specific metrics carried by a [`RawCandidate`].
///
/// Every field is optional: each collector fills only what its source
/// exposes. The normalizer and heuristic scorer treat `None` as "unknown",
/// never as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_percent: Option<f64>,
    /// Listed price in the source's display currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_volume: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_count: Option<u64>,
    /// Position in a ranked list (bestsellers, movers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    /// Seed query that surfaced the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Retrieval strategy that produced the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Unvalidated product record produced by one collector strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub source: SourceTag,
    pub name: String,
    pub metrics: RawMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl RawCandidate {
    #[must_use]
    pub fn new(source: SourceTag, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            metrics: RawMetrics::default(),
            image_url: None,
            product_url: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: RawMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_url(mut self, product_url: Option<String>) -> Self {
        self.product_url = product_url.filter(|u| !u.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Saturation {
    Low,
    #[default]
    Medium,
    High,
}

impl Saturation {
    /// Lenient parse; unknown values fall back to `Medium`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Saturation::Low,
            "high" => Saturation::High,
            _ => Saturation::Medium,
        }
    }

    /// Bucket an active-ad count into a saturation tier.
    #[must_use]
    pub fn from_ad_count(active_ads: u64) -> Self {
        match active_ads {
            0..50 => Saturation::Low,
            50..150 => Saturation::Medium,
            _ => Saturation::High,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Stable,
}

impl TrendDirection {
    /// Lenient parse; unknown values fall back to `Stable`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "rising" => TrendDirection::Up,
            "down" | "falling" => TrendDirection::Down,
            _ => TrendDirection::Stable,
        }
    }

    /// Direction implied by a growth percentage, with a ±10% dead band.
    #[must_use]
    pub fn from_growth(percent: f64) -> Self {
        if percent > 10.0 {
            TrendDirection::Up
        } else if percent < -10.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

/// Canonical, score-bounded product record.
///
/// Built only through the normalizer so that score fields are clamped to
/// `0..=100` and `margin_percent` agrees with `source_cost` and
/// `recommended_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub name: String,
    pub source: SourceTag,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub estimated_views: u64,
    pub source_cost: f64,
    pub recommended_price: f64,
    pub margin_percent: f64,
    pub trend_score: u8,
    pub overall_score: u8,
    pub competition_score: u8,
    pub profit_score: u8,
    pub category: String,
    pub why_trending: String,
    pub saturation: Saturation,
    pub active_ads: u64,
    pub trend_direction: TrendDirection,
    pub trend_percent: f64,
    pub search_volume: u64,
    pub platforms: Vec<String>,
    pub raw_metrics: RawMetrics,
    /// `true` when scores came from the reasoning service rather than the
    /// heuristic fallback.
    pub enriched: bool,
}

impl CandidateProduct {
    /// A record with neutral scores and no commercial data.
    #[must_use]
    pub fn new(name: impl Into<String>, source: SourceTag) -> Self {
        Self {
            name: name.into(),
            source,
            image_url: None,
            product_url: None,
            estimated_views: 0,
            source_cost: 0.0,
            recommended_price: 0.0,
            margin_percent: 0.0,
            trend_score: 0,
            overall_score: 0,
            competition_score: 0,
            profit_score: 0,
            category: "General".to_string(),
            why_trending: String::new(),
            saturation: Saturation::default(),
            active_ads: 0,
            trend_direction: TrendDirection::default(),
            trend_percent: 0.0,
            search_volume: 0,
            platforms: vec![source.as_str().to_string()],
            raw_metrics: RawMetrics::default(),
            enriched: false,
        }
    }
}
