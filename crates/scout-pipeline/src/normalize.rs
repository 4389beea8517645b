//! Normalizer / validator: the single place a [`CandidateProduct`] is built.
//!
//! Every producer (the heuristic scorer, the reasoning-service response
//! parser) fills a [`CandidateDraft`], a loosely-typed record in which every
//! field is optional, and hands it to [`validate`]. The draft contract:
//!
//! - `name` is required; a draft without a non-blank name is rejected.
//! - Numeric fields accept JSON numbers or strings such as `"$12.99"`,
//!   `"45%"` or `"1.2M"`; anything unparseable counts as absent.
//! - Absent numbers become zero, absent enums fall back to a value derived
//!   from related numbers, absent text falls back to a fixed default.
//!
//! `validate` never invents a name or a price. It only clamps, truncates,
//! and derives margin, saturation and trend direction from fields already
//! present.

use scout_core::{CandidateProduct, RawCandidate, Saturation, SourceTag, TrendDirection};
use scout_scraper::html::{normalize_image_url, parse_compact_count};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_CATEGORY_CHARS: usize = 50;
pub const MAX_RATIONALE_CHARS: usize = 200;
const DEFAULT_CATEGORY: &str = "General";

/// Unvalidated candidate fields. See the module docs for the contract.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CandidateDraft {
    pub name: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub estimated_views: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub source_cost: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub recommended_price: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub margin_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub trend_score: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub overall_score: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub competition_score: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub profit_score: Option<f64>,
    pub category: Option<String>,
    pub why_trending: Option<String>,
    pub saturation: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub active_ads: Option<f64>,
    pub trend_direction: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub trend_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub search_volume: Option<f64>,
    #[serde(deserialize_with = "lenient_list")]
    pub platforms: Vec<String>,
}

impl CandidateDraft {
    /// Copy the facts a collector observed. Scores and rationale are left
    /// empty for the caller to fill.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_raw(raw: &RawCandidate) -> Self {
        let m = &raw.metrics;
        Self {
            name: Some(raw.name.clone()),
            source: Some(raw.source.as_str().to_string()),
            image_url: raw.image_url.clone(),
            product_url: raw.product_url.clone(),
            estimated_views: m.views.map(|v| v as f64),
            active_ads: m.ad_count.map(|v| v as f64),
            trend_percent: m.growth_percent,
            search_volume: m.search_volume.map(|v| v as f64),
            category: m.category.clone(),
            ..Self::default()
        }
    }
}

/// Turn a draft into a canonical record, or `None` when it has no usable name.
///
/// `fallback_source` is used when the draft's source is missing or unknown.
#[must_use]
pub fn validate(draft: CandidateDraft, fallback_source: SourceTag) -> Option<CandidateProduct> {
    let name = draft
        .name
        .as_deref()
        .map(collapse_whitespace)
        .filter(|n| !n.is_empty())?;
    let name = truncate_chars(&name, MAX_NAME_CHARS);

    let source = draft
        .source
        .as_deref()
        .and_then(|s| s.parse::<SourceTag>().ok())
        .unwrap_or(fallback_source);

    let source_cost = round2(non_negative(draft.source_cost));
    let recommended_price = round2(non_negative(draft.recommended_price));
    let margin_percent = if source_cost > 0.0 && recommended_price > 0.0 {
        round1((recommended_price - source_cost) / recommended_price * 100.0)
    } else {
        draft
            .margin_percent
            .filter(|m| m.is_finite())
            .map_or(0.0, |m| round1(m.clamp(0.0, 100.0)))
    };

    let active_ads = count(draft.active_ads);
    let saturation = match draft.saturation.as_deref() {
        Some(s) if !s.trim().is_empty() => Saturation::parse_lenient(s),
        _ if draft.active_ads.is_some() => Saturation::from_ad_count(active_ads),
        _ => Saturation::default(),
    };

    let trend_percent = draft
        .trend_percent
        .filter(|p| p.is_finite())
        .map_or(0.0, round1);
    let trend_direction = match draft.trend_direction.as_deref() {
        Some(s) if !s.trim().is_empty() => TrendDirection::parse_lenient(s),
        _ => TrendDirection::from_growth(trend_percent),
    };

    let category = draft
        .category
        .as_deref()
        .map(collapse_whitespace)
        .filter(|c| !c.is_empty())
        .map_or_else(|| DEFAULT_CATEGORY.to_string(), |c| truncate_chars(&c, MAX_CATEGORY_CHARS));
    let why_trending = draft
        .why_trending
        .as_deref()
        .map(collapse_whitespace)
        .map(|w| truncate_chars(&w, MAX_RATIONALE_CHARS))
        .unwrap_or_default();

    let mut platforms: Vec<String> = Vec::new();
    for p in draft.platforms {
        let p = p.trim().to_lowercase();
        if !p.is_empty() && !platforms.contains(&p) {
            platforms.push(p);
        }
    }
    if platforms.is_empty() {
        platforms.push(source.as_str().to_string());
    }

    Some(CandidateProduct {
        name,
        source,
        image_url: draft.image_url.as_deref().and_then(normalize_image_url),
        product_url: draft
            .product_url
            .map(|u| u.trim().to_string())
            .filter(|u| u.starts_with("https://") || u.starts_with("http://")),
        estimated_views: count(draft.estimated_views),
        source_cost,
        recommended_price,
        margin_percent,
        trend_score: clamp_score(draft.trend_score),
        overall_score: clamp_score(draft.overall_score),
        competition_score: clamp_score(draft.competition_score),
        profit_score: clamp_score(draft.profit_score),
        category,
        why_trending,
        saturation,
        active_ads,
        trend_direction,
        trend_percent,
        search_volume: count(draft.search_volume),
        platforms,
        raw_metrics: scout_core::RawMetrics::default(),
        enriched: false,
    })
}

/// Clamp to `0..=100` and round. Non-finite or missing values score zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_score(value: Option<f64>) -> u8 {
    value
        .filter(|v| v.is_finite())
        .map_or(0, |v| v.clamp(0.0, 100.0).round() as u8)
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: Option<f64>) -> u64 {
    non_negative(value).round() as u64
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Parse a number from a JSON number or a display string.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let lower = trimmed.to_ascii_lowercase();
            let compact = lower
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
                .any(|tok| {
                    tok.len() > 1
                        && tok.ends_with(['k', 'm', 'b'])
                        && tok[..tok.len() - 1]
                            .chars()
                            .all(|c| c.is_ascii_digit() || c == '.')
                });
            if compact {
                parse_compact_count(trimmed).map(|n| n as f64)
            } else {
                let cleaned: String = trimmed
                    .chars()
                    .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                    .collect();
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
