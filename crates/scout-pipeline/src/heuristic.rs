//! Deterministic fallback scorer used when the reasoning service is absent
//! or fails.
//!
//! Prices are never invented: a candidate without a listed price keeps zero
//! cost and zero recommended price. Scores come from fixed threshold rules
//! over whatever the collector observed.

use scout_core::{AppConfig, CandidateProduct, RawCandidate, RawMetrics};

use crate::normalize::{round2, validate, CandidateDraft};

const BASE_SCORE: u8 = 40;
const MAX_HEURISTIC_SCORE: u8 = 95;

#[derive(Debug, Clone, Copy)]
pub struct HeuristicScorer {
    /// Share of a retail price assumed to be the supplier cost.
    pub cost_ratio: f64,
    /// Sell price as a multiple of a supplier price.
    pub markup_multiple: f64,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self {
            cost_ratio: 0.30,
            markup_multiple: 3.0,
        }
    }
}

impl HeuristicScorer {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            cost_ratio: config.cost_ratio,
            markup_multiple: config.markup_multiple,
        }
    }

    /// Score one raw candidate. Returns `None` only when the name is unusable.
    #[must_use]
    pub fn score(&self, raw: &RawCandidate) -> Option<CandidateProduct> {
        let m = &raw.metrics;
        let (source_cost, recommended_price) = self.prices(raw);
        let signal = signal_score(m);

        let trend = m
            .growth_percent
            .map_or(signal, |g| growth_score(g).unwrap_or(BASE_SCORE));
        let competition = m
            .ad_count
            .map_or(50.0, |ads| f64::from(u8::try_from(ads.min(200) / 2).unwrap_or(100)));
        let profit = if source_cost > 0.0 && recommended_price > source_cost {
            (recommended_price - source_cost) / recommended_price * 100.0
        } else {
            50.0
        };

        let mut draft = CandidateDraft::from_raw(raw);
        draft.source_cost = Some(source_cost);
        draft.recommended_price = Some(recommended_price);
        draft.overall_score = Some(f64::from(signal));
        draft.trend_score = Some(f64::from(trend));
        draft.competition_score = Some(competition);
        draft.profit_score = Some(profit);
        draft.why_trending = Some(rationale(raw));

        let mut product = validate(draft, raw.source)?;
        product.raw_metrics = raw.metrics.clone();
        Some(product)
    }

    fn prices(&self, raw: &RawCandidate) -> (f64, f64) {
        let Some(price) = raw.metrics.price.filter(|p| p.is_finite() && *p > 0.0) else {
            return (0.0, 0.0);
        };
        if raw.source.lists_retail_price() {
            (round2(price * self.cost_ratio), price)
        } else {
            (price, round2(price * self.markup_multiple))
        }
    }
}

fn order_score(orders: u64) -> Option<u8> {
    match orders {
        0 => None,
        1..=100 => Some(45),
        101..=1000 => Some(55),
        _ => {
            let bonus = match orders {
                50_000.. => 25,
                10_000.. => 15,
                5_000.. => 10,
                _ => 5,
            };
            Some(70 + bonus)
        }
    }
}

fn growth_score(growth: f64) -> Option<u8> {
    if !growth.is_finite() || growth <= 0.0 {
        return None;
    }
    Some(match growth {
        g if g >= 500.0 => 85,
        g if g >= 200.0 => 75,
        g if g >= 100.0 => 65,
        g if g >= 25.0 => 55,
        _ => 45,
    })
}

fn reach_score(views: u64) -> Option<u8> {
    match views {
        10_000_000.. => Some(80),
        1_000_000.. => Some(70),
        100_000.. => Some(55),
        _ => None,
    }
}

fn volume_score(volume: u64) -> Option<u8> {
    match volume {
        100_000.. => Some(70),
        10_000.. => Some(60),
        1_000.. => Some(50),
        _ => None,
    }
}

fn rank_score(rank: u32) -> u8 {
    match rank {
        0..=10 => 65,
        11..=50 => 55,
        _ => 45,
    }
}

/// Strongest applicable signal, capped so heuristic scores never reach the
/// top of the range.
fn signal_score(m: &RawMetrics) -> u8 {
    [
        m.orders.and_then(order_score),
        m.growth_percent.and_then(growth_score),
        m.views.and_then(reach_score),
        m.search_volume.and_then(volume_score),
        m.rank.map(rank_score),
        m.ad_count.filter(|n| *n > 0).map(|_| 50),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(BASE_SCORE)
    .min(MAX_HEURISTIC_SCORE)
}

fn rationale(raw: &RawCandidate) -> String {
    let m = &raw.metrics;
    let source = raw.source;
    if let Some(orders) = m.orders.filter(|o| *o > 0) {
        return format!("{} orders on {source}", group_thousands(orders));
    }
    if let Some(growth) = m.growth_percent.filter(|g| *g > 0.0) {
        return format!("Search interest up {growth:.0}% on {source}");
    }
    if let Some(views) = m.views.filter(|v| *v > 0) {
        return format!("{} views on {source}", group_thousands(views));
    }
    if let Some(rank) = m.rank {
        return format!("Ranked #{rank} on {source}");
    }
    if let Some(ads) = m.ad_count.filter(|a| *a > 0) {
        return format!("{ads} active ads running");
    }
    match m.strategy.as_deref() {
        Some(strategy) => format!("Surfaced by {strategy} on {source}"),
        None => format!("Trending on {source}"),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use scout_core::SourceTag;

    use super::*;

    fn raw(source: SourceTag, metrics: RawMetrics) -> RawCandidate {
        RawCandidate::new(source, "Portable Blender").with_metrics(metrics)
    }

    #[test]
    fn retail_source_derives_cost_from_price() {
        let product = HeuristicScorer::default()
            .score(&raw(
                SourceTag::Amazon,
                RawMetrics {
                    price: Some(40.0),
                    ..RawMetrics::default()
                },
            ))
            .unwrap();
        assert!((product.recommended_price - 40.0).abs() < 1e-9);
        assert!((product.source_cost - 12.0).abs() < 1e-9);
        assert!((product.margin_percent - 70.0).abs() < 1e-9);
    }

    #[test]
    fn supplier_source_marks_up_price() {
        let product = HeuristicScorer::default()
            .score(&raw(
                SourceTag::Aliexpress,
                RawMetrics {
                    price: Some(5.5),
                    orders: Some(12_400),
                    ..RawMetrics::default()
                },
            ))
            .unwrap();
        assert!((product.source_cost - 5.5).abs() < 1e-9);
        assert!((product.recommended_price - 16.5).abs() < 1e-9);
        assert_eq!(product.overall_score, 85);
        assert_eq!(product.why_trending, "12,400 orders on aliexpress");
    }

    #[test]
    fn missing_price_is_never_invented() {
        let product = HeuristicScorer::default()
            .score(&raw(SourceTag::Tiktok, RawMetrics::default()))
            .unwrap();
        assert!(product.source_cost.abs() < f64::EPSILON);
        assert!(product.recommended_price.abs() < f64::EPSILON);
        assert_eq!(product.overall_score, BASE_SCORE);
    }

    #[test]
    fn order_buckets_are_capped() {
        assert_eq!(order_score(1_001), Some(75));
        assert_eq!(order_score(5_000), Some(80));
        assert_eq!(order_score(1_000_000), Some(95));
        assert_eq!(order_score(0), None);
        let metrics = RawMetrics {
            orders: Some(2_000_000),
            growth_percent: Some(9_000.0),
            ..RawMetrics::default()
        };
        assert_eq!(signal_score(&metrics), MAX_HEURISTIC_SCORE);
    }

    #[test]
    fn strongest_signal_wins() {
        let metrics = RawMetrics {
            views: Some(2_500_000),
            rank: Some(40),
            ..RawMetrics::default()
        };
        assert_eq!(signal_score(&metrics), 70);
    }

    #[test]
    fn ad_count_sets_competition_and_saturation() {
        let product = HeuristicScorer::default()
            .score(&raw(
                SourceTag::MetaAds,
                RawMetrics {
                    ad_count: Some(120),
                    ..RawMetrics::default()
                },
            ))
            .unwrap();
        assert_eq!(product.competition_score, 60);
        assert_eq!(product.saturation, scout_core::Saturation::Medium);
        assert_eq!(product.active_ads, 120);
    }

    #[test]
    fn raw_metrics_retained_for_audit() {
        let metrics = RawMetrics {
            rank: Some(3),
            strategy: Some("bestseller_rss".to_string()),
            ..RawMetrics::default()
        };
        let product = HeuristicScorer::default()
            .score(&raw(SourceTag::Amazon, metrics.clone()))
            .unwrap();
        assert_eq!(product.raw_metrics, metrics);
        assert_eq!(product.why_trending, "Ranked #3 on amazon");
        assert!(!product.enriched);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
