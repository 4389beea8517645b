//! Single-product analysis: ad-archive competition lookup plus an optional
//! structured assessment from the reasoning service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scout_core::Saturation;
use scout_scraper::{AdArchive, AdSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ReasoningClient;
use crate::normalize::{clamp_score, number_from_value, round2};

const SYSTEM_PROMPT: &str = "You are a competition analyst for online stores. \
You assess whether a product is worth launching. Reply with a single JSON object and nothing else.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Launch,
    Caution,
    Avoid,
}

impl Recommendation {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "launch" | "go" => Some(Self::Launch),
            "caution" | "test" => Some(Self::Caution),
            "avoid" | "skip" => Some(Self::Avoid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAnalysis {
    pub product_name: String,
    pub active_ads: u64,
    pub top_advertisers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub competition_level: Saturation,
    pub saturation_score: u8,
    pub recommendation: Recommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    pub ad_angles: Vec<String>,
    pub risks: Vec<String>,
    pub opportunity_score: u8,
    /// `true` when the reasoning service produced the assessment.
    pub ai_analyzed: bool,
    pub analyzed_at: DateTime<Utc>,
}

pub struct ProductAnalyzer {
    archive: AdArchive,
    reasoning: Option<Arc<dyn ReasoningClient>>,
}

impl ProductAnalyzer {
    #[must_use]
    pub fn new(archive: AdArchive, reasoning: Option<Arc<dyn ReasoningClient>>) -> Self {
        Self { archive, reasoning }
    }

    /// Analyze one product name. Never fails: an unreachable ad archive
    /// counts as zero ads and a failed reasoning call falls back to the
    /// ad-count rule.
    pub async fn analyze_product(&self, name: &str) -> ProductAnalysis {
        let name = name.trim();
        let ads = match self.archive.search(name).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(product = %name, error = %e, "ad archive lookup failed");
                AdSummary {
                    query: name.to_string(),
                    total_ads: 0,
                    advertisers: Vec::new(),
                    image_url: None,
                }
            }
        };

        let mut analysis = rule_based(name, &ads);
        if let Some(client) = &self.reasoning {
            let prompt = build_prompt(name, &ads);
            match client.complete_json(SYSTEM_PROMPT, &prompt).await {
                Ok(reply) => apply_reply(&mut analysis, &reply),
                Err(e) => {
                    tracing::warn!(product = %name, error = %e, "reasoning analysis failed, using ad-count rule");
                }
            }
        }
        analysis
    }
}

/// `< 50` ads is low competition, `< 150` medium, otherwise high.
#[must_use]
pub fn rule_based(name: &str, ads: &AdSummary) -> ProductAnalysis {
    let level = Saturation::from_ad_count(ads.total_ads);
    let (recommendation, opportunity) = match level {
        Saturation::Low => (Recommendation::Launch, 75),
        Saturation::Medium => (Recommendation::Caution, 50),
        Saturation::High => (Recommendation::Avoid, 25),
    };
    ProductAnalysis {
        product_name: name.to_string(),
        active_ads: ads.total_ads,
        top_advertisers: ads.advertisers.iter().take(5).cloned().collect(),
        image_url: ads.image_url.clone(),
        competition_level: level,
        saturation_score: u8::try_from(ads.total_ads.min(200) / 2).unwrap_or(100),
        recommendation,
        supplier_estimate: None,
        recommended_price: None,
        target_audience: None,
        ad_angles: Vec::new(),
        risks: Vec::new(),
        opportunity_score: opportunity,
        ai_analyzed: false,
        analyzed_at: Utc::now(),
    }
}

fn build_prompt(name: &str, ads: &AdSummary) -> String {
    format!(
        "Analyze \"{name}\" as a dropshipping product.\n\
         Observed: {} active ads in the ad library; advertisers include: {}.\n\n\
         Reply with: competition_level (low|medium|high), saturation_score (0-100, 100 = saturated), \
         recommendation (launch|caution|avoid), supplier_estimate (USD), recommended_price (USD), \
         target_audience, ad_angles (3 short hooks), risks (list), opportunity_score (0-100).",
        ads.total_ads,
        if ads.advertisers.is_empty() {
            "none seen".to_string()
        } else {
            ads.advertisers.join(", ")
        }
    )
}

/// Overlay reasoning fields onto the rule-based analysis. Fields the reply
/// lacks or garbles keep their rule-based values.
fn apply_reply(analysis: &mut ProductAnalysis, reply: &Value) {
    let Some(obj) = reply.as_object() else {
        return;
    };
    if let Some(level) = obj.get("competition_level").and_then(Value::as_str) {
        analysis.competition_level = Saturation::parse_lenient(level);
    }
    if let Some(v) = obj.get("saturation_score").and_then(number_from_value) {
        analysis.saturation_score = clamp_score(Some(v));
    }
    if let Some(r) = obj
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(Recommendation::parse)
    {
        analysis.recommendation = r;
    }
    analysis.supplier_estimate = obj
        .get("supplier_estimate")
        .and_then(number_from_value)
        .filter(|v| *v > 0.0)
        .map(round2);
    analysis.recommended_price = obj
        .get("recommended_price")
        .and_then(number_from_value)
        .filter(|v| *v > 0.0)
        .map(round2);
    analysis.target_audience = obj
        .get("target_audience")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    analysis.ad_angles = string_list(obj.get("ad_angles"));
    analysis.risks = string_list(obj.get("risks"));
    if let Some(v) = obj.get("opportunity_score").and_then(number_from_value) {
        analysis.opportunity_score = clamp_score(Some(v));
    }
    analysis.ai_analyzed = true;
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
