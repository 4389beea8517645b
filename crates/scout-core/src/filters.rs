use serde::{Deserialize, Serialize};

/// Per-account constraints applied to a scan.
///
/// Numeric constraints are passed to the reasoning service as omission
/// rules. `excluded_terms` is also applied locally before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sell_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_source_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_margin_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_competing_ads: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_terms: Vec<String>,
}

impl ScanFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_sell_price.is_none()
            && self.max_source_cost.is_none()
            && self.min_margin_percent.is_none()
            && self.max_competing_ads.is_none()
            && self.categories.is_empty()
            && self.excluded_terms.is_empty()
    }

    /// Returns `true` if `name` contains any excluded term, case-insensitively.
    #[must_use]
    pub fn excludes(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.excluded_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .any(|t| !t.is_empty() && lowered.contains(&t))
    }

    /// Render the constraints as bullet lines for a reasoning prompt.
    ///
    /// Returns an empty vector when no constraint is set.
    #[must_use]
    pub fn prompt_constraints(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(v) = self.min_sell_price {
            lines.push(format!("Omit products whose recommended_price is below ${v:.2}"));
        }
        if let Some(v) = self.max_source_cost {
            lines.push(format!("Omit products whose source_cost is above ${v:.2}"));
        }
        if let Some(v) = self.min_margin_percent {
            lines.push(format!("Omit products whose margin_percent is below {v:.0}%"));
        }
        if let Some(v) = self.max_competing_ads {
            lines.push(format!("Omit products with more than {v} active competing ads"));
        }
        if !self.categories.is_empty() {
            lines.push(format!(
                "Only keep products in these categories: {}",
                self.categories.join(", ")
            ));
        }
        if !self.excluded_terms.is_empty() {
            lines.push(format!(
                "Omit products whose name contains: {}",
                self.excluded_terms.join(", ")
            ));
        }
        lines
    }
}
