use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product read from a public storefront catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    /// Lowest variant price, when the catalog lists one.
    pub price: Option<f64>,
    pub handle: Option<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
}

/// Last-known catalog of a monitored competitor store.
///
/// One live snapshot per store per account. A pull overwrites it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontSnapshot {
    pub id: Uuid,
    pub account_id: String,
    /// Short stable identifier derived from the store URL.
    pub store_id: String,
    pub store_url: String,
    pub store_name: String,
    pub platform: String,
    /// Product names from the latest pull, in catalog order.
    pub product_names: Vec<String>,
    /// Last-seen price per product name, used by the price-diff pass.
    #[serde(default)]
    pub product_prices: BTreeMap<String, f64>,
    pub last_scanned: Option<DateTime<Utc>>,
    pub new_products_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Added and removed product names between two pulls of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub added_count: usize,
    pub removed_count: usize,
    pub has_changes: bool,
}

/// A product present in both pulls whose listed price moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub name: String,
    pub old_price: f64,
    pub new_price: f64,
}

impl PriceChange {
    /// Signed change relative to the old price, rounded to one decimal.
    #[must_use]
    pub fn change_percent(&self) -> f64 {
        if self.old_price <= 0.0 {
            return 0.0;
        }
        ((self.new_price - self.old_price) / self.old_price * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewProduct,
    PriceChange,
}

/// Persisted notice that a monitored store changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAlert {
    pub id: Uuid,
    pub account_id: String,
    pub competitor_id: Uuid,
    pub competitor_name: String,
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub product_data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_change_percent() {
        let change = PriceChange {
            name: "Neck Fan".to_string(),
            old_price: 40.0,
            new_price: 30.0,
        };
        assert!((change.change_percent() - -25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn price_change_from_zero_is_zero_percent() {
        let change = PriceChange {
            name: "Freebie".to_string(),
            old_price: 0.0,
            new_price: 5.0,
        };
        assert!(change.change_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn alert_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(AlertType::NewProduct).unwrap(),
            serde_json::json!("new_product")
        );
    }
}
