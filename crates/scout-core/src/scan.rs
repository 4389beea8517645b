use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filters::ScanFilters;
use crate::products::{CandidateProduct, SourceTag};
use crate::tiers::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Full,
    Source,
    Scheduled,
}

/// Outcome of one orchestrated scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Always `true` unless the scan could not run at all. Total source
    /// failure is reported through `no_data`, not as a failure.
    pub success: bool,
    pub products: Vec<CandidateProduct>,
    /// Raw candidates yielded per source, including zero for failed sources.
    pub source_stats: BTreeMap<SourceTag, usize>,
    pub raw_count: usize,
    pub product_count: usize,
    /// `true` when the reasoning service scored this batch.
    pub enriched: bool,
    /// `true` when no collector produced any candidate.
    pub no_data: bool,
    pub message: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    /// Build the append-only audit row for this scan.
    #[must_use]
    pub fn to_record(&self, account_id: Option<&str>, scan_type: ScanType) -> ScanRecord {
        ScanRecord {
            id: Uuid::new_v4(),
            account_id: account_id.map(str::to_string),
            scan_date: self.scanned_at.date_naive(),
            scan_type,
            source_stats: self.source_stats.clone(),
            raw_count: self.raw_count,
            product_count: self.product_count,
            enriched: self.enriched,
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit row for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub account_id: Option<String>,
    pub scan_date: NaiveDate,
    pub scan_type: ScanType,
    pub source_stats: BTreeMap<SourceTag, usize>,
    pub raw_count: usize,
    pub product_count: usize,
    pub enriched: bool,
    pub created_at: DateTime<Utc>,
}

/// Account fields the scheduler needs. Identity and billing live elsewhere.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub last_scan_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filters: ScanFilters,
    /// Per-account reasoning-service key; overrides the global key.
    #[serde(default)]
    pub reasoning_api_key: Option<String>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("last_scan_at", &self.last_scan_at)
            .field("filters", &self.filters)
            .field(
                "reasoning_api_key",
                &self.reasoning_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_record_copies_counts_and_date() {
        let scanned_at = DateTime::parse_from_rfc3339("2026-05-02T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut source_stats = BTreeMap::new();
        source_stats.insert(SourceTag::Amazon, 7);
        source_stats.insert(SourceTag::Tiktok, 0);
        let result = ScanResult {
            success: true,
            products: Vec::new(),
            source_stats,
            raw_count: 7,
            product_count: 5,
            enriched: false,
            no_data: false,
            message: None,
            scanned_at,
        };

        let record = result.to_record(Some("acct-1"), ScanType::Scheduled);
        assert_eq!(record.account_id.as_deref(), Some("acct-1"));
        assert_eq!(record.scan_date.to_string(), "2026-05-02");
        assert_eq!(record.raw_count, 7);
        assert_eq!(record.product_count, 5);
        assert_eq!(record.source_stats.get(&SourceTag::Tiktok), Some(&0));
    }

    #[test]
    fn account_deserializes_with_defaults() {
        let account: Account =
            serde_json::from_value(serde_json::json!({ "id": "a1", "tier": "elite" })).unwrap();
        assert_eq!(account.tier, Tier::Elite);
        assert!(account.last_scan_at.is_none());
        assert!(account.filters.is_empty());
    }

    #[test]
    fn account_debug_redacts_key() {
        let account = Account {
            id: "a1".to_string(),
            tier: Tier::Free,
            last_scan_at: None,
            filters: ScanFilters::default(),
            reasoning_api_key: Some("sk-secret".to_string()),
        };
        assert!(!format!("{account:?}").contains("sk-secret"));
    }
}
