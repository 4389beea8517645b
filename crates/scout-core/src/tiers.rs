use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Subscription tier driving scan cadence and monitoring limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Sniper,
    Elite,
    Agency,
    Enterprise,
}

impl Tier {
    /// Case-insensitive parse. Unknown tiers are treated as `Free`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "sniper" => Tier::Sniper,
            "elite" => Tier::Elite,
            "agency" => Tier::Agency,
            "enterprise" => Tier::Enterprise,
            _ => Tier::Free,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Sniper => "sniper",
            Tier::Elite => "elite",
            Tier::Agency => "agency",
            Tier::Enterprise => "enterprise",
        }
    }

    /// Hours between scheduled scans.
    #[must_use]
    pub fn scan_frequency_hours(self) -> i64 {
        match self {
            Tier::Free => 24,
            Tier::Sniper => 12,
            Tier::Elite => 6,
            Tier::Agency => 4,
            Tier::Enterprise => 2,
        }
    }

    /// Maximum monitored competitor stores; `None` means unlimited.
    #[must_use]
    pub fn competitor_limit(self) -> Option<usize> {
        match self {
            Tier::Free => Some(0),
            Tier::Sniper => Some(2),
            Tier::Elite => Some(10),
            Tier::Agency | Tier::Enterprise => None,
        }
    }

    /// Maximum candidates persisted per day; `None` means unlimited.
    #[must_use]
    pub fn daily_product_limit(self) -> Option<usize> {
        match self {
            Tier::Free => Some(3),
            Tier::Sniper => Some(10),
            Tier::Elite | Tier::Agency | Tier::Enterprise => None,
        }
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Tier::parse_lenient(&raw))
    }
}

/// Returns `true` when an account on `tier` is due for a scan at `now`.
///
/// An account that has never been scanned is always due. Otherwise it is due
/// once at least `scan_frequency_hours` have elapsed since `last_scan_at`.
#[must_use]
pub fn should_scan(last_scan_at: Option<DateTime<Utc>>, tier: Tier, now: DateTime<Utc>) -> bool {
    match last_scan_at {
        None => true,
        Some(last) => now - last >= Duration::hours(tier.scan_frequency_hours()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-14T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn never_scanned_is_due() {
        assert!(should_scan(None, Tier::Free, now()));
    }

    #[test]
    fn due_one_minute_past_threshold_for_every_tier() {
        for tier in [Tier::Free, Tier::Sniper, Tier::Elite, Tier::Agency, Tier::Enterprise] {
            let last = now() - Duration::hours(tier.scan_frequency_hours()) - Duration::minutes(1);
            assert!(should_scan(Some(last), tier, now()), "{tier:?} should be due");
        }
    }

    #[test]
    fn not_due_one_minute_short_of_threshold() {
        for tier in [Tier::Free, Tier::Sniper, Tier::Elite, Tier::Agency, Tier::Enterprise] {
            let last = now() - Duration::hours(tier.scan_frequency_hours()) + Duration::minutes(1);
            assert!(!should_scan(Some(last), tier, now()), "{tier:?} should not be due");
        }
    }

    #[test]
    fn due_exactly_at_threshold() {
        let last = now() - Duration::hours(12);
        assert!(should_scan(Some(last), Tier::Sniper, now()));
    }

    #[test]
    fn unknown_tier_parses_as_free() {
        assert_eq!(Tier::parse_lenient("platinum"), Tier::Free);
        assert_eq!(Tier::parse_lenient(" Elite "), Tier::Elite);
    }

    #[test]
    fn unknown_tier_deserializes_as_free() {
        let tier: Tier = serde_json::from_str("\"gold\"").unwrap();
        assert_eq!(tier, Tier::Free);
    }

    #[test]
    fn limits_follow_tier_table() {
        assert_eq!(Tier::Free.competitor_limit(), Some(0));
        assert_eq!(Tier::Sniper.competitor_limit(), Some(2));
        assert_eq!(Tier::Agency.competitor_limit(), None);
        assert_eq!(Tier::Free.daily_product_limit(), Some(3));
        assert_eq!(Tier::Enterprise.daily_product_limit(), None);
    }
}
