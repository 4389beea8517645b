//! Per-source collectors. Each module exposes a `collector(...)` constructor
//! returning a [`FallbackChain`](crate::strategy::FallbackChain) with the
//! source's strategies in preference order.

pub mod aliexpress;
pub mod amazon;
pub mod google_trends;
pub mod meta_ads;
pub mod tiktok;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Keywords for per-keyword strategies: the requested category when present,
/// otherwise up to `max` seed keywords.
pub(crate) fn keywords_for(category: Option<&str>, seeds: &[String], max: usize) -> Vec<String> {
    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => vec![c.to_string()],
        None => seeds.iter().take(max).cloned().collect(),
    }
}

pub(crate) fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

/// Strip an anti-XSSI prefix such as `)]}'` ahead of a JSON body.
pub(crate) fn strip_xssi(body: &str) -> &str {
    match body.find(['{', '[']) {
        Some(idx) => &body[idx..],
        None => body,
    }
}
