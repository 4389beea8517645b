//! Markup, number and embedded-JSON parsing helpers shared by collectors.
//!
//! `scraper::Html` is not `Send`, so every helper that parses a document does
//! so synchronously and returns owned data.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)").expect("valid regex")
});
static COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*([kmb])?\b").expect("valid regex")
});
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-]?\d[\d,]*(?:\.\d+)?)\s*%").expect("valid regex"));

/// Parse a selector, returning `None` for invalid input.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first descendant matching any selector in `selectors`.
pub(crate) fn first_text(el: &ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        el.select(&sel)
            .map(|found| element_text(&found))
            .find(|t| !t.is_empty())
    })
}

/// First non-empty attribute among `attrs` on the first descendant matching
/// any selector in `selectors`.
pub(crate) fn first_attr(el: &ElementRef<'_>, selectors: &[&str], attrs: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        el.select(&sel).find_map(|found| {
            attrs
                .iter()
                .find_map(|a| found.value().attr(a))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        })
    })
}

/// Parse the first price-like number in `text`, e.g. `"US $1,299.99"`.
///
/// Returns `None` for non-positive values.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = NUMBER_RE.captures(text)?;
    let value = caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Parse a compact count such as `"1.2M"`, `"45K views"` or `"10,000+ sold"`.
#[must_use]
pub fn parse_compact_count(text: &str) -> Option<u64> {
    let caps = COMPACT_RE.captures(text)?;
    let base = caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1_000.0,
        Some(ref s) if s == "m" => 1_000_000.0,
        Some(ref s) if s == "b" => 1_000_000_000.0,
        _ => 1.0,
    };
    round_to_u64(base * multiplier)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn round_to_u64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

/// Parse a signed percentage such as `"+425%"` or `"-12.5 %"`.
#[must_use]
pub fn parse_percent(text: &str) -> Option<f64> {
    let caps = PERCENT_RE.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()
}

/// Normalize a media URL: protocol-relative becomes `https:`, anything that
/// is not absolute http(s) is rejected.
#[must_use]
pub fn normalize_image_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        return Some(trimmed.to_owned());
    }
    None
}

/// Resolve `href` against `base`, returning an absolute URL.
#[must_use]
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let base = reqwest::Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Content of `<meta name=...>` or `<meta property=...>`.
#[must_use]
pub fn meta_content(html: &str, name: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let css = format!("meta[name=\"{name}\"], meta[property=\"{name}\"]");
    let sel = selector(&css)?;
    doc.select(&sel)
        .find_map(|m| m.value().attr("content"))
        .map(clean_text)
        .filter(|s| !s.is_empty())
}

/// Inner text of `<script id="{id}">`, e.g. `__NEXT_DATA__`.
#[must_use]
pub fn script_by_id(html: &str, id: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = selector(&format!("script#{id}"))?;
    doc.select(&sel)
        .next()
        .map(|s| s.text().collect::<String>())
        .filter(|s| !s.trim().is_empty())
}

/// Extract the JSON object assigned after `marker` inside inline script text,
/// e.g. `window.runParams = {...};`.
///
/// Scans for the first `{` after the marker and matches braces while
/// respecting string literals.
#[must_use]
pub fn assigned_json(text: &str, marker: &str) -> Option<Value> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let open = rest.find('{')?;
    let body = &rest[open..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in body.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return serde_json::from_str(&body[..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-first walk collecting every JSON object for which `keep` is true.
pub fn collect_objects<'a, F>(value: &'a Value, keep: &F, out: &mut Vec<&'a serde_json::Map<String, Value>>)
where
    F: Fn(&serde_json::Map<String, Value>) -> bool,
{
    match value {
        Value::Object(map) => {
            if keep(map) {
                out.push(map);
            }
            for child in map.values() {
                collect_objects(child, keep, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_objects(child, keep, out);
            }
        }
        _ => {}
    }
}

/// Read a JSON value as a number, accepting numeric strings like `"$12.50"`.
#[must_use]
pub fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s).or_else(|| s.trim().parse::<f64>().ok()),
        _ => None,
    }
}

/// Read a JSON value as a count, accepting compact strings like `"1.2K"`.
#[must_use]
pub fn json_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(round_to_u64)),
        Value::String(s) => parse_compact_count(s),
        _ => None,
    }
}

/// First string value under any of `keys`.
#[must_use]
pub fn json_str<'a>(map: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
