//! URL origin, host and store-identity helpers.

use sha2::{Digest, Sha256};

/// Extracts the scheme+host origin from a URL.
///
/// Given `"https://shop.example.com/collections/all"`, returns
/// `"https://shop.example.com"`. Bare hosts without a scheme are treated as
/// `https`.
#[must_use]
pub fn extract_origin(url: &str) -> String {
    let with_scheme = ensure_scheme(url);
    reqwest::Url::parse(&with_scheme).map_or_else(
        |e| {
            tracing::debug!(url, error = %e, "could not parse URL, splitting on '/' for origin");
            with_scheme
                .trim_end_matches('/')
                .splitn(4, '/')
                .take(3)
                .collect::<Vec<_>>()
                .join("/")
        },
        |u| u.origin().ascii_serialization(),
    )
}

/// Extracts the hostname from a URL, falling back to the input on parse failure.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(&ensure_scheme(url))
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Stable short identifier and display name for a storefront URL.
///
/// The id is the first 8 hex characters of the SHA-256 of the trimmed URL.
/// The name is the first non-`www` host label, title-cased.
#[must_use]
pub fn store_identity(store_url: &str) -> (String, String) {
    let trimmed = store_url.trim().trim_end_matches('/');
    let digest = format!("{:x}", Sha256::digest(trimmed.as_bytes()));
    let store_id = digest[..8].to_string();

    let host = extract_domain(trimmed);
    let label = host
        .split('.')
        .find(|l| !l.is_empty() && *l != "www")
        .unwrap_or(host.as_str());
    (store_id, title_case(&label.replace('-', " ")))
}

fn ensure_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{}", trimmed.trim_start_matches("//"))
    }
}

pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
