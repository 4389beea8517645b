//! Rotating client-identity header sets for markup scraping.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// One realistic browser fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
    pub platform: &'static str,
}

const IDENTITIES: [Identity; 5] = [
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        platform: "\"Windows\"",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
        accept_language: "en-US,en;q=0.8",
        platform: "\"macOS\"",
    },
    Identity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        accept_language: "en-GB,en;q=0.9,en-US;q=0.8",
        platform: "\"Linux\"",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        accept_language: "en-US,en;q=0.5",
        platform: "\"Windows\"",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        accept_language: "en-US,en;q=0.9",
        platform: "\"macOS\"",
    },
];

/// Hands out identities round-robin from a random starting offset, so
/// consecutive requests never share a fingerprint.
#[derive(Debug)]
pub struct IdentityPool {
    cursor: AtomicUsize,
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(rand::rng().random_range(0..IDENTITIES.len())),
        }
    }

    #[must_use]
    pub fn next_identity(&self) -> Identity {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % IDENTITIES.len();
        IDENTITIES[idx]
    }

    /// Browser-like headers for the next identity in rotation.
    #[must_use]
    pub fn next_headers(&self) -> HeaderMap {
        let identity = self.next_identity();
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(identity.accept_language),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            "sec-ch-ua-platform",
            HeaderValue::from_static(identity.platform),
        );
        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_identities_differ() {
        let pool = IdentityPool::new();
        let a = pool.next_identity();
        let b = pool.next_identity();
        assert_ne!(a.user_agent, b.user_agent);
    }

    #[test]
    fn rotation_wraps_around_the_pool() {
        let pool = IdentityPool::new();
        let first = pool.next_identity();
        for _ in 1..IDENTITIES.len() {
            let _ = pool.next_identity();
        }
        assert_eq!(pool.next_identity().user_agent, first.user_agent);
    }

    #[test]
    fn headers_include_user_agent_and_language() {
        let pool = IdentityPool::new();
        let headers = pool.next_headers();
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
        assert!(headers.contains_key("sec-ch-ua-platform"));
    }
}
