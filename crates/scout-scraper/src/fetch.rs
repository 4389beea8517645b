//! Shared HTTP fetcher used by every collector strategy.

use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, REFERER};
use reqwest::{Client, StatusCode};

use crate::error::ScraperError;
use crate::identity::IdentityPool;
use crate::origin::{extract_domain, extract_origin};
use crate::rate_limit::{retry_with_backoff, HostThrottle};

/// Timeouts, throttling and retry policy for an [`HttpFetcher`].
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub inter_request_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            inter_request_delay_ms: 750,
            max_retries: 2,
            backoff_base_secs: 1,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn from_app_config(config: &scout_core::AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            inter_request_delay_ms: config.http_inter_request_delay_ms,
            max_retries: config.http_max_retries,
            backoff_base_secs: config.http_backoff_base_secs,
        }
    }

    /// No throttling and no retries. Used by tests against local mock servers.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            timeout_secs: 5,
            inter_request_delay_ms: 0,
            max_retries: 0,
            backoff_base_secs: 0,
        }
    }
}

/// HTTP client with rotating browser identities, same-host throttling and
/// retry on transient failures.
///
/// Non-2xx responses are mapped to typed [`ScraperError`] variants so that
/// strategies can fall through on them.
pub struct HttpFetcher {
    client: Client,
    identities: IdentityPool,
    throttle: HostThrottle,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &FetchConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            identities: IdentityPool::new(),
            throttle: HostThrottle::new(Duration::from_millis(config.inter_request_delay_ms)),
            max_retries: config.max_retries,
            backoff_base_secs: config.backoff_base_secs,
        })
    }

    /// Fetches `url` as a browser would and returns the body text.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] on 429 after retries.
    /// - [`ScraperError::Blocked`] on 401/403.
    /// - [`ScraperError::NotFound`] on 404.
    /// - [`ScraperError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`ScraperError::Http`] on network failure after retries.
    pub async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        self.send(url, None).await
    }

    /// Fetches `url` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`HttpFetcher::get_text`], plus [`ScraperError::Deserialize`]
    /// when the body is not valid JSON.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value, ScraperError> {
        let body = self
            .send(url, Some("application/json,text/plain;q=0.9,*/*;q=0.8"))
            .await?;
        serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
            context: url.to_owned(),
            source: e,
        })
    }

    async fn send(&self, url: &str, accept: Option<&'static str>) -> Result<String, ScraperError> {
        let domain = extract_domain(url);
        let referer = format!("{}/", extract_origin(url));

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let domain = domain.clone();
            let referer = referer.clone();
            async move {
                self.throttle.wait(&domain).await;

                let mut headers = self.identities.next_headers();
                if let Some(accept) = accept {
                    headers.insert(ACCEPT, HeaderValue::from_static(accept));
                }
                if let Ok(value) = HeaderValue::from_str(&referer) {
                    headers.insert(REFERER, value);
                }

                let response = self.client.get(url).headers(headers).send().await?;
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(0);
                    return Err(ScraperError::RateLimited {
                        domain,
                        retry_after_secs,
                    });
                }
                if status == StatusCode::NOT_FOUND {
                    return Err(ScraperError::NotFound {
                        url: url.to_owned(),
                    });
                }
                if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
                    return Err(ScraperError::Blocked {
                        domain,
                        status: status.as_u16(),
                    });
                }
                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_owned(),
                    });
                }

                Ok(response.text().await?)
            }
        })
        .await
    }
}
