//! HTTP fetcher with retry support.

use crate::types::{Fetched, GrabError, HttpConfig, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// Something that can GET a URL.
///
/// The pipeline is generic over this so tests can serve pages from memory.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Fetched>> + Send;
}

/// Fetcher for pages, scripts, maps and sources with rate limiting.
pub struct Fetcher {
    client: Client,
    config: HttpConfig,
    rate_limiter: DefaultDirectRateLimiter,
}

impl Fetcher {
    /// Create a new fetcher.
    pub fn new(config: HttpConfig, rate_limit: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let per_second = NonZeroU32::new(rate_limit)
            .ok_or_else(|| GrabError::Config("rate limit must be at least 1".to_string()))?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Perform a single HTTP GET.
    async fn do_fetch(&self, url: &Url) -> Result<Fetched> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrabError::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: status.to_string(),
            });
        }

        let final_url = response.url().clone();
        let source_map_header = ["sourcemap", "x-sourcemap"].iter().find_map(|name| {
            response
                .headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        });

        let body = response.text().await.map_err(|e| network_error(url, e))?;

        Ok(Fetched {
            body,
            final_url,
            source_map_header,
        })
    }
}

impl Fetch for Fetcher {
    /// Fetch a URL, retrying transport and server errors.
    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        let fetched = with_retries(url, self.config.max_retries, || async move {
            self.rate_limiter.until_ready().await;
            self.do_fetch(url).await
        })
        .await?;

        debug!("Fetched {} ({} bytes)", url, fetched.body.len());
        Ok(fetched)
    }
}

/// Run `attempt` until it succeeds, retrying retryable errors up to
/// `max_retries` times with linear backoff.
async fn with_retries<T, Fut>(
    url: &Url,
    max_retries: u32,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() || retries >= max_retries {
                    if retries > 0 {
                        warn!("Giving up on {} after {} retries: {}", url, retries, e);
                    }
                    return Err(e);
                }
                retries += 1;
                trace!("Retry {} for {}: {}", retries, url, e);
                tokio::time::sleep(Duration::from_millis(500 * retries as u64)).await;
            }
        }
    }
}

fn network_error(url: &Url, err: reqwest::Error) -> GrabError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    GrabError::Network {
        url: url.to_string(),
        status: err.status().map(|s| s.as_u16()),
        reason,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher used by pipeline tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, (String, Option<String>)>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (body.to_string(), None));
            self
        }

        pub fn with_header(mut self, url: &str, body: &str, source_map: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                (body.to_string(), Some(source_map.to_string())),
            );
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetch for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<Fetched> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url.as_str()) {
                Some((body, header)) => Ok(Fetched {
                    body: body.clone(),
                    final_url: url.clone(),
                    source_map_header: header.clone(),
                }),
                None => Err(GrabError::Network {
                    url: url.to_string(),
                    status: Some(404),
                    reason: "404 Not Found".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fetcher_creation() {
        let fetcher = Fetcher::new(HttpConfig::default(), 10);
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let fetcher = Fetcher::new(HttpConfig::default(), 0);
        assert!(matches!(fetcher, Err(GrabError::Config(_))));
    }

    fn status_error(code: u16) -> GrabError {
        GrabError::Network {
            url: "https://example.com/app.js".to_string(),
            status: Some(code),
            reason: format!("HTTP {}", code),
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/app.js").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_up_to_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(&url(), 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status_error(503)) }
        })
        .await;

        assert!(matches!(result, Err(GrabError::Network { status: Some(503), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(&url(), 5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status_error(404)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&url(), 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(status_error(502))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with("https://example.com/a.js", "var a;");
        let url = Url::parse("https://example.com/a.js").unwrap();
        let fetched = fetcher.fetch(&url).await.unwrap();
        assert_eq!(fetched.body, "var a;");
        assert_eq!(fetched.final_url, url);

        let missing = Url::parse("https://example.com/b.js").unwrap();
        let err = fetcher.fetch(&missing).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(fetcher.requests().len(), 2);
    }
}
