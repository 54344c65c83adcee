// src/provider/client.rs

//! Bulletin provider HTTP client.
//!
//! One HTTP call per attempt, bounded retries with exponential backoff for
//! transport failures. Client-side protocol errors (4xx) abort
//! immediately. All outcomes are all-or-nothing per call; no partial
//! results are returned.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ProviderConfig;
use crate::provider::feed::FeedDocument;
use crate::utils::{BackoffPolicy, http};

/// Source of bulletin documents.
///
/// The orchestrator depends on this seam rather than on the HTTP client
/// directly, mirroring the storage trait split.
#[async_trait]
pub trait BulletinSource: Send + Sync {
    /// Fetch the latest bulletin for a language; `None` = nothing
    /// published.
    async fn fetch(&self, language: &str) -> Result<Option<FeedDocument>>;

    /// Fetch the bulletin valid at a point in time.
    async fn fetch_for_date(
        &self,
        at: DateTime<Utc>,
        language: &str,
    ) -> Result<Option<FeedDocument>>;
}

/// Client for the external bulletin provider.
pub struct BulletinClient {
    client: Client,
    endpoint: Url,
    backoff: BackoffPolicy,
    history_timeout: Duration,
}

impl BulletinClient {
    /// Create a client from provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = http::create_client(&config.user_agent, config.timeout_secs)?;
        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            client,
            endpoint,
            backoff: config.retry.policy(),
            history_timeout: Duration::from_secs(config.history_timeout_secs),
        })
    }

    fn bulletin_url(&self, language: &str, at: Option<DateTime<Utc>>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("lang", language);
            if let Some(at) = at {
                query.append_pair("date", &at.to_rfc3339());
            }
        }
        Ok(url)
    }

    async fn fetch_with_retry(
        &self,
        url: Url,
        timeout: Option<Duration>,
    ) -> Result<Option<FeedDocument>> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = Instant::now();

            match self.fetch_once(&url, timeout).await {
                Ok(document) => {
                    log::info!(
                        "Bulletin fetch succeeded: url={} attempt={} latency_ms={} data={}",
                        url,
                        attempt,
                        started.elapsed().as_millis(),
                        document.is_some(),
                    );
                    return Ok(document);
                }
                Err(FetchFailure::Fatal(error)) => {
                    log::error!(
                        "Bulletin fetch aborted: url={} attempt={} latency_ms={} error={}",
                        url,
                        attempt,
                        started.elapsed().as_millis(),
                        error,
                    );
                    return Err(error);
                }
                Err(FetchFailure::Transient(error)) => {
                    log::warn!(
                        "Bulletin fetch attempt failed: url={} attempt={} latency_ms={} error={}",
                        url,
                        attempt,
                        started.elapsed().as_millis(),
                        error,
                    );

                    match self.backoff.delay_after(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            log::error!(
                                "Bulletin fetch gave up after {} attempts: url={}",
                                attempt,
                                url
                            );
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &Url,
        timeout: Option<Duration>,
    ) -> std::result::Result<Option<FeedDocument>, FetchFailure> {
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchFailure::Transient(e.into()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(FetchFailure::Fatal(AppError::provider(format!(
                "provider rejected request with status {status}"
            ))));
        }
        if !status.is_success() {
            return Err(FetchFailure::Transient(AppError::provider(format!(
                "provider returned status {status}"
            ))));
        }

        // Truncated or non-JSON bodies behave like transport faults.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchFailure::Transient(e.into()))?;

        FeedDocument::parse(body).map_err(FetchFailure::Fatal)
    }
}

#[async_trait]
impl BulletinSource for BulletinClient {
    /// Fetch the latest bulletin for a language.
    ///
    /// Returns `Ok(None)` when the provider has no bulletin published.
    async fn fetch(&self, language: &str) -> Result<Option<FeedDocument>> {
        let url = self.bulletin_url(language, None)?;
        self.fetch_with_retry(url, None).await
    }

    /// Fetch the bulletin that was valid at a point in time.
    ///
    /// History lookups are slower on the provider side, so the request
    /// uses the longer history timeout.
    async fn fetch_for_date(
        &self,
        at: DateTime<Utc>,
        language: &str,
    ) -> Result<Option<FeedDocument>> {
        let url = self.bulletin_url(language, Some(at))?;
        self.fetch_with_retry(url, Some(self.history_timeout)).await
    }
}

/// Whether a failed attempt is worth retrying.
enum FetchFailure {
    Transient(AppError),
    Fatal(AppError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_client() -> BulletinClient {
        BulletinClient::new(&ProviderConfig::default()).unwrap()
    }

    #[test]
    fn bulletin_url_appends_language() {
        let client = make_client();
        let url = client.bulletin_url("fr", None).unwrap();
        assert_eq!(url.query(), Some("lang=fr"));
    }

    #[test]
    fn bulletin_url_appends_date_for_history() {
        let client = make_client();
        let at = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let url = client.bulletin_url("de", Some(at)).unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("lang=de"));
        assert!(query.contains("date=2026-01-10T08"));
    }
}
