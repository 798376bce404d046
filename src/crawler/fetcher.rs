//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with the fixed browser-like header set
//! - Classifying each response
//! - Driving the retry state machine, with backoff waits delegated to a
//!   [`Sleeper`]

use crate::config::HttpConfig;
use crate::crawler::delay::Sleeper;
use crate::crawler::retry::{AttemptFailure, RetryPolicy, RetryState};
use crate::{ConfigError, HarvestError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// A page returned with HTTP 200
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Page body content
    pub body: String,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success(FetchedPage),

    /// Every attempt failed
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The failure observed on the final attempt
        last_failure: AttemptFailure,
    },
}

impl FetchResult {
    /// Returns the fetched page, or `None` if the retry budget ran out
    pub fn into_page(self) -> Option<FetchedPage> {
        match self {
            FetchResult::Success(page) => Some(page),
            FetchResult::Exhausted { .. } => None,
        }
    }
}

/// Builds an HTTP client with the configured header set and timeout
///
/// # Example
///
/// ```no_run
/// use sku_harvester::config::HttpConfig;
/// use sku_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, header_value("accept", &config.accept)?);
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value("accept-language", &config.accept_language)?,
    );

    let client = Client::builder()
        .user_agent(header_value("user-agent", &config.user_agent)?)
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|e| ConfigError::Validation(format!("Invalid {} header '{}': {}", name, value, e)))
}

/// Issues GET requests with bounded retry
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Fetcher {
    /// Creates a fetcher from HTTP configuration
    pub fn new(config: &HttpConfig, sleeper: Arc<dyn Sleeper>) -> Result<Self, HarvestError> {
        let client = build_http_client(config)?;
        let policy = RetryPolicy::new(config.max_retries, config.retry_delay());
        Ok(Self::with_client(client, policy, sleeper))
    }

    pub fn with_client(client: Client, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL, retrying rate limits and transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Return immediately |
    /// | HTTP 429 | Wait `base * 2^attempt + U(0,1)s`, retry |
    /// | Other status | Wait `base`, retry |
    /// | Timeout / connection / body error | Wait `base`, retry |
    ///
    /// Running out of attempts yields [`FetchResult::Exhausted`]; this never
    /// returns an error.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        tracing::info!("Fetching {}", url);

        let max_attempts = self.policy.max_attempts;
        let mut state = RetryState::start();

        loop {
            state = match state {
                RetryState::Attempting(attempt) => match self.attempt(url).await {
                    Ok(page) => RetryState::Succeeded(page),
                    Err(failure) => {
                        RetryState::failed(attempt, failure, &self.policy, fastrand::f64())
                    }
                },

                backoff @ RetryState::Backoff { .. } => {
                    if let RetryState::Backoff {
                        attempt,
                        wait,
                        reason,
                    } = &backoff
                    {
                        log_retry(url, *attempt, max_attempts, *wait, reason);
                        self.sleeper.sleep(*wait).await;
                    }
                    backoff.resume(&self.policy)
                }

                RetryState::Succeeded(page) => return FetchResult::Success(page),

                RetryState::Exhausted {
                    attempts,
                    last_failure,
                } => {
                    tracing::error!(
                        "Failed to fetch {} after {} attempts ({})",
                        url,
                        attempts,
                        last_failure
                    );
                    return FetchResult::Exhausted {
                        attempts,
                        last_failure,
                    };
                }
            };
        }
    }

    /// Issues a single GET and classifies the response
    async fn attempt(&self, url: &str) -> Result<FetchedPage, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptFailure::Network(describe_error(&e)))?;

        // Classify the response
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptFailure::RateLimited);
        }
        if status != StatusCode::OK {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Network(describe_error(&e)))?;

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body,
        })
    }
}

/// Logs a retryable failure before its backoff wait
fn log_retry(url: &str, attempt: u32, max_attempts: u32, wait: Duration, reason: &AttemptFailure) {
    match reason {
        AttemptFailure::RateLimited => tracing::warn!(
            "Rate limited on {}. Waiting {:.2} seconds before retry {}/{}",
            url,
            wait.as_secs_f64(),
            attempt + 1,
            max_attempts
        ),
        AttemptFailure::Status(code) => tracing::warn!(
            "Failed to fetch {}. Status code: {}. Retry {}/{}",
            url,
            code,
            attempt + 1,
            max_attempts
        ),
        AttemptFailure::Network(error) => tracing::warn!(
            "Request error for {}: {}. Retry {}/{}",
            url,
            error,
            attempt + 1,
            max_attempts
        ),
    }
}

/// Classifies a reqwest error for logging
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}
