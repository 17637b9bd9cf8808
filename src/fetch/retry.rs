//! Patient retrying fetch of the upstream dataset
//!
//! The dataset refreshes on the order of minutes, so the policy is slow on
//! purpose: up to 20 attempts, 30 seconds apart. Network failures, 5xx
//! statuses and `202 Accepted` ("not ready yet") are retried. Every other
//! status ends the loop at once. Each [`RetryingFetcher::fetch`] call starts
//! from a fresh budget; nothing is shared between calls.

use crate::core::config::RetryConfig;
use crate::fetch::client::{HttpClient, HttpResponse, TransportError};
use crate::FetchError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one attempt as seen by the retry predicate
pub type AttemptOutcome = Result<HttpResponse, TransportError>;

/// Decides whether an attempt outcome is worth another try
pub type RetryPredicate = Arc<dyn Fn(&AttemptOutcome) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub should_retry: RetryPredicate,
}

impl RetryPolicy {
    /// Fixed-delay policy retrying network errors, 5xx and 202
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            should_retry: Arc::new(Self::http_or_network_error_or_accepted),
        }
    }

    /// Replaces the retry predicate
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptOutcome) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Retries when no response arrived or the server failed
    pub fn http_or_network_error(outcome: &AttemptOutcome) -> bool {
        match outcome {
            Err(_) => true,
            Ok(response) => response.is_server_error(),
        }
    }

    /// [`RetryPolicy::http_or_network_error`], plus `202 Accepted`
    pub fn http_or_network_error_or_accepted(outcome: &AttemptOutcome) -> bool {
        Self::http_or_network_error(outcome)
            || matches!(outcome, Ok(response) if response.status == 202)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Performs HTTP GETs under a [`RetryPolicy`]
#[derive(Clone)]
pub struct RetryingFetcher {
    client: Arc<dyn HttpClient>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(client: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Fetches `url`, returning the body of the first successful response.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.client.get(url).await;

            if !(self.policy.should_retry)(&outcome) {
                return match outcome {
                    Ok(response) if response.is_success() => {
                        if attempt > 1 {
                            log::info!("fetched {} on attempt {}", url, attempt);
                        }
                        Ok(response.body)
                    }
                    Ok(response) => Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status,
                    }),
                    Err(e) => Err(FetchError::Transport {
                        url: url.to_string(),
                        message: e.to_string(),
                    }),
                };
            }

            let last = describe(&outcome);
            if attempt >= self.policy.max_attempts {
                log::error!(
                    "giving up on {} after {} attempts: {}",
                    url,
                    attempt,
                    last
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last,
                });
            }

            log::warn!(
                "fetch of {} failed on attempt {}/{}: {}; retrying in {:?}",
                url,
                attempt,
                self.policy.max_attempts,
                last,
                self.policy.delay
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

fn describe(outcome: &AttemptOutcome) -> String {
    match outcome {
        Ok(response) => format!("HTTP {}", response.status),
        Err(e) => e.to_string(),
    }
}
