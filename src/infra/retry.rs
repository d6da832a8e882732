use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, TokenProvider};
use crate::constants::{MAX_RETRIES, MAX_RETRY_WAIT, SERVER_CRASH_WAIT};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Fixed-delay retry policy tuned for a server that crashes and restarts in about a minute.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub wait: Duration,
    pub max_wait: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wait: SERVER_CRASH_WAIT,
            max_wait: MAX_RETRY_WAIT,
            max_retries: MAX_RETRIES,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Done,
    RefreshAndRetry,
    Retry,
}

impl RetryPolicy {
    /// Wait before the next attempt; constant, but never beyond `max_wait`.
    pub fn backoff(&self, _attempt: u32) -> Duration {
        self.wait.min(self.max_wait)
    }

    fn classify(&self, outcome: &Result<HttpResponse>) -> Verdict {
        match outcome {
            Err(_) => Verdict::Retry,
            Ok(resp) if resp.status == 401 => Verdict::RefreshAndRetry,
            Ok(resp) if resp.status >= 500 => Verdict::Retry,
            Ok(_) => Verdict::Done,
        }
    }
}

/// Transport for the destination server: injects the bearer token at send time
/// and retries network failures and 5xx answers under a `RetryPolicy`.
///
/// A 401 triggers one token refresh per request followed by an immediate retry;
/// a second 401 is handed back to the caller.
pub struct RetryingHttp {
    inner: Arc<dyn HttpClientPort>,
    tokens: Arc<dyn TokenProvider>,
    policy: RetryPolicy,
}

impl RetryingHttp {
    pub fn new(inner: Arc<dyn HttpClientPort>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_policy(inner, tokens, RetryPolicy::default())
    }

    pub fn with_policy(
        inner: Arc<dyn HttpClientPort>,
        tokens: Arc<dyn TokenProvider>,
        policy: RetryPolicy,
    ) -> Self {
        Self { inner, tokens, policy }
    }

    fn authorize(&self, request: &HttpRequest) -> HttpRequest {
        let mut request = request.clone();
        request.set_header("Authorization", format!("Bearer {}", self.tokens.access_token()));
        request
    }
}

#[async_trait]
impl HttpClientPort for RetryingHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut retries = 0u32;
        let mut refreshed = false;
        loop {
            let outcome = self.inner.execute(self.authorize(&request)).await;
            match self.policy.classify(&outcome) {
                Verdict::Done => return outcome,
                Verdict::RefreshAndRetry if !refreshed => {
                    refreshed = true;
                    debug!(url = %request.url, "401 from destination, refreshing token");
                    if let Err(e) = self.tokens.refresh().await {
                        warn!(error = %e, "token refresh failed");
                        return outcome;
                    }
                    continue;
                }
                Verdict::RefreshAndRetry => return outcome,
                Verdict::Retry => {}
            }

            if retries >= self.policy.max_retries {
                error!(url = %request.url, retries, "destination did not recover, giving up");
                return Err(BotError::RetriesExhausted {
                    retries,
                    url: request.url.clone(),
                });
            }
            retries += 1;
            let wait = self.policy.backoff(retries);
            match &outcome {
                Ok(resp) => warn!(url = %request.url, status = resp.status, attempt = retries, wait_secs = wait.as_secs(), "HTTP error backoff"),
                Err(e) => warn!(url = %request.url, error = %e, attempt = retries, wait_secs = wait.as_secs(), "HTTP error backoff"),
            }
            tokio::time::sleep(wait).await;
        }
    }
}
