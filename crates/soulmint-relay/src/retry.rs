//! Transport-level retry for the HTTP capability adapters.
//!
//! The storage gateway and the chain RPC endpoint share the same posture:
//! a request is re-issued only when the transport produced no response at
//! all (connection refused, timeout). Anything the remote actually
//! answered — HTTP error statuses, undecodable bodies — is the adapter's
//! concern and is never retried here.

use std::time::Duration;

/// Backoff schedule for transient transport failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    /// Total attempts, including the first.
    max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Four attempts with 200ms, 400ms, 800ms between them.
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `retries` times after the initial attempt.
    pub(crate) fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries + 1,
            ..Self::default()
        }
    }

    #[cfg(test)]
    fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Issue `send` until it yields a response or the attempts run out.
    pub(crate) async fn send<F, Fut>(&self, send: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1u32;
        loop {
            match send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "capability transport failure, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn refused_request() -> impl std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>
    {
        // Port 1 is never listening; this fails at the transport level.
        reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap()
            .get("http://127.0.0.1:1/")
            .send()
    }

    #[tokio::test]
    async fn exhausts_every_attempt_against_a_dead_endpoint() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);

        let policy = RetryPolicy::with_retries(2).with_base_delay(Duration::from_millis(1));
        let result = policy
            .send(|| {
                counted.fetch_add(1, Ordering::SeqCst);
                refused_request()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3, "initial attempt plus two retries");
    }

    #[tokio::test]
    async fn zero_retries_means_exactly_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);

        let policy = RetryPolicy::with_retries(0);
        let result = policy
            .send(|| {
                counted.fetch_add(1, Ordering::SeqCst);
                refused_request()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
