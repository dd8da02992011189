//! Google Gmail and Calendar retrieval
//!
//! Everything here is I/O. The analysis stages only see the [`RawMessage`]
//! and [`RawEvent`] values these sources hand back.

mod calendar;
mod gmail;
mod rate_limiter;
pub mod raw;

pub use calendar::CalendarClient;
pub use gmail::GmailClient;
pub use rate_limiter::GlobalRateLimiter;
pub use raw::{RawEvent, RawMessage};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{Error, Result};
use crate::oauth::OAuthManager;

/// Records from one retrieval pass plus how many items were dropped
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

impl<T> Fetched<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, skipped: 0 }
    }
}

/// Supplies raw messages for a time window
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Every message matching `query`. Single-item failures are skipped
    /// and counted; failure to list at all is an error.
    async fn fetch_messages(&self, query: &str) -> Result<Fetched<RawMessage>>;
}

/// Supplies raw calendar events for a time window
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Fetched<RawEvent>>;
}

/// Authenticated, rate-limited access to Google REST APIs for one account
#[derive(Clone)]
pub struct GoogleApi {
    account_id: String,
    oauth: Arc<OAuthManager>,
    rate_limiter: GlobalRateLimiter,
    client: Client,
}

impl GoogleApi {
    pub fn new(account_id: &str, oauth: Arc<OAuthManager>, rate_limiter: GlobalRateLimiter) -> Self {
        Self {
            account_id: account_id.to_string(),
            oauth,
            rate_limiter,
            client: Client::new(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Send a request built from `build`, after the limiter admits it
    async fn send(&self, build: impl FnOnce(&Client) -> RequestBuilder) -> Result<Response> {
        self.rate_limiter.wait().await;
        let token = self.oauth.get_valid_token(&self.account_id).await?;
        let response = build(&self.client).bearer_auth(&token).send().await?;
        check_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(|c| c.get(url).query(query)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T> {
        let response = self.send(|c| c.post(url).json(body)).await?;
        Ok(response.json().await?)
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        return Err(Error::RateLimited { retry_after_secs });
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

/// Longest single wait between retries, whatever the server asks for
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retry number `attempt` (1-based)
fn backoff_for(e: &Error, attempt: u32) -> Duration {
    let backoff = match e {
        Error::RateLimited { retry_after_secs } => Duration::from_secs(*retry_after_secs),
        _ => Duration::from_millis(250u64.saturating_mul(2u64.saturating_pow(attempt))),
    };
    backoff.min(MAX_BACKOFF)
}

/// Run `op`, retrying transient failures up to `max_retries` times
pub(crate) async fn with_retries<T, F, Fut>(what: &str, max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let backoff = backoff_for(&e, attempt);
                warn!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    what, e, attempt, max_retries, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let server = Error::Api { status: 503, body: String::new() };
        assert_eq!(backoff_for(&server, 1), Duration::from_millis(500));
        assert_eq!(backoff_for(&server, 3), Duration::from_secs(2));
        assert_eq!(backoff_for(&server, 64), MAX_BACKOFF);
        assert_eq!(backoff_for(&server, u32::MAX), MAX_BACKOFF);

        let limited = |secs| Error::RateLimited { retry_after_secs: secs };
        assert_eq!(backoff_for(&limited(5), 1), Duration::from_secs(5));
        assert_eq!(backoff_for(&limited(86_400), 1), MAX_BACKOFF);
        assert_eq!(backoff_for(&limited(u64::MAX), 1), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_limit() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retries("msg", 2, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::RateLimited { retry_after_secs: 0 })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_does_not_retry_permanent_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retries("msg", 5, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Api {
                status: 404,
                body: String::new(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retries_recovers() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retries("msg", 2, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::RateLimited { retry_after_secs: 0 })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }
}
