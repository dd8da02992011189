//! Gmail REST client: listing, full-message fetch, and raw send

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{RetrievalConfig, WindowConfig};
use crate::error::{Error, Result};

use super::raw::{MessageListResponse, RawMessage};
use super::{with_retries, Fetched, GoogleApi, MailSource};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail client for a single account
pub struct GmailClient {
    api: GoogleApi,
    page_size: u32,
    max_concurrent: usize,
    pacing: Duration,
    max_item_retries: u32,
}

impl GmailClient {
    pub fn new(api: GoogleApi, window: &WindowConfig, retrieval: &RetrievalConfig) -> Self {
        Self {
            api,
            page_size: window.page_size.clamp(1, 500),
            max_concurrent: retrieval.max_concurrent_fetches.max(1),
            pacing: Duration::from_millis(retrieval.pacing_ms),
            max_item_retries: retrieval.max_item_retries,
        }
    }

    /// Follow `nextPageToken` until every matching ID is collected
    pub async fn list_message_ids(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/messages", GMAIL_BASE);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("maxResults", self.page_size.to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: MessageListResponse =
                with_retries("list messages", self.max_item_retries, || {
                    self.api.get_json(&url, &params)
                })
                .await
                .map_err(|e| {
                    if e.requires_reauth() {
                        e
                    } else {
                        Error::Retrieval(format!("Failed to list messages: {}", e))
                    }
                })?;

            ids.extend(page.messages.into_iter().map(|m| m.id));
            debug!("Listed {} message ids so far", ids.len());

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Fetch one message in `format=full`
    pub async fn fetch_message(&self, id: &str) -> Result<RawMessage> {
        let url = format!("{}/messages/{}", GMAIL_BASE, id);
        let params = [("format", "full".to_string())];
        let what = format!("fetch message {}", id);

        with_retries(&what, self.max_item_retries, || self.api.get_json(&url, &params))
            .await
            .map_err(|e| {
                if e.requires_reauth() {
                    e
                } else {
                    Error::RetrievalItem {
                        kind: "message",
                        id: id.to_string(),
                        reason: e.to_string(),
                    }
                }
            })
    }

    /// Send an RFC 5322 message as the authenticated user; returns the new message ID
    pub async fn send_raw(&self, rfc822: &[u8]) -> Result<String> {
        let body = serde_json::json!({ "raw": URL_SAFE_NO_PAD.encode(rfc822) });
        let url = format!("{}/messages/send", GMAIL_BASE);
        let response: serde_json::Value = self.api.post_json(&url, &body).await?;
        Ok(response["id"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn fetch_messages(&self, query: &str) -> Result<Fetched<RawMessage>> {
        let ids = self.list_message_ids(query).await?;
        info!(
            "Fetching {} messages for {} ({} at a time)",
            ids.len(),
            self.api.account_id(),
            self.max_concurrent
        );

        // buffered keeps provider order
        let results: Vec<Result<RawMessage>> = stream::iter(ids)
            .map(|id| async move {
                let result = self.fetch_message(&id).await;
                if !self.pacing.is_zero() {
                    tokio::time::sleep(self.pacing).await;
                }
                result
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut fetched = Fetched::new(Vec::with_capacity(results.len()));
        for result in results {
            match result {
                Ok(message) => fetched.items.push(message),
                Err(e) if e.requires_reauth() => return Err(e),
                Err(e) => {
                    warn!("Skipping message: {}", e);
                    fetched.skipped += 1;
                }
            }
        }

        info!(
            "Fetched {} messages ({} skipped)",
            fetched.items.len(),
            fetched.skipped
        );
        Ok(fetched)
    }
}
