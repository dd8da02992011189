//! Google Calendar REST client for the primary calendar

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};

use super::raw::{EventListResponse, RawEvent};
use super::{with_retries, CalendarSource, Fetched, GoogleApi};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Calendar client for a single account
pub struct CalendarClient {
    api: GoogleApi,
    max_events: u32,
    max_retries: u32,
}

impl CalendarClient {
    pub fn new(api: GoogleApi, retrieval: &RetrievalConfig) -> Self {
        Self {
            api,
            max_events: retrieval.max_events.max(1),
            max_retries: retrieval.max_item_retries,
        }
    }
}

#[async_trait]
impl CalendarSource for CalendarClient {
    async fn fetch_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Fetched<RawEvent>> {
        let mut fetched = Fetched::new(Vec::new());
        let mut page_token: Option<String> = None;

        loop {
            let remaining = (self.max_events as usize).saturating_sub(fetched.items.len());
            let mut params = vec![
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", remaining.min(250).to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: EventListResponse =
                with_retries("list events", self.max_retries, || {
                    self.api.get_json(EVENTS_URL, &params)
                })
                .await
                .map_err(|e| {
                    if e.requires_reauth() {
                        e
                    } else {
                        Error::Retrieval(format!("Failed to list events: {}", e))
                    }
                })?;

            for item in page.items {
                match serde_json::from_value::<RawEvent>(item) {
                    Ok(event) => fetched.items.push(event),
                    Err(e) => {
                        warn!("Skipping malformed calendar event: {}", e);
                        fetched.skipped += 1;
                    }
                }
            }

            match page.next_page_token {
                Some(token) if fetched.items.len() < self.max_events as usize => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }

        fetched.items.truncate(self.max_events as usize);
        info!(
            "Fetched {} events for {} ({} skipped)",
            fetched.items.len(),
            self.api.account_id(),
            fetched.skipped
        );
        Ok(fetched)
    }
}
