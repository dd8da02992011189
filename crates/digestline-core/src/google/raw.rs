//! Provider-native record shapes
//!
//! Only the fields the normalizer reads are modelled; everything else the
//! APIs return is ignored by serde.

use serde::{Deserialize, Serialize};

/// Gmail `users.messages.get?format=full` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,

    #[serde(default)]
    pub thread_id: String,

    /// Epoch milliseconds, as a decimal string
    #[serde(default)]
    pub internal_date: Option<String>,

    #[serde(default)]
    pub payload: Option<RawPart>,
}

/// One MIME part; the top-level payload is a part too
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPart {
    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub headers: Vec<RawHeader>,

    #[serde(default)]
    pub body: Option<RawBody>,

    #[serde(default)]
    pub parts: Vec<RawPart>,
}

impl RawPart {
    /// First header with this name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    /// URL-safe base64, padding optional
    #[serde(default)]
    pub data: Option<String>,

    #[serde(default)]
    pub attachment_id: Option<String>,

    #[serde(default)]
    pub size: u64,
}

/// Gmail `users.messages.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<MessageStub>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageStub {
    pub id: String,
}

/// Google Calendar `events.list` item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub start: Option<RawEventTime>,

    #[serde(default)]
    pub end: Option<RawEventTime>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub organizer: Option<RawPerson>,

    #[serde(default)]
    pub attendees: Vec<RawPerson>,

    #[serde(default)]
    pub status: Option<String>,
}

/// `{dateTime}` for timed events, `{date}` for all-day ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPerson {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub response_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventListResponse {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ignores_unknown_fields() {
        let raw: RawMessage = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "labelIds": ["INBOX"],
            "internalDate": "1736380800000",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Hi"}],
                "parts": [{"mimeType": "text/plain", "body": {"data": "aGk", "size": 2}}]
            }
        }))
        .unwrap();
        let payload = raw.payload.unwrap();
        assert_eq!(payload.header("subject"), Some("Hi"));
        assert_eq!(payload.parts.len(), 1);
        assert_eq!(raw.internal_date.as_deref(), Some("1736380800000"));
    }
}
