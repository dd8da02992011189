//! Records produced by the analysis stages and consumed by the report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unanswered inbound message inside the staleness window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingReplyRecord {
    pub subject: String,

    /// Sender address
    pub sender: String,

    #[serde(rename = "date")]
    pub received_at: DateTime<Utc>,
}

/// Per-counterparty rollup built by the aggregator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionRecord {
    /// Canonical key: an address when one is known, otherwise the raw name
    pub contact: String,

    /// Best display name seen for this contact
    pub display_name: Option<String>,

    /// Messages sent to or received from this contact
    pub exchanged_count: u32,

    /// Entity, sender-name and calendar mentions
    pub mention_count: u32,

    /// Mean response latency, in seconds
    pub average_response_secs: Option<i64>,
}

/// Row of the contacts table in the output payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub contact: String,
    pub interactions: u32,
    pub emails_exchanged: u32,
    pub avg_response_time: Option<String>,
}

/// Frequency-ranked keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRecord {
    pub keyword: String,
    pub frequency: u32,
    /// 1-based
    pub rank: usize,
}

/// An upcoming event the user organizes or has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingMeeting {
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub location: Option<String>,
    /// Attendee addresses
    pub attendees: Vec<String>,
}
