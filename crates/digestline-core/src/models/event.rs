//! Calendar event data structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Event time - can be a specific datetime or an all-day date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    /// Comparable instant; an all-day date starts at midnight UTC
    pub fn to_instant(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
        }
    }
}

/// Event status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn from_google(s: &str) -> Self {
        match s {
            "tentative" => EventStatus::Tentative,
            "cancelled" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        }
    }
}

/// Event attendee (also used for the organizer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Email address, lowercased
    pub email: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Response status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<AttendeeStatus>,
}

/// Attendee response status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendeeStatus {
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

impl AttendeeStatus {
    pub fn from_google(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(AttendeeStatus::Accepted),
            "declined" => Some(AttendeeStatus::Declined),
            "tentative" => Some(AttendeeStatus::Tentative),
            "needsAction" => Some(AttendeeStatus::NeedsAction),
            _ => None,
        }
    }
}

/// A normalized calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Google Calendar event ID
    pub id: String,

    /// Event title/summary
    pub summary: String,

    /// Event description (cleaned)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Start time, None if the provider value could not be parsed
    pub start: Option<EventTime>,

    /// End time
    pub end: Option<EventTime>,

    /// Event location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Event organizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Attendee>,

    /// Event attendees
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,

    /// Event status
    #[serde(default)]
    pub status: EventStatus,
}

impl Event {
    /// Start as a comparable instant
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.start.as_ref().map(EventTime::to_instant)
    }

    /// Summary and description joined for text analysis
    pub fn searchable_text(&self) -> String {
        match &self.description {
            Some(d) => format!("{} {}", self.summary, d),
            None => self.summary.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_all_day_instant_is_midnight_utc() {
        let t = EventTime::Date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(
            t.to_instant(),
            Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_event_time_untagged_serde() {
        let date: EventTime = serde_json::from_str("\"2025-01-10\"").unwrap();
        assert!(matches!(date, EventTime::Date(_)));
        let dt: EventTime = serde_json::from_str("\"2025-01-10T09:30:00Z\"").unwrap();
        assert!(matches!(dt, EventTime::DateTime(_)));
    }
}
