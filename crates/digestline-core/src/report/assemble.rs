//! Joins every stage's output into the payload handed to the summarizer,
//! the renderer and the archive

use serde::{Deserialize, Serialize};

use crate::analysis::{humanize_duration, Aggregates, InteractionAnalysis, OrderedCounter};
use crate::config::AnalysisConfig;
use crate::models::{
    AwaitingReplyRecord, ContactSummary, Event, Message, UpcomingMeeting,
};

/// Self-describing snapshot of one run
///
/// The summarizer sees nothing else, so every key is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestPayload {
    pub emails: Vec<Message>,
    pub calendar_events: Vec<Event>,
    pub consolidated_contacts_summary: Vec<ContactSummary>,
    pub emails_awaiting_response: Vec<AwaitingReplyRecord>,
    pub upcoming_meetings: Vec<UpcomingMeeting>,
    pub key_organizations: Vec<(String, u32)>,
    pub top_themes_keywords: Vec<String>,
}

/// Output-stage truncation
#[derive(Debug, Clone, Copy)]
pub struct ReportLimits {
    pub top_contacts: usize,
    pub top_organizations: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            top_contacts: 10,
            top_organizations: 10,
        }
    }
}

impl From<&AnalysisConfig> for ReportLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            top_contacts: config.top_contacts,
            top_organizations: config.top_organizations,
        }
    }
}

pub fn assemble(
    messages: &[Message],
    events: &[Event],
    aggregates: &Aggregates,
    interactions: &InteractionAnalysis,
    upcoming: Vec<UpcomingMeeting>,
    limits: ReportLimits,
) -> DigestPayload {
    let contacts = aggregates
        .contacts
        .iter()
        .take(limits.top_contacts)
        .map(|record| ContactSummary {
            contact: record
                .display_name
                .clone()
                .unwrap_or_else(|| record.contact.clone()),
            interactions: record.mention_count,
            emails_exchanged: record.exchanged_count,
            avg_response_time: record.average_response_secs.map(humanize_duration),
        })
        .collect();

    DigestPayload {
        emails: messages.to_vec(),
        calendar_events: events.to_vec(),
        consolidated_contacts_summary: contacts,
        emails_awaiting_response: interactions.awaiting_reply().to_vec(),
        upcoming_meetings: upcoming,
        key_organizations: aggregates
            .organizations
            .iter()
            .take(limits.top_organizations)
            .cloned()
            .collect(),
        top_themes_keywords: aggregates.themes.iter().map(|t| t.keyword.clone()).collect(),
    }
}

/// One-line takeaways shown at the top of the report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    pub most_engaged: Option<String>,
    /// Subject of the thread with the most messages
    pub most_active_thread: Option<String>,
    /// Contact the user answers fastest, with the humanized average
    pub fastest_reply: Option<(String, String)>,
}

pub fn highlights(messages: &[Message], aggregates: &Aggregates) -> Highlights {
    let display = |r: &crate::models::InteractionRecord| {
        r.display_name.clone().unwrap_or_else(|| r.contact.clone())
    };

    let mut threads = OrderedCounter::new();
    for message in messages {
        threads.incr(&message.thread_id);
    }
    let most_active_thread = threads.ranked().into_iter().next().and_then(|(id, _)| {
        messages
            .iter()
            .find(|m| m.thread_id == id)
            .map(|m| m.subject.clone())
    });

    let fastest_reply = aggregates
        .contacts
        .iter()
        .filter_map(|r| r.average_response_secs.map(|secs| (r, secs)))
        .fold(None, |best: Option<(&_, i64)>, (r, secs)| match best {
            Some((_, b)) if b <= secs => best,
            _ => Some((r, secs)),
        })
        .map(|(r, secs)| (display(r), humanize_duration(secs)));

    Highlights {
        most_engaged: aggregates.contacts.first().map(display),
        most_active_thread,
        fastest_reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, InteractionRecord, ThemeRecord};

    fn record(contact: &str, name: Option<&str>, avg: Option<i64>) -> InteractionRecord {
        InteractionRecord {
            contact: contact.to_string(),
            display_name: name.map(String::from),
            exchanged_count: 1,
            mention_count: 1,
            average_response_secs: avg,
        }
    }

    fn aggregates(n: usize) -> Aggregates {
        Aggregates {
            contacts: (0..n)
                .map(|i| record(&format!("c{}@x.com", i), None, Some(100 + i as i64)))
                .collect(),
            organizations: (0..n).map(|i| (format!("Org {}", i), 1)).collect(),
            themes: vec![ThemeRecord {
                keyword: "budget".to_string(),
                frequency: 4,
                rank: 1,
            }],
        }
    }

    #[test]
    fn test_payload_has_exactly_the_contract_keys() {
        let payload = assemble(
            &[],
            &[],
            &Aggregates::default(),
            &InteractionAnalysis::default(),
            vec![],
            ReportLimits::default(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "calendar_events",
                "consolidated_contacts_summary",
                "emails",
                "emails_awaiting_response",
                "key_organizations",
                "top_themes_keywords",
                "upcoming_meetings",
            ]
        );
    }

    #[test]
    fn test_truncation_happens_only_here() {
        let aggregates = aggregates(15);
        let payload = assemble(
            &[],
            &[],
            &aggregates,
            &InteractionAnalysis::default(),
            vec![],
            ReportLimits::default(),
        );
        assert_eq!(aggregates.contacts.len(), 15);
        assert_eq!(payload.consolidated_contacts_summary.len(), 10);
        assert_eq!(payload.key_organizations.len(), 10);
        assert_eq!(payload.consolidated_contacts_summary[0].contact, "c0@x.com");
        assert_eq!(
            payload.consolidated_contacts_summary[0].avg_response_time.as_deref(),
            Some("1 minute")
        );
        assert_eq!(payload.top_themes_keywords, vec!["budget"]);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["key_organizations"][0], serde_json::json!(["Org 0", 1]));
    }

    #[test]
    fn test_highlights() {
        let message = |id: &str, thread: &str, subject: &str| Message {
            id: id.to_string(),
            thread_id: thread.to_string(),
            subject: subject.to_string(),
            sender: Address::new("a@x.com"),
            to: vec![],
            cc: vec![],
            sent_at: None,
            body: String::new(),
            has_attachments: false,
        };
        let messages = vec![
            message("1", "t1", "Hiring"),
            message("2", "t2", "Budget"),
            message("3", "t2", "Re: Budget"),
        ];
        let aggregates = Aggregates {
            contacts: vec![
                record("alice@x.com", Some("Alice"), Some(7200)),
                record("bob@x.com", None, Some(90)),
                record("carol@x.com", None, Some(90)),
                record("dan@x.com", None, None),
            ],
            ..Default::default()
        };

        let h = highlights(&messages, &aggregates);
        assert_eq!(h.most_engaged.as_deref(), Some("Alice"));
        assert_eq!(h.most_active_thread.as_deref(), Some("Budget"));
        assert_eq!(
            h.fastest_reply,
            Some(("bob@x.com".to_string(), "1 minute".to_string()))
        );
        assert_eq!(highlights(&[], &Aggregates::default()), Highlights::default());
    }
}
