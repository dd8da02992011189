//! Raw provider records to normalized [`Message`] and [`Event`]

use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::google::raw::{RawEvent, RawEventTime, RawMessage, RawPart, RawPerson};
use crate::models::{Address, Attendee, AttendeeStatus, Event, EventStatus, EventTime, Message};

use super::identity::{normalize_address, parse_display_address, split_address_list};

/// Header-like lines that leak into bodies through quoting and forwarding
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s>]*(?:subject|from|to|date|content-type):").expect("valid regex")
});

/// Strip quoted header lines and collapse all whitespace runs to one space
pub fn clean_text(text: &str) -> String {
    text.lines()
        .filter(|line| !HEADER_LINE.is_match(line))
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode RFC 2047 encoded words; undecodable input comes back unchanged
pub fn decode_header_text(value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if !value.contains("=?") {
        return value.trim().to_string();
    }

    let synthetic = format!("Subject: {}\r\n\r\n", value);
    mail_parser::MessageParser::default()
        .parse(synthetic.as_bytes())
        .and_then(|parsed| parsed.subject().map(|s| s.trim().to_string()))
        .unwrap_or_else(|| value.trim().to_string())
}

/// RFC 2822 `Date` header to UTC
fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value.trim()) {
        return Some(dt.with_timezone(&Utc));
    }

    // mail-parser accepts the many near-RFC forms real mailers send
    let synthetic = format!("Date: {}\r\n\r\n", value.replace(['\r', '\n'], " "));
    let parsed = mail_parser::MessageParser::default().parse(synthetic.as_bytes())?;
    let date = parsed.date()?;
    DateTime::from_timestamp(date.to_timestamp(), 0)
}

fn decode_body_data(data: &str) -> String {
    let normalized: String = data
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    match URL_SAFE_NO_PAD.decode(normalized.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Undecodable body data: {}", e);
            String::new()
        }
    }
}

fn part_data(part: &RawPart) -> Option<&str> {
    part.body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .filter(|d| !d.is_empty())
}

/// Depth-first search for the first leaf of `mime_type` that carries data
fn find_leaf<'a>(part: &'a RawPart, mime_type: &str) -> Option<&'a RawPart> {
    if part.parts.is_empty() {
        return (part.mime_type.eq_ignore_ascii_case(mime_type) && part_data(part).is_some())
            .then_some(part);
    }
    part.parts.iter().find_map(|p| find_leaf(p, mime_type))
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|e| {
        debug!("HTML conversion failed: {}", e);
        String::new()
    })
}

/// Plain text body: first text/plain leaf, else first text/html leaf
fn extract_body(payload: &RawPart) -> String {
    if payload.parts.is_empty() {
        let text = part_data(payload).map(decode_body_data).unwrap_or_default();
        return if payload.mime_type.eq_ignore_ascii_case("text/html") {
            html_to_text(&text)
        } else {
            text
        };
    }

    if let Some(leaf) = find_leaf(payload, "text/plain") {
        return part_data(leaf).map(decode_body_data).unwrap_or_default();
    }
    if let Some(leaf) = find_leaf(payload, "text/html") {
        let html = part_data(leaf).map(decode_body_data).unwrap_or_default();
        return html_to_text(&html);
    }
    String::new()
}

fn has_attachments(part: &RawPart) -> bool {
    let here = !part.filename.is_empty()
        || part
            .body
            .as_ref()
            .is_some_and(|b| b.attachment_id.is_some());
    here || part.parts.iter().any(has_attachments)
}

fn parse_address_header(value: Option<&str>) -> Vec<Address> {
    let Some(value) = value else {
        return Vec::new();
    };
    split_address_list(value)
        .iter()
        .filter_map(|item| {
            let (name, address) = parse_display_address(&decode_header_text(item));
            let email = normalize_address(&address);
            (!email.is_empty()).then_some(Address { name, email })
        })
        .collect()
}

/// Normalize one Gmail `format=full` message
pub fn normalize_message(raw: &RawMessage) -> Result<Message> {
    if raw.id.is_empty() {
        return Err(Error::Normalize {
            id: "<missing>".to_string(),
            reason: "message has no id".to_string(),
        });
    }
    let payload = raw.payload.as_ref().ok_or_else(|| Error::Normalize {
        id: raw.id.clone(),
        reason: "message has no payload".to_string(),
    })?;

    let subject = payload
        .header("Subject")
        .map(decode_header_text)
        .unwrap_or_default();

    let sender = match payload.header("From").map(decode_header_text) {
        Some(from) if !from.is_empty() => {
            let (name, address) = parse_display_address(&from);
            // without a mailbox there is nothing to canonicalize
            let email = if address.contains('@') {
                normalize_address(&address)
            } else {
                from.trim().to_string()
            };
            Address { name, email }
        }
        _ => Address::new("unknown"),
    };

    let sent_at = payload
        .header("Date")
        .and_then(parse_date_header)
        .or_else(|| {
            raw.internal_date
                .as_deref()
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
        });
    if sent_at.is_none() {
        debug!("Message {} has no parseable date", raw.id);
    }

    Ok(Message {
        id: raw.id.clone(),
        thread_id: if raw.thread_id.is_empty() {
            raw.id.clone()
        } else {
            raw.thread_id.clone()
        },
        subject,
        sender,
        to: parse_address_header(payload.header("To")),
        cc: parse_address_header(payload.header("Cc")),
        sent_at,
        body: clean_text(&extract_body(payload)),
        has_attachments: has_attachments(payload),
    })
}

fn parse_event_time(id: &str, time: Option<&RawEventTime>) -> Option<EventTime> {
    let time = time?;
    if let Some(date) = time.date.as_deref() {
        match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(d) => return Some(EventTime::Date(d)),
            Err(e) => debug!("Event {} has invalid date {:?}: {}", id, date, e),
        }
    }
    if let Some(dt) = time.date_time.as_deref() {
        match DateTime::parse_from_rfc3339(dt) {
            Ok(dt) => return Some(EventTime::DateTime(dt.with_timezone(&Utc))),
            Err(e) => debug!("Event {} has invalid dateTime {:?}: {}", id, dt, e),
        }
    }
    None
}

fn person_to_attendee(person: &RawPerson) -> Option<Attendee> {
    let email = normalize_address(person.email.as_deref()?);
    if email.is_empty() {
        return None;
    }
    Some(Attendee {
        email,
        name: person
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
        response_status: person
            .response_status
            .as_deref()
            .and_then(AttendeeStatus::from_google),
    })
}

/// Normalize one Calendar API event
pub fn normalize_event(raw: &RawEvent) -> Result<Event> {
    if raw.id.is_empty() {
        return Err(Error::Normalize {
            id: "<missing>".to_string(),
            reason: "event has no id".to_string(),
        });
    }

    let start = parse_event_time(&raw.id, raw.start.as_ref());
    let end = parse_event_time(&raw.id, raw.end.as_ref()).or_else(|| start.clone());

    Ok(Event {
        id: raw.id.clone(),
        summary: raw
            .summary
            .as_deref()
            .map(decode_header_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(No Title)".to_string()),
        description: raw
            .description
            .as_deref()
            .map(clean_text)
            .filter(|d| !d.is_empty()),
        start,
        end,
        location: raw
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from),
        organizer: raw.organizer.as_ref().and_then(person_to_attendee),
        attendees: raw.attendees.iter().filter_map(person_to_attendee).collect(),
        status: raw
            .status
            .as_deref()
            .map(EventStatus::from_google)
            .unwrap_or_default(),
    })
}
