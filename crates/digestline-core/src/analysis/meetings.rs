//! Upcoming meetings the user organizes or has accepted

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{AttendeeStatus, Event, EventStatus, UpcomingMeeting};

fn involves_user(event: &Event, user_address: &str) -> bool {
    let organizes = event
        .organizer
        .as_ref()
        .is_some_and(|o| o.email.eq_ignore_ascii_case(user_address));

    organizes
        || event.attendees.iter().any(|a| {
            a.email.eq_ignore_ascii_case(user_address)
                && a.response_status == Some(AttendeeStatus::Accepted)
        })
}

/// Events starting strictly inside `(now, now + lookahead_days)` that the
/// user organizes or has accepted, earliest first
///
/// All-day events start at midnight UTC of their date. Cancelled events
/// and events without a parseable start are left out.
pub fn important_upcoming(
    events: &[Event],
    user_address: &str,
    now: DateTime<Utc>,
    lookahead_days: i64,
) -> Vec<UpcomingMeeting> {
    let horizon = Duration::try_days(lookahead_days)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let mut meetings: Vec<UpcomingMeeting> = events
        .iter()
        .filter(|e| e.status != EventStatus::Cancelled)
        .filter_map(|event| {
            let Some(start) = event.start_instant() else {
                debug!("Skipping event {} without a start time", event.id);
                return None;
            };
            (start > now && start < horizon && involves_user(event, user_address)).then(|| {
                UpcomingMeeting {
                    summary: event.summary.clone(),
                    start_time: start,
                    location: event.location.clone(),
                    attendees: event.attendees.iter().map(|a| a.email.clone()).collect(),
                }
            })
        })
        .collect();

    meetings.sort_by_key(|m| m.start_time);
    meetings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attendee, EventTime};
    use chrono::{NaiveDate, TimeZone};

    const ME: &str = "me@corp.com";

    fn event(id: &str, start: Option<EventTime>) -> Event {
        Event {
            id: id.to_string(),
            summary: format!("event {}", id),
            description: None,
            start,
            end: None,
            location: None,
            organizer: None,
            attendees: vec![],
            status: EventStatus::Confirmed,
        }
    }

    fn attendee(email: &str, status: AttendeeStatus) -> Attendee {
        Attendee {
            email: email.to_string(),
            name: None,
            response_status: Some(status),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_all_day_event_included_at_midnight_utc() {
        let mut e = event("1", Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap())));
        e.organizer = Some(attendee(ME, AttendeeStatus::Accepted));

        let meetings = important_upcoming(&[e], ME, now(), 7);
        assert_eq!(meetings.len(), 1);
        assert_eq!(
            meetings[0].start_time,
            Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_oversized_lookahead_is_unbounded() {
        let mut e = event("far", Some(EventTime::DateTime(now() + Duration::days(900))));
        e.organizer = Some(attendee(ME, AttendeeStatus::Accepted));

        let meetings = important_upcoming(&[e], ME, now(), 200_000_000_000_000);
        assert_eq!(meetings.len(), 1);
    }

    #[test]
    fn test_requires_organizer_or_accepted() {
        let start = Some(EventTime::DateTime(now() + Duration::days(1)));

        let mut accepted = event("accepted", start.clone());
        accepted.attendees = vec![attendee("Me@Corp.com", AttendeeStatus::Accepted)];
        let mut tentative = event("tentative", start.clone());
        tentative.attendees = vec![attendee(ME, AttendeeStatus::Tentative)];
        let mut other = event("other", start);
        other.organizer = Some(attendee("boss@corp.com", AttendeeStatus::Accepted));
        other.attendees = vec![attendee("boss@corp.com", AttendeeStatus::Accepted)];

        let meetings = important_upcoming(&[accepted, tentative, other], ME, now(), 7);
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].summary, "event accepted");
        assert_eq!(meetings[0].attendees, vec!["Me@Corp.com"]);
    }

    #[test]
    fn test_window_bounds_ordering_and_exclusions() {
        let mine = |id: &str, start: Option<EventTime>| {
            let mut e = event(id, start);
            e.organizer = Some(attendee(ME, AttendeeStatus::Accepted));
            e
        };
        let at = |d: Duration| Some(EventTime::DateTime(now() + d));

        let mut cancelled = mine("cancelled", at(Duration::hours(2)));
        cancelled.status = EventStatus::Cancelled;

        let events = vec![
            mine("late", at(Duration::days(3))),
            mine("now", at(Duration::zero())),
            mine("past", at(-Duration::hours(1))),
            mine("edge", at(Duration::days(7))),
            mine("soon", at(Duration::hours(1))),
            mine("undated", None),
            cancelled,
        ];

        let summaries: Vec<String> = important_upcoming(&events, ME, now(), 7)
            .into_iter()
            .map(|m| m.summary)
            .collect();
        assert_eq!(summaries, vec!["event soon", "event late"]);
    }
}
