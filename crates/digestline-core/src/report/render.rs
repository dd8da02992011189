//! HTML report and its plain-text alternative

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::{DigestPayload, Highlights};
use crate::error::{Error, Result};
use crate::models::ThemeRecord;

/// Everything the renderer needs for one report
#[derive(Debug, Clone)]
pub struct ReportView<'a> {
    pub payload: &'a DigestPayload,
    pub themes: &'a [ThemeRecord],
    pub highlights: &'a Highlights,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub timezone: Tz,
    /// Summarizer output, already HTML
    pub digest: &'a str,
}

const STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;color:#222;max-width:760px;margin:0 auto;padding:16px}\
h1{font-size:22px;margin-bottom:4px}h2{font-size:17px;border-bottom:1px solid #ddd;padding-bottom:4px;margin-top:28px}\
table{border-collapse:collapse;width:100%}th,td{text-align:left;padding:6px 8px;border-bottom:1px solid #eee;font-size:14px}\
.muted{color:#777;font-size:13px}.bar{background:#4a7bd0;height:10px;display:inline-block}\
.highlight{background:#f4f7fc;border-left:3px solid #4a7bd0;padding:8px 12px;margin:6px 0}";

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl ReportView<'_> {
    fn local(&self, at: DateTime<Utc>, fmt: &str) -> String {
        at.with_timezone(&self.timezone).format(fmt).to_string()
    }

    fn header(&self, html: &mut String) {
        html.push_str(&format!(
            "<h1>Weekly Relationship Brief</h1>\n<p class=\"muted\">{} to {} ({})</p>\n",
            self.local(self.window_start, "%b %-d, %Y"),
            self.local(self.window_end, "%b %-d, %Y"),
            self.timezone.name()
        ));
    }

    fn highlights(&self, html: &mut String) {
        let h = self.highlights;
        let mut lines = Vec::new();
        if let Some(contact) = &h.most_engaged {
            lines.push(format!(
                "Most engaged contact: <strong>{}</strong>",
                escape(contact)
            ));
        }
        if let Some(subject) = &h.most_active_thread {
            lines.push(format!(
                "Most active thread: <strong>{}</strong>",
                escape(subject)
            ));
        }
        if let Some((contact, avg)) = &h.fastest_reply {
            lines.push(format!(
                "Fastest responder: your average response time to <strong>{}</strong> was {}.",
                escape(contact),
                escape(avg)
            ));
        }
        if lines.is_empty() {
            return;
        }
        html.push_str("<h2>Highlights</h2>\n");
        for line in lines {
            html.push_str(&format!("<div class=\"highlight\">{}</div>\n", line));
        }
    }

    fn digest(&self, html: &mut String) {
        html.push_str("<h2>AI Digest</h2>\n");
        html.push_str(self.digest);
        html.push('\n');
    }

    fn awaiting(&self, html: &mut String) {
        html.push_str("<h2>Awaiting your reply</h2>\n");
        let rows = &self.payload.emails_awaiting_response;
        if rows.is_empty() {
            html.push_str("<p class=\"muted\">Nothing is waiting on you.</p>\n");
            return;
        }
        html.push_str("<table>\n<tr><th>Subject</th><th>From</th><th>Received</th></tr>\n");
        for row in rows {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&row.subject),
                escape(&row.sender),
                self.local(row.received_at, "%a %b %-d, %H:%M")
            ));
        }
        html.push_str("</table>\n");
    }

    fn meetings(&self, html: &mut String) {
        html.push_str("<h2>Upcoming meetings</h2>\n");
        let meetings = &self.payload.upcoming_meetings;
        if meetings.is_empty() {
            html.push_str("<p class=\"muted\">No upcoming meetings.</p>\n");
            return;
        }
        html.push_str("<ul>\n");
        for meeting in meetings {
            let attendees = if meeting.attendees.is_empty() {
                "None listed".to_string()
            } else {
                escape(&meeting.attendees.join(", "))
            };
            html.push_str(&format!(
                "<li><strong>{}</strong><br>Time: {}<br>Location: {}<br>Attendees: {}</li>\n",
                escape(&meeting.summary),
                self.local(meeting.start_time, "%a %b %-d, %H:%M %Z"),
                escape(meeting.location.as_deref().unwrap_or("N/A")),
                attendees
            ));
        }
        html.push_str("</ul>\n");
    }

    fn people(&self, html: &mut String) {
        html.push_str("<h2>Key people</h2>\n");
        let contacts = &self.payload.consolidated_contacts_summary;
        if contacts.is_empty() {
            html.push_str("<p class=\"muted\">No contacts in this window.</p>\n");
            return;
        }
        html.push_str(
            "<table>\n<tr><th>Contact</th><th>Interactions</th><th>Emails exchanged</th><th>Avg. response time</th></tr>\n",
        );
        for contact in contacts {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&contact.contact),
                contact.interactions,
                contact.emails_exchanged,
                escape(contact.avg_response_time.as_deref().unwrap_or("N/A"))
            ));
        }
        html.push_str("</table>\n");
    }

    fn organizations(&self, html: &mut String) {
        let orgs = &self.payload.key_organizations;
        if orgs.is_empty() {
            return;
        }
        html.push_str("<h2>Key organizations</h2>\n<ul>\n");
        for (name, count) in orgs {
            let unit = if *count == 1 { "mention" } else { "mentions" };
            html.push_str(&format!("<li>{} ({} {})</li>\n", escape(name), count, unit));
        }
        html.push_str("</ul>\n");
    }

    fn themes(&self, html: &mut String) {
        let Some(max) = self.themes.iter().map(|t| t.frequency).max() else {
            return;
        };
        html.push_str("<h2>Top themes</h2>\n<table>\n");
        for theme in self.themes {
            let width = theme.frequency * 100 / max.max(1);
            html.push_str(&format!(
                "<tr><td>{}. {}</td><td><span class=\"bar\" style=\"width:{}%\"></span> {}</td></tr>\n",
                theme.rank,
                escape(&theme.keyword),
                width,
                theme.frequency
            ));
        }
        html.push_str("</table>\n");
    }
}

/// Render the full HTML document
pub fn render_html(view: &ReportView<'_>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>\n");

    view.header(&mut html);
    view.highlights(&mut html);
    view.digest(&mut html);
    view.awaiting(&mut html);
    view.meetings(&mut html);
    view.people(&mut html);
    view.organizations(&mut html);
    view.themes(&mut html);

    html.push_str(&format!(
        "<p class=\"muted\">Generated {}.</p>\n</body></html>\n",
        view.local(view.window_end, "%Y-%m-%d %H:%M %Z")
    ));
    html
}

/// Plain-text alternative for mail clients that do not show HTML
pub fn render_text(html: &str) -> Result<String> {
    html2text::from_read(html.as_bytes(), 80)
        .map_err(|e| Error::Other(format!("HTML to text conversion failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AwaitingReplyRecord, ContactSummary, UpcomingMeeting};
    use chrono::TimeZone;

    fn payload() -> DigestPayload {
        DigestPayload {
            consolidated_contacts_summary: vec![ContactSummary {
                contact: "Alice <Ops>".to_string(),
                interactions: 3,
                emails_exchanged: 4,
                avg_response_time: Some("2 hours".to_string()),
            }],
            emails_awaiting_response: vec![AwaitingReplyRecord {
                subject: "Q3 & budget".to_string(),
                sender: "bob@x.com".to_string(),
                received_at: Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap(),
            }],
            upcoming_meetings: vec![UpcomingMeeting {
                summary: "Planning".to_string(),
                start_time: Utc.with_ymd_and_hms(2024, 3, 11, 15, 30, 0).unwrap(),
                location: None,
                attendees: vec!["me@x.com".to_string(), "carol@x.com".to_string()],
            }],
            key_organizations: vec![("Acme Corp".to_string(), 2), ("Initech".to_string(), 1)],
            ..Default::default()
        }
    }

    fn themes() -> Vec<ThemeRecord> {
        vec![
            ThemeRecord { keyword: "roadmap".to_string(), frequency: 8, rank: 1 },
            ThemeRecord { keyword: "hiring".to_string(), frequency: 2, rank: 2 },
        ]
    }

    fn render(payload: &DigestPayload, themes: &[ThemeRecord], highlights: &Highlights, tz: Tz) -> String {
        render_html(&ReportView {
            payload,
            themes,
            highlights,
            window_start: Utc.with_ymd_and_hms(2024, 2, 25, 9, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
            timezone: tz,
            digest: "<p>Busy fortnight.</p>",
        })
    }

    #[test]
    fn test_sections_and_escaping() {
        let highlights = Highlights {
            most_engaged: Some("Alice <Ops>".to_string()),
            most_active_thread: None,
            fastest_reply: Some(("bob@x.com".to_string(), "5 minutes".to_string())),
        };
        let html = render(&payload(), &themes(), &highlights, chrono_tz::UTC);

        assert!(html.contains("<p>Busy fortnight.</p>"));
        assert!(html.contains("Alice &lt;Ops&gt;"));
        assert!(!html.contains("Alice <Ops>"));
        assert!(html.contains("Q3 &amp; budget"));
        assert!(html.contains("Location: N/A"));
        assert!(html.contains("Acme Corp (2 mentions)"));
        assert!(html.contains("Initech (1 mention)"));
        assert!(html.contains("your average response time to <strong>bob@x.com</strong> was 5 minutes."));
        assert!(!html.contains("Most active thread"));
        assert!(html.contains("<td>2 hours</td>"));
    }

    #[test]
    fn test_theme_bars_are_proportional() {
        let html = render(&payload(), &themes(), &Highlights::default(), chrono_tz::UTC);
        assert!(html.contains("width:100%"));
        assert!(html.contains("width:25%"));
    }

    #[test]
    fn test_times_use_display_timezone() {
        let html = render(&payload(), &[], &Highlights::default(), chrono_tz::America::New_York);
        // 15:30 UTC on Mar 11 2024 is 11:30 EDT
        assert!(html.contains("Mon Mar 11, 11:30 EDT"));
        assert!(html.contains("(America/New_York)"));
        assert!(!html.contains("Highlights"));
        assert!(!html.contains("Top themes"));
    }

    #[test]
    fn test_empty_sections_render_placeholders() {
        let html = render(&DigestPayload::default(), &[], &Highlights::default(), chrono_tz::UTC);
        assert!(html.contains("Nothing is waiting on you."));
        assert!(html.contains("No upcoming meetings."));
        assert!(!html.contains("Key organizations"));
    }

    #[test]
    fn test_render_text() {
        let html = render(&payload(), &themes(), &Highlights::default(), chrono_tz::UTC);
        let text = render_text(&html).unwrap();
        assert!(text.contains("Upcoming meetings"));
        assert!(text.contains("Planning"));
        assert!(!text.contains("<table>"));
    }
}
