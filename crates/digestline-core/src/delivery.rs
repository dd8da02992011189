//! Outbound delivery of the rendered report

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use mail_builder::MessageBuilder;
use tracing::info;

use crate::error::{Error, Result};
use crate::google::GmailClient;

/// A rendered report ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers a rendered report
#[async_trait]
pub trait ReportSender: Send + Sync {
    async fn send(&self, report: &Report) -> Result<()>;
}

/// "Weekly Brief: Mar 10, 2024", dated in the display timezone
pub fn report_subject(prefix: &str, window_end: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "{}: {}",
        prefix,
        window_end.with_timezone(&tz).format("%b %-d, %Y")
    )
}

/// RFC 5322 multipart/alternative message
pub fn build_message(
    sender_name: &str,
    sender_address: &str,
    recipient: &str,
    report: &Report,
) -> Result<Vec<u8>> {
    MessageBuilder::new()
        .from((sender_name, sender_address))
        .to(recipient)
        .subject(report.subject.as_str())
        .text_body(report.text.as_str())
        .html_body(report.html.as_str())
        .write_to_vec()
        .map_err(|e| Error::Delivery(format!("Failed to build message: {}", e)))
}

/// Sends through the Gmail `messages/send` endpoint as the account owner
pub struct GmailReportSender {
    gmail: GmailClient,
    sender_name: String,
    sender_address: String,
    recipient: String,
}

impl GmailReportSender {
    pub fn new(gmail: GmailClient, sender_name: &str, sender_address: &str, recipient: &str) -> Self {
        Self {
            gmail,
            sender_name: sender_name.to_string(),
            sender_address: sender_address.to_string(),
            recipient: recipient.to_string(),
        }
    }
}

#[async_trait]
impl ReportSender for GmailReportSender {
    async fn send(&self, report: &Report) -> Result<()> {
        let raw = build_message(
            &self.sender_name,
            &self.sender_address,
            &self.recipient,
            report,
        )?;
        let id = self
            .gmail
            .send_raw(&raw)
            .await
            .map_err(|e| Error::Delivery(format!("Gmail send failed: {}", e)))?;
        info!("Sent report to {} (message {})", self.recipient, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_subject_uses_display_timezone() {
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(report_subject("Weekly Brief", end, chrono_tz::UTC), "Weekly Brief: Mar 10, 2024");
        assert_eq!(
            report_subject("Weekly Brief", end, chrono_tz::America::Los_Angeles),
            "Weekly Brief: Mar 9, 2024"
        );
    }

    #[test]
    fn test_build_message_is_multipart_alternative() {
        let report = Report {
            subject: "Weekly Brief: Mar 10, 2024".to_string(),
            html: "<p>Hello <strong>there</strong></p>".to_string(),
            text: "Hello there".to_string(),
        };
        let raw = build_message("Digestline", "me@corp.com", "boss@corp.com", &report).unwrap();

        let parsed = mail_parser::MessageParser::default().parse(&raw).unwrap();
        assert_eq!(parsed.subject(), Some("Weekly Brief: Mar 10, 2024"));
        assert!(parsed.body_html(0).unwrap().contains("<strong>there</strong>"));
        assert!(parsed.body_text(0).unwrap().contains("Hello there"));

        let headers = String::from_utf8_lossy(&raw);
        assert!(headers.contains("multipart/alternative"));
        assert!(headers.contains("me@corp.com"));
        assert!(headers.contains("boss@corp.com"));
    }
}
